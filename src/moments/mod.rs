//! Moment accumulators (§4.6): 1D/2D/3D drivers over random vectors and
//! disorder realizations, a shared Chebyshev-stepping/bulk-dot toolkit, a
//! Welford running mean, and final symmetrization.

pub mod chain;
pub mod oned;
pub mod symmetrize;
pub mod threed;
pub mod twod;
pub mod welford;

pub use welford::RunningMoments;
