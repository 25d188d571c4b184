//! Kernel Polynomial Method spectral-moment engine.
//!
//! Stochastic trace estimation of Chebyshev-polynomial moments
//! `mu = Tr[v^a1 T_n1(H) v^a2 T_n2(H) ... v^ak T_nk(H)]` of a rescaled
//! tight-binding Hamiltonian, for k = 1, 2, 3 velocity/Chebyshev factors,
//! plus a single-shot DC response evaluator. See `direction` for the axis
//! encoding, `engine` for the concurrency model, and `io` for the
//! container-format boundary.

pub mod direction;
pub mod engine;
pub mod error;
pub mod halo;
pub mod hamiltonian;
pub mod io;
pub mod lattice;
pub mod moments;
pub mod recursion;
pub mod rng;
pub mod scalar;
pub mod singleshot;
pub mod vector;

pub use error::{KpmError, KpmResult};
pub use scalar::Scalar;
