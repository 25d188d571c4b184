//! Narrow coordinate types shared across the lattice module.

/// A packed (site, orbital) linear index into a thread's local amplitude
/// array. Always `< Lattice::n_d()`.
pub type SiteIndex = usize;
