//! Shared test helpers: a single-thread periodic halo exchange (needed for
//! correctness even with one thread, since periodic hops still need their
//! ghost cells filled from the lattice's own opposite bulk face) and a
//! couple of small lattice/Hamiltonian builders reused across the
//! integration test files.

#![allow(dead_code)]

use kpm_core::halo::{exchange_halos, face_lens, HaloStaging, ThreadGrid};
use kpm_core::hamiltonian::{Hamiltonian, Hopping};
use kpm_core::lattice::{BoundaryCondition, Lattice};
use kpm_core::moments::chain::{bulk_dot, chebyshev_sequence};
use kpm_core::scalar::Scalar;
use std::sync::Barrier;

/// A single-thread "exchange" that wraps a periodic lattice's ghosts around
/// onto its own opposite bulk face, via the real two-barrier protocol with a
/// thread grid of shape `[1,1,1]` whose lone thread is its own periodic
/// neighbor. Needed even with one thread: without it, hops that cross the
/// lattice's periodic boundary would read zeroed ghost cells instead of the
/// wrapped-around bulk value.
pub struct SingleThreadExchange<T: Scalar> {
    grid: ThreadGrid,
    staging: HaloStaging<T>,
    barrier: Barrier,
    boundary: BoundaryCondition,
}

impl<T: Scalar> SingleThreadExchange<T> {
    pub fn new(lattice: &Lattice, boundary: BoundaryCondition) -> Self {
        Self {
            grid: ThreadGrid::new([1, 1, 1], lattice.dim),
            staging: HaloStaging::new(1, face_lens(lattice)),
            barrier: Barrier::new(1),
            boundary,
        }
    }

    pub fn run(&self, lattice: &Lattice, amplitudes: &mut [T]) {
        exchange_halos(
            lattice,
            &self.grid,
            0,
            self.boundary,
            &self.staging,
            &self.barrier,
            amplitudes,
        );
    }
}

pub fn periodic_chain(n_sites: usize, stride: usize, ghost: usize) -> Lattice {
    Lattice::new(
        1,
        [n_sites, 1, 1],
        1,
        stride,
        ghost,
        [[0.0; 3]; 3],
        BoundaryCondition::Periodic,
    )
    .unwrap()
}

pub fn hopping_chain(t: f64, n_tiles: usize) -> Hamiltonian<f64> {
    Hamiltonian::builder(1, n_tiles)
        .hopping(0, Hopping::new([1, 0, 0], 0, t))
        .hopping(0, Hopping::new([-1, 0, 0], 0, t))
        .build()
}

pub fn square_lattice(side: usize, stride: usize, ghost: usize) -> Lattice {
    Lattice::new(
        2,
        [side, side, 1],
        1,
        stride,
        ghost,
        [[0.0; 3]; 3],
        BoundaryCondition::Periodic,
    )
    .unwrap()
}

pub fn hopping_square(t: f64, n_tiles: usize) -> Hamiltonian<f64> {
    Hamiltonian::builder(1, n_tiles)
        .hopping(0, Hopping::new([1, 0, 0], 0, t))
        .hopping(0, Hopping::new([-1, 0, 0], 0, t))
        .hopping(0, Hopping::new([0, 1, 0], 0, t))
        .hopping(0, Hopping::new([0, -1, 0], 0, t))
        .build()
}

pub fn cubic_lattice(side: usize, stride: usize, ghost: usize) -> Lattice {
    Lattice::new(
        3,
        [side, side, side],
        1,
        stride,
        ghost,
        [[0.0; 3]; 3],
        BoundaryCondition::Periodic,
    )
    .unwrap()
}

pub fn hopping_cubic(t: f64, n_tiles: usize) -> Hamiltonian<f64> {
    Hamiltonian::builder(1, n_tiles)
        .hopping(0, Hopping::new([1, 0, 0], 0, t))
        .hopping(0, Hopping::new([-1, 0, 0], 0, t))
        .hopping(0, Hopping::new([0, 1, 0], 0, t))
        .hopping(0, Hopping::new([0, -1, 0], 0, t))
        .hopping(0, Hopping::new([0, 0, 1], 0, t))
        .hopping(0, Hopping::new([0, 0, -1], 0, t))
        .build()
}

/// Exact `Tr T_n(H)` for `n in 0..num_moments`, restricted to the bulk
/// region of a single-thread lattice, summed over every basis site
/// `e_i` (excluding any site zeroed by a vacancy, whose trace contribution
/// is exactly zero) — the same number a dense diagonalization of `H` would
/// give, since `Tr T_n(H) = sum_k T_n(lambda_k)` over `H`'s eigenvalues.
/// Normalized by the live (non-vacancy) bulk site count, matching the
/// stochastic estimator's `init_random` normalization.
pub fn exact_dos_moments(
    lattice: &Lattice,
    hamiltonian: &Hamiltonian<f64>,
    vacancies: &[usize],
    num_moments: usize,
) -> Vec<f64> {
    let exch = SingleThreadExchange::new(lattice, BoundaryCondition::Periodic);
    let vacant: std::collections::HashSet<usize> = vacancies.iter().copied().collect();
    let bulk_sites: Vec<_> = lattice
        .bulk_cells()
        .flat_map(|coord| (0..lattice.orbitals).map(move |o| lattice.site_linear_index(coord, o)))
        .filter(|s| !vacant.contains(s))
        .collect();
    let n_sites = bulk_sites.len();
    let mut trace = vec![0.0f64; num_moments];
    for &site in &bulk_sites {
        let mut seed = vec![0.0f64; lattice.n_d()];
        seed[site] = 1.0;
        let sequence =
            chebyshev_sequence(lattice, hamiltonian, &seed, num_moments, |a| exch.run(lattice, a))
                .unwrap();
        for (n, psi_n) in sequence.iter().enumerate() {
            trace[n] += bulk_dot(lattice, &seed, psi_n);
        }
    }
    for t in trace.iter_mut() {
        *t /= n_sites as f64;
    }
    trace
}
