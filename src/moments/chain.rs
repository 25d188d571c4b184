//! Shared recursion-stepping helpers used by the 1D/2D/3D moment
//! accumulators: a bulk-restricted inner product and a helper that steps a
//! `KpmVector` through the Chebyshev recursion, exchanging halos after
//! every step.
//!
//! `bulk_dot` sums only over the bulk region directly rather than zeroing
//! ghost cells first and then summing over the whole buffer (§4.3
//! `empty_ghosts()`) — restricting the traversal to the bulk makes the
//! zero-then-sum step unnecessary.
//!
//! `chebyshev_sequence` materializes every `T_n(H)|seed>` vector in the
//! requested range up front rather than keeping only the MEMORY-wide block
//! the original `§2` block-dot-product optimization describes (see
//! DESIGN.md): this engine trades that cache-blocking optimization for a
//! simpler accumulator, at the cost of `O(num_moments * n_d)` working
//! memory per random vector.

use crate::error::KpmResult;
use crate::hamiltonian::Hamiltonian;
use crate::lattice::Lattice;
use crate::recursion::{self, apply_velocity, apply_velocity_with_table, RecursionMode};
use crate::scalar::Scalar;
use crate::vector::KpmVector;

/// `<bra|ket>` restricted to the bulk (non-ghost) region of `lattice`.
pub fn bulk_dot<T: Scalar>(lattice: &Lattice, bra: &[T], ket: &[T]) -> T {
    let mut acc = T::zero();
    for coord in lattice.bulk_cells() {
        for orbital in 0..lattice.orbitals {
            let site = lattice.site_linear_index(coord, orbital);
            acc = acc + bra[site].conj() * ket[site];
        }
    }
    acc
}

/// Advance `vector` by one Chebyshev recursion step (`mode` selects the
/// MULT=0 bootstrap or the MULT=1 true step), exchanging halos on the
/// freshly written slot before it becomes the new `psi_n`.
pub fn step<T: Scalar>(
    lattice: &Lattice,
    hamiltonian: &Hamiltonian<T>,
    mode: RecursionMode,
    vector: &mut KpmVector<T>,
    mut exchange: impl FnMut(&mut [T]),
) -> KpmResult<()> {
    let psi_n = vector.current().to_vec();
    let psi_nm1 = vector.previous(1).to_vec();
    recursion::multiply(
        lattice,
        hamiltonian,
        mode,
        &psi_n,
        &psi_nm1,
        vector.next_slot_mut(),
    )?;
    exchange(vector.next_slot_mut());
    vector.advance();
    Ok(())
}

/// `[T_0(H)|seed>, T_1(H)|seed>, ..., T_{count-1}(H)|seed>]`, each entry a
/// full (bulk + ghost) amplitude snapshot with ghosts already exchanged.
pub fn chebyshev_sequence<T: Scalar>(
    lattice: &Lattice,
    hamiltonian: &Hamiltonian<T>,
    seed: &[T],
    count: usize,
    mut exchange: impl FnMut(&mut [T]),
) -> KpmResult<Vec<Vec<T>>> {
    let mut vector = KpmVector::new(3, lattice.n_d())?;
    vector.seed(seed);
    exchange(vector.current_mut());
    let mut out = Vec::with_capacity(count);
    if count == 0 {
        return Ok(out);
    }
    out.push(vector.current().to_vec());
    if count > 1 {
        step(lattice, hamiltonian, RecursionMode::Init, &mut vector, &mut exchange)?;
        out.push(vector.current().to_vec());
    }
    for _ in 2..count {
        step(lattice, hamiltonian, RecursionMode::Step, &mut vector, &mut exchange)?;
        out.push(vector.current().to_vec());
    }
    Ok(out)
}

/// Apply the velocity operator along `axes` to `seed`, or return `seed`
/// unchanged if `axes` is empty (no velocity factor requested).
pub fn velocity_seed<T: Scalar>(
    lattice: &Lattice,
    hamiltonian: &mut Hamiltonian<T>,
    axes: &[usize],
    seed: &[T],
) -> KpmResult<Vec<T>> {
    if axes.is_empty() {
        return Ok(seed.to_vec());
    }
    let mut out = vec![T::zero(); lattice.n_d()];
    apply_velocity(lattice, hamiltonian, axes, seed, &mut out)?;
    Ok(out)
}

/// Apply the velocity operator along `axes` to every vector in `sequence`,
/// or return `sequence` unchanged if `axes` is empty.
pub fn apply_velocity_to_sequence<T: Scalar>(
    lattice: &Lattice,
    hamiltonian: &mut Hamiltonian<T>,
    axes: &[usize],
    sequence: Vec<Vec<T>>,
) -> KpmResult<Vec<Vec<T>>> {
    if axes.is_empty() {
        return Ok(sequence);
    }
    let velocity = hamiltonian.velocity_table(axes)?.clone();
    let mut out_seq = Vec::with_capacity(sequence.len());
    for psi in &sequence {
        let mut out = vec![T::zero(); lattice.n_d()];
        apply_velocity_with_table(lattice, &velocity, hamiltonian, axes, psi, &mut out)?;
        out_seq.push(out);
    }
    Ok(out_seq)
}
