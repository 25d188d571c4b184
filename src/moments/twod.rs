//! 2D moment accumulator (§4.6):
//! `mu[n + n0*m] = <0| v^alpha T_n(H) v^beta T_m(H) |0>`.
//!
//! Writing `A = v^alpha T_n(H)` and `B = v^beta T_m(H)`, `<0|A B|0> =
//! <A^dagger 0|B 0>` with `A^dagger = T_n(H) * hermiticity_sign(alpha) *
//! v^alpha` (H Hermitian, `T_n(H)` Hermitian, `v^alpha^dagger =
//! hermiticity_sign(alpha) * v^alpha`). So the left ("bra") sequence is the
//! Chebyshev recursion of `H` seeded at `v^alpha|0>`, scaled once by
//! `hermiticity_sign(alpha)`; the right ("ket") sequence is the plain
//! Chebyshev recursion of `H` seeded at `|0>`, with `v^beta` applied to
//! each produced vector afterward (velocity and `T_m(H)` do not commute, so
//! it must be applied after the recursion step, not folded into the seed).

use crate::error::KpmResult;
use crate::hamiltonian::{hermiticity_sign, Hamiltonian};
use crate::lattice::Lattice;
use crate::moments::chain::{apply_velocity_to_sequence, bulk_dot, chebyshev_sequence, velocity_seed};
use crate::moments::welford::RunningMoments;
use crate::scalar::Scalar;

/// Fold one random vector's contribution into `running` (length
/// `n0 * n1`, row-major with `n` the fast index, matching `mu[n + n0*m]`).
#[allow(clippy::too_many_arguments)]
pub fn accumulate_sample<T: Scalar>(
    lattice: &Lattice,
    hamiltonian: &mut Hamiltonian<T>,
    seed: &[T],
    axes_alpha: &[usize],
    axes_beta: &[usize],
    n0: usize,
    n1: usize,
    running: &mut RunningMoments<T>,
    mut exchange: impl FnMut(&mut [T]),
) -> KpmResult<()> {
    debug_assert_eq!(running.len(), n0 * n1);

    let sign_alpha = if axes_alpha.is_empty() {
        1.0
    } else {
        hermiticity_sign(axes_alpha)
    };

    let bra_seed = velocity_seed(lattice, hamiltonian, axes_alpha, seed)?;
    let bra_sequence = chebyshev_sequence(lattice, hamiltonian, &bra_seed, n0, &mut exchange)?;
    let ket_pre = chebyshev_sequence(lattice, hamiltonian, seed, n1, &mut exchange)?;
    let ket_sequence = apply_velocity_to_sequence(lattice, hamiltonian, axes_beta, ket_pre)?;

    let mut sample = vec![T::zero(); n0 * n1];
    for m in 0..n1 {
        for n in 0..n0 {
            sample[n + n0 * m] =
                bulk_dot(lattice, &bra_sequence[n], &ket_sequence[m]).scale(sign_alpha);
        }
    }
    running.update(&sample);
    Ok(())
}
