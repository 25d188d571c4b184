//! 3D moment accumulator (§4.6):
//! `mu[n + n0*m + n0*n1*p] = <0| v^alpha T_n(H) v^beta T_m(H) v^gamma T_p(H) |0>`.
//!
//! Same adjoint argument as the 2D accumulator gives the left ("bra")
//! sequence unchanged: `T_n(H)` recursed from `v^alpha|0>`, scaled once by
//! `hermiticity_sign(alpha)`. The right side nests two velocity
//! insertions: for each `p`, `v^gamma (T_p(H)|0>)` seeds a `T_m(H)`
//! recursion, and `v^beta` is applied to every vector that recursion
//! produces. The outermost `p` loop is therefore the only one that can't
//! share work across its iterations — each `p` reseeds its own `m`
//! sequence — matching spec §4.6's "outermost loop advances the rightmost
//! recursion" structure, simplified (per `chain`'s module doc) to
//! materializing full sequences rather than MEMORY-wide blocks.

use crate::error::KpmResult;
use crate::hamiltonian::{hermiticity_sign, Hamiltonian};
use crate::lattice::Lattice;
use crate::moments::chain::{apply_velocity_to_sequence, bulk_dot, chebyshev_sequence, velocity_seed};
use crate::moments::welford::RunningMoments;
use crate::scalar::Scalar;

#[allow(clippy::too_many_arguments)]
pub fn accumulate_sample<T: Scalar>(
    lattice: &Lattice,
    hamiltonian: &mut Hamiltonian<T>,
    seed: &[T],
    axes_alpha: &[usize],
    axes_beta: &[usize],
    axes_gamma: &[usize],
    n0: usize,
    n1: usize,
    n2: usize,
    running: &mut RunningMoments<T>,
    mut exchange: impl FnMut(&mut [T]),
) -> KpmResult<()> {
    debug_assert_eq!(running.len(), n0 * n1 * n2);

    let sign_alpha = if axes_alpha.is_empty() {
        1.0
    } else {
        hermiticity_sign(axes_alpha)
    };

    let bra_seed = velocity_seed(lattice, hamiltonian, axes_alpha, seed)?;
    let bra_sequence = chebyshev_sequence(lattice, hamiltonian, &bra_seed, n0, &mut exchange)?;

    let gamma_pre = chebyshev_sequence(lattice, hamiltonian, seed, n2, &mut exchange)?;
    let gamma_sequence = apply_velocity_to_sequence(lattice, hamiltonian, axes_gamma, gamma_pre)?;

    let mut sample = vec![T::zero(); n0 * n1 * n2];
    for p in 0..n2 {
        let beta_pre = chebyshev_sequence(lattice, hamiltonian, &gamma_sequence[p], n1, &mut exchange)?;
        let beta_sequence = apply_velocity_to_sequence(lattice, hamiltonian, axes_beta, beta_pre)?;
        for m in 0..n1 {
            for n in 0..n0 {
                sample[n + n0 * m + n0 * n1 * p] =
                    bulk_dot(lattice, &bra_sequence[n], &beta_sequence[m]).scale(sign_alpha);
            }
        }
    }
    running.update(&sample);
    Ok(())
}
