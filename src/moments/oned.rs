//! 1D moment accumulator (§4.6): `mu[n] = <0| v^alpha T_n(H) |0>`.

use crate::error::KpmResult;
use crate::hamiltonian::{hermiticity_sign, Hamiltonian};
use crate::lattice::Lattice;
use crate::moments::chain::{bulk_dot, chebyshev_sequence};
use crate::moments::welford::RunningMoments;
use crate::recursion::apply_velocity;
use crate::scalar::Scalar;

/// Fold one random vector's contribution into `running`, whose length fixes
/// the number of moments `N` computed (`mu[0..N]`).
///
/// `axes` selects the (optional) velocity operator left-multiplying the
/// bra: empty means no velocity factor (a plain density-of-states moment),
/// one axis is `v^alpha`, two axes is `v^{alpha beta}`. When non-empty, the
/// bra is scaled by `hermiticity_sign(axes)` to compensate `v^alpha`'s
/// anti-Hermiticity before forming the bilinear form (§4.4, §4.6).
pub fn accumulate_sample<T: Scalar>(
    lattice: &Lattice,
    hamiltonian: &mut Hamiltonian<T>,
    seed: &[T],
    axes: &[usize],
    running: &mut RunningMoments<T>,
    mut exchange: impl FnMut(&mut [T]),
) -> KpmResult<()> {
    let num_moments = running.len();
    let bra = if axes.is_empty() {
        seed.to_vec()
    } else {
        let mut out = vec![T::zero(); lattice.n_d()];
        apply_velocity(lattice, hamiltonian, axes, seed, &mut out)?;
        let sign = hermiticity_sign(axes);
        out.iter_mut().for_each(|v| *v = v.scale(sign));
        out
    };

    let sequence = chebyshev_sequence(lattice, hamiltonian, seed, num_moments, &mut exchange)?;
    let mut sample = vec![T::zero(); num_moments];
    for (n, psi_n) in sequence.iter().enumerate() {
        sample[n] = bulk_dot(lattice, &bra, psi_n);
    }
    running.update(&sample);
    Ok(())
}
