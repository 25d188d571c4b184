//! Velocity operators: `v^a = i[x_a, H]` and `v^{ab} = i^2[x_b,[x_a,H]]`,
//! precomputed once from the regular hopping table (§4.2, §9 anti-
//! Hermiticity compensation).

use super::hopping::{Hopping, RegularPart};
use crate::error::{KpmError, KpmResult};
use crate::scalar::Scalar;

/// A velocity operator has exactly the same sparse shape as the regular
/// hopping table it was derived from — only the amplitudes change — so it
/// is represented with the same type.
pub type VelocityTable<T> = RegularPart<T>;

/// Validate an axis list shared by every velocity-construction entry point
/// (the regular-part table and the structural/border bond scaling applied
/// on the fly in `recursion::apply_velocity`).
pub(crate) fn validate_axes<T: Scalar>(axes: &[usize]) -> KpmResult<()> {
    if axes.is_empty() || axes.len() > 2 {
        return Err(KpmError::config(format!(
            "velocity operators support 1 or 2 axes, got {}",
            axes.len()
        )));
    }
    if !T::IS_COMPLEX {
        return Err(KpmError::config(
            "velocity operators are intrinsically complex (anti-Hermitian \
             commutators); request them with a complex scalar type",
        ));
    }
    for &axis in axes {
        if axis >= 3 {
            return Err(KpmError::config(format!("axis {axis} out of range")));
        }
    }
    Ok(())
}

/// `i * delta[axes[0]] * (i * delta[axes[1]] * ...) * amplitude`, or `None`
/// if the bond doesn't move along one of `axes` (its commutator with that
/// axis vanishes). One axis gives `v^a = i delta_a t`; two axes nest a
/// second commutator, giving `v^{ab} = i^2 delta_a delta_b t = -delta_a
/// delta_b t` (§3) — `v^a` is anti-Hermitian and `v^{ab}` Hermitian as a
/// direct consequence, with no separate sign correction folded in here; the
/// caller compensates for the anti-Hermiticity of an odd axis count when
/// forming a bilinear form (§4.6), not here.
pub(crate) fn velocity_scale<T: Scalar>(amplitude: T, delta: [i32; 3], axes: &[usize]) -> Option<T> {
    let mut out = amplitude;
    for &axis in axes {
        let d = delta[axis];
        if d == 0 {
            return None;
        }
        out = out.mul_i().scale(d as f64);
    }
    Some(out)
}

/// Build the velocity operator along `axes` (one axis: `v^a`; two axes:
/// `v^{ab}`, the double commutator) from the regular hopping list. The
/// structural-disorder contribution (impurity-pattern bonds and border
/// bonds) is computed the same way but on the fly, in
/// `recursion::apply_velocity`, since it depends on which anchors are
/// currently realized rather than being a static function of the pattern
/// shape alone.
pub fn build_velocity<T: Scalar>(
    regular: &RegularPart<T>,
    axes: &[usize],
) -> KpmResult<VelocityTable<T>> {
    validate_axes::<T>(axes)?;

    let orbitals = regular.per_orbital.len();
    let mut table = RegularPart::new(orbitals);
    for (src, hops) in regular.per_orbital.iter().enumerate() {
        for h in hops {
            if let Some(amplitude) = velocity_scale(h.amplitude, h.delta, axes) {
                table.add_hopping(src, Hopping::new(h.delta, h.dst_orbital, amplitude));
            }
        }
    }
    Ok(table)
}

/// `(-1)^{axes.len()}`, the sign a caller must apply to one side of a
/// bilinear form built from this velocity operator to compensate its
/// anti-Hermiticity when the axis count is odd (§4.6, §8 "velocity
/// anti-Hermiticity compensation").
pub fn hermiticity_sign(axes: &[usize]) -> f64 {
    if axes.len() % 2 == 1 {
        -1.0
    } else {
        1.0
    }
}
