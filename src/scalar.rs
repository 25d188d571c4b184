//! The numeric element type the whole engine is generic over.
//!
//! Monomorphized over `f64` (real Hamiltonians, no magnetic field) and
//! `Complex64` (the general case) rather than dispatched dynamically, per
//! the scalar/dimension design note: the Peierls-phase branch is a
//! compile-time choice baked into each impl, not a runtime `if`.

use num_complex::Complex64;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use std::fmt::Debug;
use std::ops::{Add, Mul, Neg, Sub};

pub trait Scalar:
    Copy
    + Clone
    + Send
    + Sync
    + Debug
    + Default
    + PartialEq
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    /// Compile-time switch for the Peierls-phase branch (§9 design note).
    const IS_COMPLEX: bool;

    fn zero() -> Self {
        Self::default()
    }
    fn from_real(x: f64) -> Self;
    /// Multiply by a real scalar without promoting to `Self`.
    fn scale(self, x: f64) -> Self;
    fn conj(self) -> Self;
    /// Real part, used wherever a scalar quadratic form must collapse to a
    /// real number (e.g. the diagonal of a 1D moment when T is real).
    fn re_part(self) -> f64;
    /// `exp(i * phi)` for complex T; for real T, phi must be (numerically)
    /// zero — a magnetic field with a real scalar type is a configuration
    /// error caught before this is ever called with phi != 0.
    fn peierls_phase(phi: f64) -> Self;
    /// Unit-variance, zero-mean random sample used to seed KPM vectors.
    fn random_unit(rng: &mut impl Rng) -> Self;
    /// Whether `self` is finite (no NaN/inf) — used by the runtime
    /// non-finite check inside the tiled recursion.
    fn is_finite(self) -> bool;
    /// Multiply by the imaginary unit `i`. Only meaningful for `IS_COMPLEX`
    /// types; velocity construction (the only caller) rejects real `T`
    /// before this can be reached.
    fn mul_i(self) -> Self;
}

impl Scalar for f64 {
    const IS_COMPLEX: bool = false;

    fn from_real(x: f64) -> Self {
        x
    }
    fn scale(self, x: f64) -> Self {
        self * x
    }
    fn conj(self) -> Self {
        self
    }
    fn re_part(self) -> f64 {
        self
    }
    fn peierls_phase(phi: f64) -> Self {
        debug_assert!(
            phi.abs() < 1e-9,
            "non-zero Peierls phase requested for a real scalar type"
        );
        1.0
    }
    fn random_unit(rng: &mut impl Rng) -> Self {
        StandardNormal.sample(rng)
    }
    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }
    fn mul_i(self) -> Self {
        unreachable!("mul_i has no real-scalar meaning; callers must gate on IS_COMPLEX first")
    }
}

impl Scalar for Complex64 {
    const IS_COMPLEX: bool = true;

    fn from_real(x: f64) -> Self {
        Complex64::new(x, 0.0)
    }
    fn scale(self, x: f64) -> Self {
        self * x
    }
    fn conj(self) -> Self {
        Complex64::conj(&self)
    }
    fn re_part(self) -> f64 {
        self.re
    }
    fn peierls_phase(phi: f64) -> Self {
        Complex64::new(phi.cos(), phi.sin())
    }
    fn random_unit(rng: &mut impl Rng) -> Self {
        // Each real/imaginary component is an independent unit-variance
        // Gaussian; the 1/sqrt(2) keeps the resulting complex amplitude at
        // unit variance overall, matching the real-T normalization.
        let re: f64 = StandardNormal.sample(rng);
        let im: f64 = StandardNormal.sample(rng);
        Complex64::new(re, im) * std::f64::consts::FRAC_1_SQRT_2
    }
    fn is_finite(self) -> bool {
        self.re.is_finite() && self.im.is_finite()
    }
    fn mul_i(self) -> Self {
        Complex64::new(-self.im, self.re)
    }
}
