//! Regular (translationally-defined) hopping lists, per orbital.

use crate::scalar::Scalar;

/// One hopping term `(delta, amplitude)` attached to a source orbital.
#[derive(Clone, Copy, Debug)]
pub struct Hopping<T: Scalar> {
    /// Integer lattice displacement to the destination site.
    pub delta: [i32; 3],
    /// Destination orbital (may differ from the source orbital).
    pub dst_orbital: usize,
    pub amplitude: T,
}

impl<T: Scalar> Hopping<T> {
    pub fn new(delta: [i32; 3], dst_orbital: usize, amplitude: T) -> Self {
        Self {
            delta,
            dst_orbital,
            amplitude,
        }
    }
}

/// Regular part of H: for each source orbital, the list of hoppings it
/// emits.
#[derive(Clone, Debug, Default)]
pub struct RegularPart<T: Scalar> {
    pub per_orbital: Vec<Vec<Hopping<T>>>,
}

impl<T: Scalar> RegularPart<T> {
    pub fn new(orbitals: usize) -> Self {
        Self {
            per_orbital: vec![Vec::new(); orbitals],
        }
    }

    pub fn add_hopping(&mut self, src_orbital: usize, hopping: Hopping<T>) {
        self.per_orbital[src_orbital].push(hopping);
    }
}
