//! Two-barrier ghost exchange between thread subdomains (§4.5).
//!
//! Phase 1: every thread gathers its own bulk-boundary face (the layer
//! just inside the bulk, `ghost_width` cells wide) for each axis/side and
//! writes it into its own slot of a shared staging area. Phase 2: every
//! thread reads its neighbor's opposite-side slot and scatters it into its
//! own ghost layer. A `std::sync::Barrier` separates the phases so no
//! thread reads a neighbor's slot before that neighbor has written it.
//! Staging slots are addressed one-per-(thread, axis, side) and each is
//! written by exactly one thread and read by exactly one other, so the
//! shared buffer needs no per-access lock — the same "disjoint-slice,
//! index-addressed" sharing `swarm::tensor_engine` uses for its SoA
//! fields.

use crate::lattice::{BoundaryCondition, Lattice, SiteIndex};
use crate::scalar::Scalar;
use serde::{Deserialize, Serialize};
use std::cell::UnsafeCell;
use std::ops::Range;
use std::sync::Barrier;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Low = 0,
    High = 1,
}

impl Side {
    #[inline]
    pub fn opposite(self) -> Side {
        match self {
            Side::Low => Side::High,
            Side::High => Side::Low,
        }
    }
}

/// A thread's position in the Cartesian grid of subdomains that tiles the
/// job-global lattice.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThreadGrid {
    pub shape: [usize; 3],
    pub dim: usize,
}

impl ThreadGrid {
    pub fn new(shape: [usize; 3], dim: usize) -> Self {
        Self { shape, dim }
    }

    pub fn n_threads(&self) -> usize {
        self.shape[0] * self.shape[1] * self.shape[2]
    }

    pub fn coord_of(&self, thread_id: usize) -> [usize; 3] {
        let [sx, sy, _] = self.shape;
        let x = thread_id % sx;
        let y = (thread_id / sx) % sy;
        let z = thread_id / (sx * sy);
        [x, y, z]
    }

    pub fn id_of(&self, coord: [usize; 3]) -> usize {
        let [x, y, z] = coord;
        (z * self.shape[1] + y) * self.shape[0] + x
    }

    /// The thread adjoining this one on `side` of `axis`, or `None` at an
    /// open boundary's edge.
    pub fn neighbor(
        &self,
        thread_id: usize,
        axis: usize,
        side: Side,
        boundary: BoundaryCondition,
    ) -> Option<usize> {
        if axis >= self.dim || self.shape[axis] <= 1 {
            return match boundary {
                BoundaryCondition::Periodic if self.shape[axis] == 1 => Some(thread_id),
                _ => None,
            };
        }
        let mut coord = self.coord_of(thread_id);
        let extent = self.shape[axis] as i64;
        let delta = match side {
            Side::Low => -1,
            Side::High => 1,
        };
        let mut v = coord[axis] as i64 + delta;
        match boundary {
            BoundaryCondition::Periodic => v = v.rem_euclid(extent),
            BoundaryCondition::Open => {
                if !(0..extent).contains(&v) {
                    return None;
                }
            }
        }
        coord[axis] = v as usize;
        Some(self.id_of(coord))
    }
}

/// Shared per-thread face buffers. SAFETY: each `(thread_id, axis, side)`
/// slot is written by exactly one thread (its owner) in phase 1 and read
/// by exactly one other thread (the corresponding neighbor) in phase 2;
/// the barrier between phases guarantees the write happens-before the
/// read, so concurrent access to the *same* slot never occurs even though
/// the buffer as a whole is shared without a lock.
pub struct HaloStaging<T: Scalar> {
    buffers: Vec<UnsafeCell<Vec<T>>>,
    n_threads: usize,
}

unsafe impl<T: Scalar> Sync for HaloStaging<T> {}

impl<T: Scalar> HaloStaging<T> {
    /// `face_lens[axis]` sizes every (thread, axis, side) slot for that
    /// axis — lattices need not be cubic, so the face crossing axis 0 can
    /// be a different length than the face crossing axis 1.
    pub fn new(n_threads: usize, face_lens: [usize; 3]) -> Self {
        let mut buffers = Vec::with_capacity(n_threads * 6);
        for _thread in 0..n_threads {
            for axis in 0..3 {
                for _side in 0..2 {
                    buffers.push(UnsafeCell::new(vec![T::zero(); face_lens[axis]]));
                }
            }
        }
        Self { buffers, n_threads }
    }

    #[inline]
    fn slot_index(&self, thread_id: usize, axis: usize, side: Side) -> usize {
        debug_assert!(thread_id < self.n_threads);
        (thread_id * 3 + axis) * 2 + side as usize
    }

    fn write_face(&self, thread_id: usize, axis: usize, side: Side, data: &[T]) {
        // SAFETY: see struct-level comment; `thread_id` is this slot's
        // unique owner during phase 1.
        let slot = unsafe { &mut *self.buffers[self.slot_index(thread_id, axis, side)].get() };
        slot.copy_from_slice(data);
    }

    fn read_face(&self, thread_id: usize, axis: usize, side: Side) -> &[T] {
        // SAFETY: see struct-level comment; phase 1 for `thread_id` has
        // completed (enforced by the barrier) before any phase-2 read.
        unsafe { &*self.buffers[self.slot_index(thread_id, axis, side)].get() }
    }
}

fn axis_range(lattice: &Lattice, axis: usize, side: Side, ghost_layer: bool) -> Range<usize> {
    let ng = lattice.ghost_width;
    let ext = lattice.local_extent[axis];
    match (side, ghost_layer) {
        (Side::Low, false) => ng..2 * ng,
        (Side::Low, true) => 0..ng,
        (Side::High, false) => (ext - 2 * ng)..(ext - ng),
        (Side::High, true) => (ext - ng)..ext,
    }
}

fn iterate_face(
    lattice: &Lattice,
    axis: usize,
    range: Range<usize>,
) -> impl Iterator<Item = [usize; 3]> + '_ {
    let full = lattice.local_extent;
    let rx = if axis == 0 { range.clone() } else { 0..full[0] };
    let ry = if axis == 1 { range.clone() } else { 0..full[1] };
    let rz = if axis == 2 { range } else { 0..full[2] };
    rz.flat_map(move |z| {
        let ry = ry.clone();
        ry.flat_map(move |y| {
            let rx = rx.clone();
            rx.map(move |x| [x, y, z])
        })
    })
}

pub fn face_len(lattice: &Lattice, axis: usize) -> usize {
    iterate_face(lattice, axis, axis_range(lattice, axis, Side::Low, false)).count()
        * lattice.orbitals
}

/// Per-axis face lengths, ready to pass to `HaloStaging::new`. Unused
/// trailing axes (`axis >= lattice.dim`) get length 0.
pub fn face_lens(lattice: &Lattice) -> [usize; 3] {
    let mut lens = [0usize; 3];
    for axis in 0..lattice.dim {
        lens[axis] = face_len(lattice, axis);
    }
    lens
}

fn gather_face<T: Scalar>(lattice: &Lattice, amplitudes: &[T], axis: usize, side: Side) -> Vec<T> {
    let range = axis_range(lattice, axis, side, false);
    let mut out = Vec::with_capacity(face_len(lattice, axis));
    for orbital in 0..lattice.orbitals {
        for coord in iterate_face(lattice, axis, range.clone()) {
            out.push(amplitudes[lattice.site_linear_index(coord, orbital)]);
        }
    }
    out
}

fn scatter_ghost<T: Scalar>(
    lattice: &Lattice,
    amplitudes: &mut [T],
    axis: usize,
    side: Side,
    face: &[T],
) {
    let range = axis_range(lattice, axis, side, true);
    let mut i = 0;
    for orbital in 0..lattice.orbitals {
        for coord in iterate_face(lattice, axis, range.clone()) {
            amplitudes[lattice.site_linear_index(coord, orbital)] = face[i];
            i += 1;
        }
    }
}

fn zero_ghost<T: Scalar>(lattice: &Lattice, amplitudes: &mut [T], axis: usize, side: Side) {
    let range = axis_range(lattice, axis, side, true);
    for orbital in 0..lattice.orbitals {
        for coord in iterate_face(lattice, axis, range.clone()) {
            amplitudes[lattice.site_linear_index(coord, orbital)] = T::zero();
        }
    }
}

/// Vacant local (site, orbital) indices in this thread's ghost region,
/// useful for callers that want to assert those amplitudes stay zero.
pub fn ghost_site_indices(lattice: &Lattice) -> Vec<SiteIndex> {
    let mut out = Vec::new();
    for axis in 0..lattice.dim {
        for side in [Side::Low, Side::High] {
            let range = axis_range(lattice, axis, side, true);
            for orbital in 0..lattice.orbitals {
                for coord in iterate_face(lattice, axis, range.clone()) {
                    out.push(lattice.site_linear_index(coord, orbital));
                }
            }
        }
    }
    out
}

/// Run one full two-phase halo exchange for this thread's amplitude
/// buffer. Blocks on `barrier` twice: once after every thread has staged
/// its own faces, once after every thread has consumed its neighbors'.
#[allow(clippy::too_many_arguments)]
pub fn exchange_halos<T: Scalar>(
    lattice: &Lattice,
    grid: &ThreadGrid,
    thread_id: usize,
    boundary: BoundaryCondition,
    staging: &HaloStaging<T>,
    barrier: &Barrier,
    amplitudes: &mut [T],
) {
    for axis in 0..lattice.dim {
        for side in [Side::Low, Side::High] {
            let face = gather_face(lattice, amplitudes, axis, side);
            staging.write_face(thread_id, axis, side, &face);
        }
    }
    barrier.wait();
    for axis in 0..lattice.dim {
        for side in [Side::Low, Side::High] {
            match grid.neighbor(thread_id, axis, side, boundary) {
                Some(neighbor_id) => {
                    let face = staging.read_face(neighbor_id, axis, side.opposite());
                    scatter_ghost(lattice, amplitudes, axis, side, face);
                }
                None => zero_ghost(lattice, amplitudes, axis, side),
            }
        }
    }
    barrier.wait();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::BoundaryCondition;

    fn lattice_1d() -> Lattice {
        Lattice::new(1, [8, 1, 1], 1, 2, 1, [[0.0; 3]; 3], BoundaryCondition::Periodic).unwrap()
    }

    #[test]
    fn ring_of_two_threads_exchanges_both_directions() {
        let lattice = lattice_1d();
        let grid = ThreadGrid::new([2, 1, 1], 1);
        let staging: HaloStaging<f64> = HaloStaging::new(2, face_lens(&lattice));
        let barrier = Barrier::new(2);

        std::thread::scope(|s| {
            let mut amp_a = vec![0.0; lattice.n_d()];
            let mut amp_b = vec![0.0; lattice.n_d()];
            // mark each thread's bulk boundary with a distinct value
            amp_a[lattice.site_linear_index([1, 0, 0], 0)] = 11.0;
            amp_a[lattice.site_linear_index([6, 0, 0], 0)] = 16.0;
            amp_b[lattice.site_linear_index([1, 0, 0], 0)] = 21.0;
            amp_b[lattice.site_linear_index([6, 0, 0], 0)] = 26.0;

            let grid = &grid;
            let staging = &staging;
            let barrier = &barrier;
            let lattice = &lattice;
            s.spawn(move || {
                exchange_halos(
                    lattice,
                    grid,
                    0,
                    BoundaryCondition::Periodic,
                    staging,
                    barrier,
                    &mut amp_a,
                );
                assert_eq!(amp_a[lattice.site_linear_index([0, 0, 0], 0)], 26.0);
                assert_eq!(amp_a[lattice.site_linear_index([7, 0, 0], 0)], 21.0);
            });
            s.spawn(move || {
                exchange_halos(
                    lattice,
                    grid,
                    1,
                    BoundaryCondition::Periodic,
                    staging,
                    barrier,
                    &mut amp_b,
                );
                assert_eq!(amp_b[lattice.site_linear_index([0, 0, 0], 0)], 16.0);
                assert_eq!(amp_b[lattice.site_linear_index([7, 0, 0], 0)], 11.0);
            });
        });
    }

    #[test]
    fn open_boundary_edge_ghost_is_zeroed() {
        let lattice = lattice_1d();
        let grid = ThreadGrid::new([1, 1, 1], 1);
        let staging: HaloStaging<f64> = HaloStaging::new(1, face_lens(&lattice));
        let barrier = Barrier::new(1);
        let mut amp = vec![0.0; lattice.n_d()];
        amp[lattice.site_linear_index([0, 0, 0], 0)] = 99.0;
        exchange_halos(
            &lattice,
            &grid,
            0,
            BoundaryCondition::Open,
            &staging,
            &barrier,
            &mut amp,
        );
        assert_eq!(amp[lattice.site_linear_index([0, 0, 0], 0)], 0.0);
    }
}
