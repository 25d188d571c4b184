//! Lattice & Coordinates (§4.1).
//!
//! A `Lattice` describes one thread's local subdomain: its size including
//! ghost layers, the orbital count, the cache-blocking tile side, and the
//! Peierls vector potential. Coordinates are represented as fixed-size
//! `[usize; 3]` / `[i32; 3]` triples with unused trailing axes pinned to 1
//! (size) or 0 (offset) rather than a `Vec`, so arithmetic stays allocation-
//! free regardless of `dim`.

mod coords;
mod tiles;

pub use coords::SiteIndex;
pub use tiles::{tile_cells, BulkCellIter, TileOriginIter};

use crate::error::{KpmError, KpmResult};
use serde::{Deserialize, Serialize};

/// How a thread's ghost faces are filled when there is no neighbor in a
/// given direction (a subdomain at the edge of an open, non-periodic job).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryCondition {
    Periodic,
    Open,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lattice {
    /// Lattice dimension, 1..=3.
    pub dim: usize,
    /// Per-thread local extent including ghosts on both faces of each axis.
    /// Unused trailing axes (index >= dim) are fixed at 1.
    pub local_extent: [usize; 3],
    /// Orbitals per site.
    pub orbitals: usize,
    /// Tile side STRIDE; must be a power of two and divide the bulk extent.
    pub stride: usize,
    /// Ghost layer width N_g (>= 1).
    pub ghost_width: usize,
    /// Vector potential matrix A (D x D used, rest zero). Hopping r -> r+d
    /// picks up a phase exp(i * d^T A r).
    pub vector_potential: [[f64; 3]; 3],
    pub boundary: BoundaryCondition,
    /// Job-global coordinate of this thread's local origin (local `[0,0,0]`,
    /// ghosts included) — set once at thread startup from the thread's
    /// position in the thread grid, used to evaluate the Peierls phase at
    /// the correct absolute position.
    pub global_origin: [i64; 3],
}

impl Lattice {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dim: usize,
        local_extent: [usize; 3],
        orbitals: usize,
        stride: usize,
        ghost_width: usize,
        vector_potential: [[f64; 3]; 3],
        boundary: BoundaryCondition,
    ) -> KpmResult<Self> {
        if !(1..=3).contains(&dim) {
            return Err(KpmError::config(format!(
                "dimension must be in 1..=3, got {dim}"
            )));
        }
        if orbitals == 0 {
            return Err(KpmError::config("orbital count must be >= 1"));
        }
        if ghost_width == 0 {
            return Err(KpmError::config("ghost width must be >= 1"));
        }
        if !stride.is_power_of_two() {
            return Err(KpmError::config(format!(
                "tile stride must be a power of two, got {stride}"
            )));
        }
        for d in 0..dim {
            let bulk = local_extent[d]
                .checked_sub(2 * ghost_width)
                .ok_or_else(|| {
                    KpmError::config(format!(
                        "axis {d}: local extent {} too small for ghost width {ghost_width}",
                        local_extent[d]
                    ))
                })?;
            if bulk == 0 || bulk % stride != 0 {
                return Err(KpmError::config(format!(
                    "axis {d}: bulk extent {bulk} is not a positive multiple of stride {stride}"
                )));
            }
        }
        for d in dim..3 {
            if local_extent[d] != 1 {
                return Err(KpmError::config(format!(
                    "axis {d} is unused (dim={dim}) but local_extent[{d}] != 1"
                )));
            }
        }
        Ok(Self {
            dim,
            local_extent,
            orbitals,
            stride,
            ghost_width,
            vector_potential,
            boundary,
            global_origin: [0; 3],
        })
    }

    /// Fix this thread's position in the job-global lattice; called once
    /// by the engine at thread startup.
    pub fn with_global_origin(mut self, origin: [i64; 3]) -> Self {
        self.global_origin = origin;
        self
    }

    /// The job-global coordinate corresponding to a local coordinate
    /// (ghosts included) on this thread.
    #[inline]
    pub fn global_coord(&self, local: [usize; 3]) -> [i64; 3] {
        let mut g = self.global_origin;
        for d in 0..self.dim {
            g[d] += local[d] as i64;
        }
        g
    }

    /// Linear index into a per-orbital array (no orbital offset), used for
    /// per-site Anderson disorder tables sized `sites_per_orbital()`.
    #[inline]
    pub fn coord_linear_index(&self, coord: [usize; 3]) -> usize {
        let [sx, sy, _] = self.local_extent;
        let [x, y, z] = coord;
        (z * sy + y) * sx + x
    }

    /// Bulk (non-ghost) extent along axis `d`.
    #[inline]
    pub fn bulk_extent(&self, d: usize) -> usize {
        if d < self.dim {
            self.local_extent[d] - 2 * self.ghost_width
        } else {
            1
        }
    }

    /// Total sites (including ghosts) per orbital.
    #[inline]
    pub fn sites_per_orbital(&self) -> usize {
        self.local_extent[0] * self.local_extent[1] * self.local_extent[2]
    }

    /// Total amplitudes (site-orbitals) carried by one KPM vector slot.
    #[inline]
    pub fn n_d(&self) -> usize {
        self.sites_per_orbital() * self.orbitals
    }

    /// Row-major linear index with the orbital as the slowest axis.
    #[inline]
    pub fn site_linear_index(&self, coord: [usize; 3], orbital: usize) -> SiteIndex {
        let [sx, sy, sz] = self.local_extent;
        let [x, y, z] = coord;
        debug_assert!(x < sx && y < sy && z < sz && orbital < self.orbitals);
        let site = (z * sy + y) * sx + x;
        site + orbital * (sx * sy * sz)
    }

    /// Inverse of `site_linear_index`.
    #[inline]
    pub fn split_linear_index(&self, index: SiteIndex) -> ([usize; 3], usize) {
        let [sx, sy, sz] = self.local_extent;
        let per_orbital = sx * sy * sz;
        let orbital = index / per_orbital;
        let site = index % per_orbital;
        let x = site % sx;
        let y = (site / sx) % sy;
        let z = site / (sx * sy);
        ([x, y, z], orbital)
    }

    /// True if `coord` lies in the bulk (non-ghost) region on every used axis.
    #[inline]
    pub fn is_bulk(&self, coord: [usize; 3]) -> bool {
        for d in 0..self.dim {
            let ng = self.ghost_width;
            if coord[d] < ng || coord[d] >= self.local_extent[d] - ng {
                return false;
            }
        }
        true
    }

    /// Peierls phase argument `phi = delta^T A r` for a hop with integer
    /// displacement `delta` originating at job-global coordinate `r`.
    pub fn peierls_phase_arg(&self, delta: [i32; 3], global_r: [i64; 3]) -> f64 {
        let mut phi = 0.0;
        for a in 0..self.dim {
            if delta[a] == 0 {
                continue;
            }
            let mut row = 0.0;
            for b in 0..self.dim {
                row += self.vector_potential[a][b] * global_r[b] as f64;
            }
            phi += delta[a] as f64 * row;
        }
        phi
    }

    /// Add an integer displacement to a local coordinate, wrapping within
    /// the full local extent (including ghosts) — used only for tile-
    /// internal arithmetic where the result is guaranteed to land inside
    /// the allocated array (the ghost layer is exactly wide enough to
    /// absorb one hop's worth of displacement for the hopping ranges this
    /// engine supports).
    #[inline]
    pub fn offset(&self, coord: [usize; 3], delta: [i32; 3]) -> Option<[usize; 3]> {
        let mut out = [0usize; 3];
        for d in 0..3 {
            let v = coord[d] as i64 + delta[d] as i64;
            if v < 0 || v >= self.local_extent[d] as i64 {
                return None;
            }
            out[d] = v as usize;
        }
        Some(out)
    }

    pub fn tile_origins(&self) -> TileOriginIter {
        tiles::TileOriginIter::new(self)
    }

    pub fn bulk_cells(&self) -> BulkCellIter {
        tiles::BulkCellIter::new(self)
    }

    pub fn n_tiles(&self) -> usize {
        let mut n = 1;
        for d in 0..self.dim {
            n *= self.bulk_extent(d) / self.stride;
        }
        n
    }
}
