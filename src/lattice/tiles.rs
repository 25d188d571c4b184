//! Tile-major traversal of the bulk region (§4.1 edge case: all bulk
//! traversals are tile-major so the hopping-coefficient list stays hot).

use super::Lattice;

/// Iterates the origin (local coordinate of the tile's lowest corner) of
/// every STRIDE^dim tile in the bulk, in row-major tile order.
pub struct TileOriginIter {
    ghost: usize,
    stride: usize,
    tiles_per_axis: [usize; 3],
    next: usize,
    total: usize,
}

impl TileOriginIter {
    pub(super) fn new(lattice: &Lattice) -> Self {
        let mut tiles_per_axis = [1usize; 3];
        for d in 0..lattice.dim {
            tiles_per_axis[d] = lattice.bulk_extent(d) / lattice.stride;
        }
        let total = tiles_per_axis[0] * tiles_per_axis[1] * tiles_per_axis[2];
        Self {
            ghost: lattice.ghost_width,
            stride: lattice.stride,
            tiles_per_axis,
            next: 0,
            total,
        }
    }
}

impl Iterator for TileOriginIter {
    type Item = ([usize; 3], usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let [tx, ty, tz] = self.tiles_per_axis;
        let flat = self.next;
        let x = flat % tx;
        let y = (flat / tx) % ty;
        let z = flat / (tx * ty);
        let origin = [
            self.ghost + x * self.stride,
            self.ghost + y * self.stride,
            self.ghost + z * self.stride,
        ];
        let tile_index = self.next;
        self.next += 1;
        Some((origin, tile_index))
    }
}

/// Iterates every local coordinate inside one tile, given its origin.
pub fn tile_cells(origin: [usize; 3], stride: usize, dim: usize) -> impl Iterator<Item = [usize; 3]> {
    let extent = [
        stride,
        if dim > 1 { stride } else { 1 },
        if dim > 2 { stride } else { 1 },
    ];
    (0..extent[2]).flat_map(move |dz| {
        (0..extent[1]).flat_map(move |dy| {
            (0..extent[0]).map(move |dx| [origin[0] + dx, origin[1] + dy, origin[2] + dz])
        })
    })
}

/// Iterates every bulk cell of the lattice directly (tile-major, via
/// `TileOriginIter` + `tile_cells`) without needing the caller to nest the
/// two loops itself.
pub struct BulkCellIter {
    origins: TileOriginIter,
    stride: usize,
    dim: usize,
    current: Option<Box<dyn Iterator<Item = [usize; 3]>>>,
}

impl BulkCellIter {
    pub(super) fn new(lattice: &Lattice) -> Self {
        Self {
            origins: TileOriginIter::new(lattice),
            stride: lattice.stride,
            dim: lattice.dim,
            current: None,
        }
    }
}

impl Iterator for BulkCellIter {
    type Item = [usize; 3];

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(it) = self.current.as_mut() {
                if let Some(c) = it.next() {
                    return Some(c);
                }
            }
            let (origin, _) = self.origins.next()?;
            self.current = Some(Box::new(tile_cells(origin, self.stride, self.dim)));
        }
    }
}
