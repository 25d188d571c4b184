//! The Chebyshev recursion / Multiply driver (§4.4): `psi_{n+1} = 2 H
//! psi_n - psi_{n-1}`, applied tile-major over the bulk region, plus a
//! single sparse-matrix velocity apply used to insert a `v^a`/`v^{ab}`
//! factor into a moment chain.
//!
//! Structural disorder and vacancies are list-driven corrections applied
//! once per call, independent of how the dense regular-hopping pass is
//! traversed — so the same correction routine backs both the tiled
//! (`multiply`) and row-major (`multiply_simple`) paths, and only the
//! dense pass itself differs between them.

use crate::error::{KpmError, KpmResult};
use crate::hamiltonian::velocity::velocity_scale;
use crate::hamiltonian::Hamiltonian;
use crate::lattice::Lattice;
use crate::scalar::Scalar;

fn row_major_bulk_cells(lattice: &Lattice) -> impl Iterator<Item = [usize; 3]> + '_ {
    let mut ranges = [0..1usize, 0..1usize, 0..1usize];
    for d in 0..lattice.dim {
        let ng = lattice.ghost_width;
        ranges[d] = ng..(ng + lattice.bulk_extent(d));
    }
    let [rx, ry, rz] = ranges;
    rz.flat_map(move |z| {
        let ry = ry.clone();
        ry.flat_map(move |y| {
            let rx = rx.clone();
            rx.map(move |x| [x, y, z])
        })
    })
}

/// Which of the two three-term-recursion coefficient sets `multiply`
/// applies (§4.4): `ψ_new = (MULT+1)·H·ψ_n − MULT·ψ_{n-1}`. `Init` (MULT=0)
/// is a bare `H·ψ_0`, used once to produce `T_1(H)|0⟩` before the true
/// recursion starts; `Step` (MULT=1) is `T_{n+1}` proper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecursionMode {
    Init,
    Step,
}

impl RecursionMode {
    #[inline]
    fn h_factor(self) -> f64 {
        match self {
            RecursionMode::Init => 1.0,
            RecursionMode::Step => 2.0,
        }
    }

    #[inline]
    fn carry_factor(self) -> f64 {
        match self {
            RecursionMode::Init => 0.0,
            RecursionMode::Step => 1.0,
        }
    }
}

fn dense_bulk_pass<T: Scalar>(
    lattice: &Lattice,
    hamiltonian: &Hamiltonian<T>,
    mode: RecursionMode,
    psi_n: &[T],
    psi_nm1: &[T],
    out: &mut [T],
    cells: impl Iterator<Item = [usize; 3]>,
) {
    for coord in cells {
        let site0 = lattice.coord_linear_index(coord);
        let global_r = lattice.global_coord(coord);
        for orbital in 0..lattice.orbitals {
            let site = lattice.site_linear_index(coord, orbital);
            let mut h_psi = T::zero();
            if let Some(u) = hamiltonian.onsite[orbital].at(site0) {
                h_psi = h_psi + u * psi_n[site];
            }
            for hop in &hamiltonian.regular.per_orbital[orbital] {
                if let Some(dst_coord) = lattice.offset(coord, hop.delta) {
                    let dst = lattice.site_linear_index(dst_coord, hop.dst_orbital);
                    let phase = T::peierls_phase(lattice.peierls_phase_arg(hop.delta, global_r));
                    h_psi = h_psi + (hop.amplitude * phase) * psi_n[dst];
                }
            }
            out[site] = h_psi.scale(mode.h_factor()) - psi_nm1[site].scale(mode.carry_factor());
        }
    }
}

/// Apply every impurity pattern's anchored instances (intra-tile nodes and
/// bonds) plus the cross-tile border lists, then zero every vacancy site.
/// Runs after the dense pass so disorder corrections and vacancy zeroing
/// always win over whatever the regular-hopping pass wrote.
fn apply_structural_and_vacancies<T: Scalar>(
    lattice: &Lattice,
    hamiltonian: &Hamiltonian<T>,
    mode: RecursionMode,
    psi_n: &[T],
    out: &mut [T],
) {
    let h_factor = mode.h_factor();
    for pattern in &hamiltonian.impurities {
        for anchor in pattern.anchors_per_tile.iter().flatten() {
            for bond in &pattern.bonds {
                let src_node = &pattern.nodes[bond.src_node];
                let dst_node = &pattern.nodes[bond.dst_node];
                let (src_coord, dst_coord) = match (
                    lattice.offset(*anchor, src_node.offset),
                    lattice.offset(*anchor, dst_node.offset),
                ) {
                    (Some(s), Some(d)) => (s, d),
                    _ => continue,
                };
                let src = lattice.site_linear_index(src_coord, src_node.orbital);
                let dst = lattice.site_linear_index(dst_coord, dst_node.orbital);
                out[src] = out[src] + bond.amplitude.scale(h_factor) * psi_n[dst];
            }
            for node in &pattern.nodes {
                if node.onsite == T::zero() {
                    continue;
                }
                if let Some(coord) = lattice.offset(*anchor, node.offset) {
                    let site = lattice.site_linear_index(coord, node.orbital);
                    out[site] = out[site] + node.onsite.scale(h_factor) * psi_n[site];
                }
            }
        }
        for b in &pattern.border_bonds {
            out[b.src] = out[b.src] + b.amplitude.scale(h_factor) * psi_n[b.dst];
        }
        for b in &pattern.border_onsites {
            out[b.site] = out[b.site] + b.amplitude.scale(h_factor) * psi_n[b.site];
        }
    }
    for tile in &hamiltonian.vacancies.per_tile {
        for &site in tile {
            out[site] = T::zero();
        }
    }
    for &site in &hamiltonian.vacancies.global_with_defects {
        out[site] = T::zero();
    }
}

/// Structural-disorder contribution to a velocity operator: the same
/// anchored-pattern and border-bond traversal `apply_structural_and_vacancies`
/// uses, but scaling each bond's amplitude by `i * delta` per axis (§3)
/// instead of by the recursion's `h_factor`, and dropping bonds whose
/// displacement is degenerate along a requested axis. On-site terms commute
/// with position and contribute nothing to `[x_a, H]`, so `border_onsites`
/// and each node's own `onsite` are skipped here. Read from
/// `hamiltonian.impurities` directly rather than cached, since anchor
/// placements are redrawn by `generate_disorder` every realization while a
/// `Hamiltonian::velocity_table` cache entry is not invalidated by it.
fn apply_structural_velocity<T: Scalar>(
    lattice: &Lattice,
    hamiltonian: &Hamiltonian<T>,
    axes: &[usize],
    psi: &[T],
    out: &mut [T],
) {
    for pattern in &hamiltonian.impurities {
        for anchor in pattern.anchors_per_tile.iter().flatten() {
            for bond in &pattern.bonds {
                let src_node = &pattern.nodes[bond.src_node];
                let dst_node = &pattern.nodes[bond.dst_node];
                let mut delta = [0i32; 3];
                for d in 0..3 {
                    delta[d] = dst_node.offset[d] - src_node.offset[d];
                }
                let amplitude = match velocity_scale(bond.amplitude, delta, axes) {
                    Some(a) => a,
                    None => continue,
                };
                let (src_coord, dst_coord) = match (
                    lattice.offset(*anchor, src_node.offset),
                    lattice.offset(*anchor, dst_node.offset),
                ) {
                    (Some(s), Some(d)) => (s, d),
                    _ => continue,
                };
                let src = lattice.site_linear_index(src_coord, src_node.orbital);
                let dst = lattice.site_linear_index(dst_coord, dst_node.orbital);
                out[src] = out[src] + amplitude * psi[dst];
            }
        }
        for b in &pattern.border_bonds {
            if let Some(amplitude) = velocity_scale(b.amplitude, b.delta, axes) {
                out[b.src] = out[b.src] + amplitude * psi[b.dst];
            }
        }
    }
}

fn check_finite<T: Scalar>(lattice: &Lattice, out: &[T]) -> KpmResult<()> {
    for coord in lattice.bulk_cells() {
        for orbital in 0..lattice.orbitals {
            let site = lattice.site_linear_index(coord, orbital);
            if !out[site].is_finite() {
                return Err(KpmError::runtime(
                    site,
                    "non-finite amplitude produced by the Chebyshev recursion",
                ));
            }
        }
    }
    Ok(())
}

/// Tiled recursion step, the load-bearing path used by the engine.
pub fn multiply<T: Scalar>(
    lattice: &Lattice,
    hamiltonian: &Hamiltonian<T>,
    mode: RecursionMode,
    psi_n: &[T],
    psi_nm1: &[T],
    out: &mut [T],
) -> KpmResult<()> {
    dense_bulk_pass(
        lattice,
        hamiltonian,
        mode,
        psi_n,
        psi_nm1,
        out,
        lattice.bulk_cells(),
    );
    apply_structural_and_vacancies(lattice, hamiltonian, mode, psi_n, out);
    check_finite(lattice, out)
}

/// Row-major, non-tiled recursion step used only as a correctness oracle
/// in tests (§9 Multiply-vs-Multiply2 resolution).
pub fn multiply_simple<T: Scalar>(
    lattice: &Lattice,
    hamiltonian: &Hamiltonian<T>,
    mode: RecursionMode,
    psi_n: &[T],
    psi_nm1: &[T],
    out: &mut [T],
) -> KpmResult<()> {
    dense_bulk_pass(
        lattice,
        hamiltonian,
        mode,
        psi_n,
        psi_nm1,
        out,
        row_major_bulk_cells(lattice),
    );
    apply_structural_and_vacancies(lattice, hamiltonian, mode, psi_n, out);
    check_finite(lattice, out)
}

/// Apply the velocity operator along `axes` to `psi` in place of a Chebyshev
/// recursion step: `out = v psi`, no `-psi_{n-1}` term. `v` is a pure
/// function of the regular and structural hopping tables (§4.6): the
/// regular-part contribution comes from `hamiltonian`'s cached
/// `velocity_table`, and the structural/border contribution is folded in by
/// `apply_structural_velocity`, read live off `hamiltonian.impurities` since
/// anchor placements change every disorder realization.
pub fn apply_velocity<T: Scalar>(
    lattice: &Lattice,
    hamiltonian: &mut Hamiltonian<T>,
    axes: &[usize],
    psi: &[T],
    out: &mut [T],
) -> KpmResult<()> {
    let velocity = hamiltonian.velocity_table(axes)?.clone();
    apply_velocity_with_table(lattice, &velocity, hamiltonian, axes, psi, out)
}

/// Same as [`apply_velocity`], but with the regular-part table already
/// fetched by the caller — used where the table is reused across many
/// `psi` (a Chebyshev sequence, a sweep over energies) so it isn't
/// re-cloned out of the cache on every element.
pub(crate) fn apply_velocity_with_table<T: Scalar>(
    lattice: &Lattice,
    velocity: &crate::hamiltonian::VelocityTable<T>,
    hamiltonian: &Hamiltonian<T>,
    axes: &[usize],
    psi: &[T],
    out: &mut [T],
) -> KpmResult<()> {
    for coord in lattice.bulk_cells() {
        let global_r = lattice.global_coord(coord);
        for orbital in 0..lattice.orbitals {
            let site = lattice.site_linear_index(coord, orbital);
            let mut acc = T::zero();
            for hop in &velocity.per_orbital[orbital] {
                if let Some(dst_coord) = lattice.offset(coord, hop.delta) {
                    let dst = lattice.site_linear_index(dst_coord, hop.dst_orbital);
                    let phase = T::peierls_phase(lattice.peierls_phase_arg(hop.delta, global_r));
                    acc = acc + (hop.amplitude * phase) * psi[dst];
                }
            }
            out[site] = acc;
        }
    }
    apply_structural_velocity(lattice, hamiltonian, axes, psi, out);
    check_finite(lattice, out)
}
