//! The KPM vector: a ring buffer of `memory` amplitude slots, each holding
//! one Chebyshev recursion step's worth of per-site amplitudes (§4.3).
//!
//! Only as many slots as the three-term recursion needs to stay alive are
//! kept (`psi_n`, `psi_{n-1}`, and the slot being written as `psi_{n+1}`);
//! wider `MEMORY` block-dot-product buffering is a cache-blocking
//! optimization this engine does not implement (see DESIGN.md) and is
//! orthogonal to the moment math, which only ever reads the two most
//! recent slots.

use crate::error::{KpmError, KpmResult};
use crate::lattice::{Lattice, SiteIndex};
use crate::scalar::Scalar;
use rand::Rng;

/// Every (site, orbital) linear index in the bulk (non-ghost) region,
/// shared by `KpmVector::init_random` (which needs the full list, to zero
/// vacancies in place) and `live_site_count` (which counts the subset that
/// survives a vacancy filter).
fn bulk_site_orbitals(lattice: &Lattice) -> impl Iterator<Item = SiteIndex> + '_ {
    lattice
        .bulk_cells()
        .flat_map(|coord| (0..lattice.orbitals).map(move |orbital| lattice.site_linear_index(coord, orbital)))
}

#[derive(Clone, Debug)]
pub struct KpmVector<T: Scalar> {
    slots: Vec<Vec<T>>,
    memory: usize,
    n_d: usize,
    /// Index of the slot holding the most recently written amplitude
    /// (`psi_n`).
    cursor: usize,
}

impl<T: Scalar> KpmVector<T> {
    pub fn new(memory: usize, n_d: usize) -> KpmResult<Self> {
        if memory < 2 {
            return Err(KpmError::config(format!(
                "KPM vector needs at least 2 ring slots, got {memory}"
            )));
        }
        if n_d == 0 {
            return Err(KpmError::config("KPM vector amplitude count must be >= 1"));
        }
        Ok(Self {
            slots: vec![vec![T::zero(); n_d]; memory],
            memory,
            n_d,
            cursor: 0,
        })
    }

    #[inline]
    pub fn n_d(&self) -> usize {
        self.n_d
    }

    #[inline]
    pub fn memory(&self) -> usize {
        self.memory
    }

    /// `psi_{n-k}`, the amplitudes written `k` `advance()` calls ago.
    /// `k` must be `< memory`.
    #[inline]
    pub fn previous(&self, k: usize) -> &[T] {
        debug_assert!(k < self.memory, "k out of ring range");
        let idx = (self.cursor + self.memory - k) % self.memory;
        &self.slots[idx]
    }

    #[inline]
    pub fn current(&self) -> &[T] {
        self.previous(0)
    }

    #[inline]
    pub fn current_mut(&mut self) -> &mut [T] {
        let idx = self.cursor;
        &mut self.slots[idx]
    }

    /// Mutable access to the slot that will become `psi_{n+1}` once
    /// `advance()` is called — the slot currently holding the oldest
    /// amplitude still in the ring (`psi_{n-(memory-1)}`), which is no
    /// longer needed once the new value is written.
    #[inline]
    pub fn next_slot_mut(&mut self) -> &mut [T] {
        let idx = (self.cursor + 1) % self.memory;
        &mut self.slots[idx]
    }

    /// Commit the amplitudes written via `next_slot_mut` as the new
    /// `psi_n`.
    #[inline]
    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % self.memory;
    }

    /// Seed `psi_0` (a fresh random or deterministic start vector) and
    /// zero every other slot, resetting the ring to recursion step 0.
    pub fn seed(&mut self, psi0: &[T]) {
        debug_assert_eq!(psi0.len(), self.n_d);
        self.cursor = 0;
        self.slots[0].copy_from_slice(psi0);
        for slot in self.slots.iter_mut().skip(1) {
            slot.iter_mut().for_each(|v| *v = T::zero());
        }
    }

    pub fn all_finite(&self) -> bool {
        self.slots
            .iter()
            .all(|s| s.iter().all(|v| v.is_finite()))
    }

    /// Fill `psi_0` with a unit-variance, zero-mean random sample at every
    /// bulk site, zero the vacancy sites and every other ring slot, and
    /// normalize so `<psi_0|psi_0>` has expectation 1 over the **job-global**
    /// live (non-vacancy) site count (§4.3 `init_random()`) — `global_n_live`
    /// must be the live site count summed over every thread's subdomain, not
    /// this thread's own, or a moment estimated on T threads would come out
    /// T times too large once the per-thread partials are summed (spec.md:71,
    /// §8 Scenario 6). Callers with only one subdomain (tests, single-thread
    /// jobs) pass `live_site_count(lattice, vacancies)` directly.
    pub fn init_random(
        &mut self,
        lattice: &Lattice,
        vacancies: &[SiteIndex],
        global_n_live: usize,
        rng: &mut impl Rng,
    ) {
        self.cursor = 0;
        for slot in self.slots.iter_mut() {
            slot.iter_mut().for_each(|v| *v = T::zero());
        }
        let bulk_sites: Vec<SiteIndex> = bulk_site_orbitals(lattice).collect();
        let vacant: std::collections::HashSet<SiteIndex> = vacancies.iter().copied().collect();
        let norm = 1.0 / (global_n_live.max(1) as f64).sqrt();
        for site in bulk_sites {
            self.slots[0][site] = if vacant.contains(&site) {
                T::zero()
            } else {
                T::random_unit(rng).scale(norm)
            };
        }
    }
}

/// Live (non-vacancy) bulk site-orbital count of one subdomain. The job-
/// global live count `init_random` normalizes against is the sum of this
/// over every thread's subdomain (see `engine::run_quantity`).
pub fn live_site_count(lattice: &Lattice, vacancies: &[SiteIndex]) -> usize {
    let vacant: std::collections::HashSet<SiteIndex> = vacancies.iter().copied().collect();
    bulk_site_orbitals(lattice).filter(|s| !vacant.contains(s)).count()
}
