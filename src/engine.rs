//! Fixed-thread fork-join engine (§5): spawns one worker per subdomain in
//! `ThreadGrid` for the lifetime of a quantity's computation, threads the
//! halo exchange through `std::thread::scope` + `std::sync::Barrier`, and
//! reduces per-thread running moments into one global array with a
//! pairwise fold over the collected thread results rather than a lock-
//! protected accumulator (§9 design note) — modeled on
//! `swarm::master_pipeline::EbbForgeMaster`'s pattern of a master owning
//! per-worker state and driving a fixed loop, generalized here to actual
//! OS threads because spec §5's concurrency model is shared-memory
//! fork-join with explicit barrier suspension points, not a single-
//! threaded tick.
//!
//! A quantity (1D/2D/3D moment, or single-shot) is supplied as a plain
//! function matching `moments::oned::accumulate_sample`'s shape, so this
//! module stays agnostic to which accumulator it's driving.

use crate::error::KpmResult;
use crate::halo::{exchange_halos, face_lens, HaloStaging, ThreadGrid};
use crate::hamiltonian::Hamiltonian;
use crate::lattice::{BoundaryCondition, Lattice};
use crate::moments::RunningMoments;
use crate::rng::seeded_rng;
use crate::scalar::Scalar;
use crate::vector::{live_site_count, KpmVector};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use tracing::{debug, info};

/// Static job configuration: thread grid, boundary condition, RNG seed, and
/// the disorder/random-vector sample counts shared by every quantity run
/// against this lattice. Deserializable from the same config boundary
/// `io::HamiltonianSource` stands in for, so a caller can load a full job
/// description from one JSON document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-thread subdomain geometry (ghosts included); `global_origin` is
    /// overwritten per thread from its position in `grid`.
    pub local_lattice: Lattice,
    pub grid: ThreadGrid,
    pub boundary: BoundaryCondition,
    pub job_seed: u64,
    pub num_disorder: usize,
    pub num_random: usize,
}

/// Run one quantity (a moment accumulator or the single-shot evaluator)
/// across every thread in `config.grid` and return the globally reduced
/// moment array.
///
/// `build_hamiltonian(thread_id)` constructs that thread's private
/// Hamiltonian from shared, thread-invariant configuration — per DESIGN.md,
/// the Hamiltonian's *disorder state* (Anderson per-site tables, impurity
/// anchors) is sized to and owned by each thread's own subdomain, so every
/// thread builds its own instance rather than sharing one.
pub fn run_quantity<T, BuildH, Sample>(
    config: &EngineConfig,
    moment_len: usize,
    build_hamiltonian: BuildH,
    sample_fn: Sample,
) -> KpmResult<Vec<T>>
where
    T: Scalar,
    BuildH: Fn(usize) -> Hamiltonian<T> + Sync,
    Sample: Fn(
            &Lattice,
            &mut Hamiltonian<T>,
            &[T],
            &mut RunningMoments<T>,
            &mut dyn FnMut(&mut [T]),
        ) -> KpmResult<()>
        + Sync,
{
    let n_threads = config.grid.n_threads();
    let staging: HaloStaging<T> = HaloStaging::new(n_threads, face_lens(&config.local_lattice));
    let barrier = Barrier::new(n_threads);

    // The normalization in `init_random` must be job-global, not per-
    // subdomain, or summing `n_threads` self-normalized partials below would
    // scale the result by `n_threads` (spec.md:71, §8 Scenario 6). Each
    // worker publishes its own subdomain's live-site count into its slot
    // here and waits at a barrier before the first `init_random`, so the
    // global total is available to every thread without building a second,
    // throwaway Hamiltonian up front just to read its vacancy list.
    let live_counts: Vec<AtomicUsize> = (0..n_threads).map(|_| AtomicUsize::new(0)).collect();

    info!(n_threads, moment_len, job_seed = config.job_seed, "starting quantity run");

    let partials: Vec<KpmResult<RunningMoments<T>>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..n_threads)
            .map(|thread_id| {
                let staging = &staging;
                let barrier = &barrier;
                let live_counts = &live_counts;
                let build_hamiltonian = &build_hamiltonian;
                let sample_fn = &sample_fn;
                let config = &*config;
                scope.spawn(move || {
                    run_worker(
                        config,
                        thread_id,
                        staging,
                        barrier,
                        live_counts,
                        moment_len,
                        build_hamiltonian,
                        sample_fn,
                    )
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("KPM worker thread panicked"))
            .collect()
    });

    let mut partials = partials.into_iter();
    let mut combined = match partials.next() {
        Some(first) => first?,
        None => return Ok(Vec::new()),
    };
    for partial in partials {
        combined.sum_partial(&partial?);
    }
    info!(samples = combined.count(), "quantity run complete");
    Ok(combined.into_vec())
}

#[allow(clippy::too_many_arguments)]
fn run_worker<T, BuildH, Sample>(
    config: &EngineConfig,
    thread_id: usize,
    staging: &HaloStaging<T>,
    barrier: &Barrier,
    live_counts: &[AtomicUsize],
    moment_len: usize,
    build_hamiltonian: &BuildH,
    sample_fn: &Sample,
) -> KpmResult<RunningMoments<T>>
where
    T: Scalar,
    BuildH: Fn(usize) -> Hamiltonian<T> + Sync,
    Sample: Fn(
            &Lattice,
            &mut Hamiltonian<T>,
            &[T],
            &mut RunningMoments<T>,
            &mut dyn FnMut(&mut [T]),
        ) -> KpmResult<()>
        + Sync,
{
    let coord = config.grid.coord_of(thread_id);
    let mut origin = [0i64; 3];
    for d in 0..config.local_lattice.dim {
        origin[d] = coord[d] as i64 * config.local_lattice.bulk_extent(d) as i64;
    }
    let lattice = config.local_lattice.clone().with_global_origin(origin);

    let mut hamiltonian = build_hamiltonian(thread_id);
    let vacancies = hamiltonian.vacancies.all_sites();

    live_counts[thread_id].store(live_site_count(&lattice, &vacancies), Ordering::Relaxed);
    barrier.wait();
    let global_n_live: usize = live_counts.iter().map(|c| c.load(Ordering::Relaxed)).sum();
    debug!(thread_id, global_n_live, "resolved job-global live-site count");

    let mut rng = seeded_rng(config.job_seed, thread_id);
    let mut running = RunningMoments::<T>::zeros(moment_len);

    for disorder_idx in 0..config.num_disorder {
        debug!(thread_id, disorder_idx, "redrawing disorder realization");
        hamiltonian.generate_disorder(&lattice, &mut rng);
        for random_idx in 0..config.num_random {
            debug!(thread_id, disorder_idx, random_idx, "random vector sample");
            let mut vector: KpmVector<T> = KpmVector::new(3, lattice.n_d())?;
            vector.init_random(&lattice, &vacancies, global_n_live, &mut rng);
            let seed = vector.current().to_vec();
            let mut exchange = |amplitudes: &mut [T]| {
                exchange_halos(
                    &lattice,
                    &config.grid,
                    thread_id,
                    config.boundary,
                    staging,
                    barrier,
                    amplitudes,
                );
            };
            sample_fn(&lattice, &mut hamiltonian, &seed, &mut running, &mut exchange)?;
        }
    }
    Ok(running)
}
