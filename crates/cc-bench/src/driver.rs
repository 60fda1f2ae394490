//! Round driver: the per-worker state machine that executes `n_reps`
//! repetitions, each bracketed by precondition and postcondition barriers.

use std::sync::Once;

use cc_core::barrier::{self, B0, B1, B2, B3, B4};
use cc_core::cache_line::{CacheLineRegion, Lcg};
use cc_core::error::{CcError, CcResult};
use cc_core::pfd::PfdStore;
use cc_core::race::RunState;
use cc_core::timer::full_fence;
use cc_kernels::action::{choreography, Action, TestId};
use cc_kernels::kernels::{execute, KernelCtx};
use cc_kernels::seeder::seed_round;

use crate::config::{RunConfig, SeedMode};

const N_STORES: usize = 4;

static UNKNOWN_TEST_WARNED: Once = Once::new();

/// Per-rank results collected after every thread has joined.
pub struct RankResult {
    pub pfd: cc_core::pfd::PfdStore,
}

/// Run the full benchmark: spawn one thread per rank (plus an auxiliary
/// seeder if configured), drive them through `config.n_reps` repetitions,
/// and return each rank's PFD samples once every thread has joined.
pub fn run(config: &RunConfig, region: &CacheLineRegion, state: &RunState) -> CcResult<Vec<RankResult>> {
    let n_ranks = config.rank_map.num_ranks();

    // Configure the barrier bank: B0/B3 span every rank; B4 spans every
    // rank plus one extra participant if the seeder is auxiliary; per-group
    // B1/B2 span only that group's ranks.
    state.barriers.set_participants(B0, n_ranks).map_err(to_system)?;
    state.barriers.set_participants(B3, n_ranks).map_err(to_system)?;
    let b4_participants = match config.seed_mode {
        SeedMode::Auxiliary => n_ranks + 1,
        _ => n_ranks,
    };
    state.barriers.set_participants(B4, b4_participants).map_err(to_system)?;
    for (g, size) in config.rank_map.group_size.iter().enumerate() {
        state
            .barriers
            .set_participants(barrier::per_group_slot(g, 0), *size)
            .map_err(to_system)?;
        state
            .barriers
            .set_participants(barrier::per_group_slot(g, 1), *size)
            .map_err(to_system)?;
    }

    let results: CcResult<Vec<RankResult>> = std::thread::scope(|scope| {
        let core_ids = core_affinity::get_core_ids().unwrap_or_default();
        let mut handles = Vec::with_capacity(n_ranks + 1);

        if matches!(config.seed_mode, SeedMode::Auxiliary) {
            let seed_core = config.seed_core.unwrap();
            let core_ids = core_ids.clone();
            handles.push(scope.spawn(move || -> CcResult<Option<RankResult>> {
                pin_to_core(&core_ids, seed_core);
                for rep in 0..config.n_reps as usize {
                    seed_round(region, &state.tracker, &state.barriers, rep, n_ranks)?;
                }
                Ok(None)
            }));
        }

        for (rank, r) in config.rank_map.ranks.iter().enumerate() {
            let core_ids = core_ids.clone();
            let rank_info = *r;
            handles.push(scope.spawn(move || -> CcResult<Option<RankResult>> {
                pin_to_core(&core_ids, rank_info.core);
                let pfd = run_rank(config, region, state, rank, rank_info)?;
                Ok(Some(RankResult { pfd }))
            }));
        }

        let mut out = Vec::with_capacity(n_ranks);
        for h in handles {
            match h.join() {
                Ok(Ok(Some(r))) => out.push(r),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(CcError::system("worker thread panicked")),
            }
        }
        Ok(out)
    });

    results
}

fn to_system(e: CcError) -> CcError {
    e
}

fn pin_to_core(core_ids: &[core_affinity::CoreId], core: i64) {
    if core < 0 {
        return;
    }
    if let Some(id) = core_ids.iter().find(|c| c.id == core as usize) {
        core_affinity::set_for_current(*id);
    }
}

fn run_rank(
    config: &RunConfig,
    region: &CacheLineRegion,
    state: &RunState,
    rank: usize,
    rank_info: cc_core::rank::Rank,
) -> CcResult<cc_core::pfd::PfdStore> {
    let mut pfd = cc_core::pfd::PfdStore::new(N_STORES, config.n_reps as usize);
    let base_seed = 0x1234_5678_u64 ^ (rank as u64).wrapping_mul(0x9E37_79B9);
    let mut seed_ctr: u64 = 0;
    let test_id = TestId::from_i64(rank_info.test_id);
    let group_b1 = barrier::per_group_slot(rank_info.group, 0);
    let group_b2 = barrier::per_group_slot(rank_info.group, 1);

    let is_in_band_seeder = matches!(config.seed_mode, SeedMode::InBand(idx) if idx == rank);

    for rep in 0..config.n_reps as usize {
        if config.flush_before_rep {
            full_fence();
        }
        state.barriers.wait(B0, rank).map_err(to_system)?;

        match config.seed_mode {
            SeedMode::Classic => {
                let Some(tid) = test_id else {
                    warn_unknown_test(rank_info.test_id);
                    let mut ctx = make_ctx(config, region, state, rank, rep, base_seed, &mut seed_ctr, rank_info);
                    execute_traced(config, rank, rep, Action::Nop, &mut ctx, &mut pfd, 0);
                    state.barriers.wait(B3, rank).map_err(to_system)?;
                    continue;
                };
                let seq = choreography(tid, rank_info.role);
                let mut store_id = 0usize;
                for action in seq {
                    if let Action::Barrier(slot) = action {
                        let resolved = resolve_barrier_slot(slot, group_b1, group_b2);
                        state.barriers.wait(resolved, rank).map_err(to_system)?;
                        continue;
                    }
                    let mut ctx = make_ctx(config, region, state, rank, rep, base_seed, &mut seed_ctr, rank_info);
                    execute_traced(config, rank, rep, action, &mut ctx, &mut pfd, store_id % N_STORES);
                    store_id += 1;
                }
            }
            SeedMode::InBand(_) | SeedMode::Auxiliary => {
                if is_in_band_seeder {
                    seed_round(region, &state.tracker, &state.barriers, rep, rank)?;
                } else {
                    state.barriers.wait(B4, rank).map_err(to_system)?;
                }
                let should_act = !is_in_band_seeder || test_id == Some(TestId::CasUntilSuccess);
                if should_act {
                    if let Some(tid) = test_id {
                        let direct = direct_actions(tid);
                        let mut store_id = 0usize;
                        for action in direct {
                            let mut ctx = make_ctx(config, region, state, rank, rep, base_seed, &mut seed_ctr, rank_info);
                            execute_traced(config, rank, rep, action, &mut ctx, &mut pfd, store_id % N_STORES);
                            store_id += 1;
                        }
                    } else {
                        warn_unknown_test(rank_info.test_id);
                        let mut ctx = make_ctx(config, region, state, rank, rep, base_seed, &mut seed_ctr, rank_info);
                        execute_traced(config, rank, rep, Action::Nop, &mut ctx, &mut pfd, 0);
                    }
                }
                state.barriers.wait(group_b1, rank).map_err(to_system)?;
            }
        }

        state.barriers.wait(B3, rank).map_err(to_system)?;
    }

    Ok(pfd)
}

fn resolve_barrier_slot(slot: usize, group_b1: usize, group_b2: usize) -> usize {
    if slot == B1 {
        group_b1
    } else if slot == B2 {
        group_b2
    } else {
        slot
    }
}

/// The measured action(s) a contender runs in seed mode: the choreography's
/// role-1 column stripped of its barrier/precondition steps, since the
/// seeder's release already establishes the coherence precondition.
fn direct_actions(test_id: TestId) -> Vec<Action> {
    choreography(test_id, 1)
        .into_iter()
        .filter(|a| !matches!(a, Action::Barrier(_)))
        .collect()
}

fn make_ctx<'a>(
    config: &RunConfig,
    region: &'a CacheLineRegion,
    state: &'a RunState,
    rank: usize,
    rep: usize,
    base_seed: u64,
    seed_ctr: &mut u64,
    rank_info: cc_core::rank::Rank,
) -> KernelCtx<'a> {
    *seed_ctr = seed_ctr.wrapping_add(1);
    KernelCtx {
        region,
        tracker: &state.tracker,
        rank,
        rep,
        stride: config.stride,
        rng: Lcg::new(base_seed ^ seed_ctr.wrapping_mul(0x2545_F491_4F6C_DD1D)),
        load_fence_mode: config.load_fence,
        store_fence_mode: config.store_fence,
        backoff_cap: rank_info.backoff_cap,
        force_success: config.force_success,
    }
}

fn warn_unknown_test(test_id: i64) {
    UNKNOWN_TEST_WARNED.call_once(|| {
        let err = CcError::kernel_internal(format!("unknown test_id {test_id}"));
        eprintln!("warning: {err}; emitting no-op samples to keep PFD stores aligned");
    });
}

/// Run `action` through the kernel and, if `--print` is enabled and this
/// repetition falls on the requested stride, echo the sample it recorded.
/// `--verbose` additionally names the action and store slot.
fn execute_traced(
    config: &RunConfig,
    rank: usize,
    rep: usize,
    action: Action,
    ctx: &mut KernelCtx,
    pfd: &mut PfdStore,
    store_id: usize,
) {
    let before = pfd.samples(store_id).len();
    execute(action, ctx, pfd, store_id);
    if config.print_every == 0 || rep % config.print_every as usize != 0 {
        return;
    }
    let Some(&sample) = pfd.samples(store_id).last() else {
        return;
    };
    if pfd.samples(store_id).len() == before {
        return;
    }
    if config.verbose > 0 {
        println!("[rank {rank}] rep {rep} store {store_id} {action:?}: {sample} cycles");
    } else {
        println!("[rank {rank}] rep {rep}: {sample} cycles");
    }
}
