//! Operation kernels: the ~25 measured primitives. Every kernel shares the
//! same contract — act on the contended line, bracket the measured access
//! with a cycle-count sample, and (for the families that carry winner
//! semantics) claim the repetition the moment it touches the contended
//! line.

use std::sync::atomic::Ordering;

use cc_core::atomics::{cas32, fai32, swap32, tas8, tas_reset8};
use cc_core::cache_line::{CacheLineRegion, Lcg};
use cc_core::fence_policy::FenceMode;
use cc_core::race::RaceTracker;
use cc_core::timer::{full_fence, load_fence, pause, store_fence, ticks_now};
use cc_core::pfd::PfdStore;

use crate::action::{Action, FenceKind};
use crate::stride::stride_hide;

pub struct KernelCtx<'a> {
    pub region: &'a CacheLineRegion,
    pub tracker: &'a RaceTracker,
    pub rank: usize,
    pub rep: usize,
    pub stride: u32,
    pub rng: Lcg,
    pub load_fence_mode: FenceMode,
    pub store_fence_mode: FenceMode,
    pub backoff_cap: u32,
    /// `--success`: force retrying atomics to always succeed on first try.
    pub force_success: bool,
}

fn apply_load_fence(mode: FenceMode) {
    match mode {
        FenceMode::None => {}
        FenceMode::Partial => load_fence(),
        FenceMode::Full => full_fence(),
        FenceMode::DoubleWrite => {}
    }
}

fn apply_store_fence(mode: FenceMode) {
    match mode {
        FenceMode::None => {}
        FenceMode::Partial => store_fence(),
        FenceMode::Full => full_fence(),
        FenceMode::DoubleWrite => {}
    }
}

/// Execute one choreography `Action`, recording a PFD sample at `store_id`
/// for every measured access. Returns nothing: any winner-claim or
/// success-latency bookkeeping happens inline, matching the intentional
/// asymmetry that CAS-until-success claims on first success while every
/// other winner-carrying kernel claims at `cln == 0` regardless of outcome.
pub fn execute(action: Action, ctx: &mut KernelCtx, pfd: &mut PfdStore, store_id: usize) {
    match action {
        Action::Barrier(_) => unreachable!("barriers are interpreted by the round driver"),
        Action::Store => store_on_line(ctx, pfd, store_id, false),
        Action::StoreDouble => store_on_line(ctx, pfd, store_id, true),
        Action::Load => load_from_line(ctx, pfd, store_id, true),
        Action::LoadNoPf => load_from_line(ctx, pfd, store_id, false),
        Action::Invalidate => invalidate(ctx, pfd, store_id),
        Action::CasEventual => cas_eventual(ctx, pfd, store_id, true),
        Action::CasNoPf => cas_eventual(ctx, pfd, store_id, false),
        Action::Fai => fai(ctx, pfd, store_id),
        Action::Tas => tas(ctx, pfd, store_id),
        Action::TasReset => tas_reset8(&ctx.region.contended().tas_slot),
        Action::Swap => swap(ctx, pfd, store_id),
        Action::CasUntilSuccess => cas_until_success(ctx, pfd, store_id),
        Action::PointerChase => pointer_chase(ctx, pfd, store_id),
        Action::Fence(kind) => fence_only(ctx, pfd, store_id, kind),
        Action::Nop => {}
    }
}

fn store_on_line(ctx: &mut KernelCtx, pfd: &mut PfdStore, store_id: usize, double: bool) {
    let region = ctx.region;
    let stride = ctx.stride;
    let store_fence_mode = ctx.store_fence_mode;
    stride_hide(stride, &mut ctx.rng, |cln| {
        let line = region.line(cln);
        if cln == 0 {
            let t0 = ticks_now();
            line.word[0].store(1, Ordering::Relaxed);
            if double || matches!(store_fence_mode, FenceMode::DoubleWrite) {
                line.word[0].store(1, Ordering::Relaxed);
            }
            apply_store_fence(store_fence_mode);
            let t1 = ticks_now();
            pfd.record(store_id, t1.saturating_sub(t0));
        } else {
            line.word[0].store(0, Ordering::Relaxed);
        }
    });
}

fn load_from_line(ctx: &mut KernelCtx, pfd: &mut PfdStore, store_id: usize, measured: bool) {
    if !measured {
        // Non-measuring participant: a single plain load to force Shared
        // state, no stride-hiding, no sample recorded.
        let _ = ctx.region.contended().word[0].load(Ordering::Relaxed);
        return;
    }
    let region = ctx.region;
    let stride = ctx.stride;
    let load_fence_mode = ctx.load_fence_mode;
    stride_hide(stride, &mut ctx.rng, |cln| {
        let line = region.line(cln);
        if cln == 0 {
            let t0 = ticks_now();
            let _ = line.word[0].load(Ordering::Relaxed);
            apply_load_fence(load_fence_mode);
            let t1 = ticks_now();
            pfd.record(store_id, t1.saturating_sub(t0));
        } else {
            let _ = line.word[0].load(Ordering::Relaxed);
        }
    });
}

fn invalidate(ctx: &mut KernelCtx, pfd: &mut PfdStore, store_id: usize) {
    let t0 = ticks_now();
    clflush(ctx.region.contended().word[0].as_ptr());
    full_fence();
    let t1 = ticks_now();
    pfd.record(store_id, t1.saturating_sub(t0));
}

#[cfg(target_arch = "x86_64")]
fn clflush(ptr: *const u32) {
    unsafe { core::arch::x86_64::_mm_clflush(ptr as *const u8) };
}

#[cfg(not(target_arch = "x86_64"))]
fn clflush(_ptr: *const u32) {
    full_fence();
}

fn cas_eventual(ctx: &mut KernelCtx, pfd: &mut PfdStore, store_id: usize, claims_winner: bool) {
    let rep = ctx.rep;
    let rank = ctx.rank;
    let force_success = ctx.force_success;
    let region = ctx.region;
    let stride = ctx.stride;
    let tracker = ctx.tracker;
    stride_hide(stride, &mut ctx.rng, |cln| {
        let line = region.line(cln);
        if cln == 0 {
            let expected = (rep & 1) as u32;
            let desired = if force_success { expected } else { (expected == 0) as u32 };
            let t0 = ticks_now();
            let ok = cas32(&line.word[0], expected, desired).is_ok();
            let t1 = ticks_now();
            pfd.record(store_id, t1.saturating_sub(t0));
            let _ = ok;
            if claims_winner {
                // Claims at cln == 0 regardless of success, unlike
                // cas_until_success below which claims only on success.
                tracker.try_claim(rank, rep);
            }
        } else {
            let _ = line.word[0].load(Ordering::Relaxed);
        }
    });
}

fn fai(ctx: &mut KernelCtx, pfd: &mut PfdStore, store_id: usize) {
    let rep = ctx.rep;
    let rank = ctx.rank;
    let region = ctx.region;
    let stride = ctx.stride;
    let tracker = ctx.tracker;
    stride_hide(stride, &mut ctx.rng, |cln| {
        let line = region.line(cln);
        if cln == 0 {
            let t0 = ticks_now();
            let _ = fai32(&line.word[0]);
            let t1 = ticks_now();
            pfd.record(store_id, t1.saturating_sub(t0));
            tracker.try_claim(rank, rep);
            tracker.record_success(rank, rep, ticks_now());
        } else {
            let _ = line.word[0].load(Ordering::Relaxed);
        }
    });
}

fn tas(ctx: &mut KernelCtx, pfd: &mut PfdStore, store_id: usize) {
    let rep = ctx.rep;
    let rank = ctx.rank;
    let region = ctx.region;
    let stride = ctx.stride;
    let tracker = ctx.tracker;
    stride_hide(stride, &mut ctx.rng, |cln| {
        let line = region.line(cln);
        if cln == 0 {
            // retry until the slot is observed "previously free"
            loop {
                let t0 = ticks_now();
                let prev = tas8(&line.tas_slot);
                let t1 = ticks_now();
                if prev == 0 {
                    pfd.record(store_id, t1.saturating_sub(t0));
                    tracker.try_claim(rank, rep);
                    tracker.record_success(rank, rep, ticks_now());
                    break;
                }
                pause();
            }
        } else {
            let _ = line.word[0].load(Ordering::Relaxed);
        }
    });
}

fn swap(ctx: &mut KernelCtx, pfd: &mut PfdStore, store_id: usize) {
    let rep = ctx.rep;
    let rank = ctx.rank;
    let region = ctx.region;
    let stride = ctx.stride;
    let tracker = ctx.tracker;
    stride_hide(stride, &mut ctx.rng, |cln| {
        let line = region.line(cln);
        if cln == 0 {
            let t0 = ticks_now();
            let _ = swap32(&line.word[0], rank as u32);
            let t1 = ticks_now();
            pfd.record(store_id, t1.saturating_sub(t0));
            tracker.try_claim(rank, rep);
            tracker.record_success(rank, rep, ticks_now());
        } else {
            let _ = line.word[0].load(Ordering::Relaxed);
        }
    });
}

/// CAS-until-success: stride-hide to the target line, then retry a CAS
/// against the line's LSB with exponential backoff, doubling the pause
/// length (capped at `backoff_cap`) between failures. Claims the winner
/// only on the first successful CAS — unlike every other winner-carrying
/// kernel, which claims regardless of outcome at `cln == 0`.
fn cas_until_success(ctx: &mut KernelCtx, pfd: &mut PfdStore, store_id: usize) {
    let rep = ctx.rep;
    let rank = ctx.rank;
    let backoff_cap = ctx.backoff_cap.max(1);
    let force_success = ctx.force_success;
    let region = ctx.region;
    let stride = ctx.stride;
    let tracker = ctx.tracker;
    stride_hide(stride, &mut ctx.rng, |cln| {
        let line = region.line(cln);
        if cln != 0 {
            let _ = line.word[0].load(Ordering::Relaxed);
            return;
        }
        let t0 = ticks_now();
        let mut backoff = 1u32;
        loop {
            tracker.record_cas_attempt(rank);
            let current = line.word[0].load(Ordering::SeqCst);
            let desired = current ^ 1;
            let ok = if force_success {
                line.word[0].store(desired, Ordering::SeqCst);
                true
            } else {
                cas32(&line.word[0], current, desired).is_ok()
            };
            if ok {
                tracker.record_cas_success(rank);
                let t1 = ticks_now();
                pfd.record(store_id, t1.saturating_sub(t0));
                if tracker.try_claim(rank, rep) {
                    tracker.record_success(rank, rep, ticks_now());
                }
                break;
            }
            tracker.record_cas_failure(rank);
            for _ in 0..backoff {
                pause();
            }
            backoff = (backoff * 2).min(backoff_cap);
        }
    });
}

/// Traverse the pointer-chase permutation once around all `N_lines`; one
/// sample covers the whole traversal.
fn pointer_chase(ctx: &mut KernelCtx, pfd: &mut PfdStore, store_id: usize) {
    let n = ctx.region.len();
    let load_fence_mode = ctx.load_fence_mode;
    let t0 = ticks_now();
    let mut idx = 0usize;
    for _ in 0..n {
        let _ = ctx.region.line(idx).word[0].load(Ordering::Relaxed);
        apply_load_fence(load_fence_mode);
        idx = ctx.region.chase_next(idx);
    }
    let t1 = ticks_now();
    pfd.record(store_id, t1.saturating_sub(t0));
}

fn fence_only(_ctx: &mut KernelCtx, pfd: &mut PfdStore, store_id: usize, kind: FenceKind) {
    let t0 = ticks_now();
    match kind {
        FenceKind::Lfence => load_fence(),
        FenceKind::Sfence => store_fence(),
        FenceKind::Mfence => full_fence(),
        FenceKind::Pause => pause(),
        FenceKind::Nop => std::hint::black_box(()),
    }
    let t1 = ticks_now();
    pfd.record(store_id, t1.saturating_sub(t0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_core::pfd::PfdStore;

    fn ctx(region: &CacheLineRegion, tracker: &RaceTracker) -> KernelCtx<'_> {
        KernelCtx {
            region,
            tracker,
            rank: 0,
            rep: 0,
            stride: 1,
            rng: Lcg::new(7),
            load_fence_mode: FenceMode::None,
            store_fence_mode: FenceMode::None,
            backoff_cap: 4,
            force_success: false,
        }
    }

    #[test]
    fn store_records_one_sample() {
        let region = CacheLineRegion::new(4);
        let tracker = RaceTracker::new(1, 1);
        let mut c = ctx(&region, &tracker);
        let mut pfd = PfdStore::new(1, 1);
        execute(Action::Store, &mut c, &mut pfd, 0);
        assert_eq!(pfd.samples(0).len(), 1);
    }

    #[test]
    fn cas_until_success_eventually_succeeds_and_claims() {
        let region = CacheLineRegion::new(4);
        let tracker = RaceTracker::new(1, 1);
        let mut c = ctx(&region, &tracker);
        let mut pfd = PfdStore::new(1, 1);
        execute(Action::CasUntilSuccess, &mut c, &mut pfd, 0);
        assert_eq!(tracker.cas_successes(0), 1);
        assert_eq!(tracker.wins(0), 1);
    }

    #[test]
    fn pointer_chase_records_exactly_one_sample() {
        let region = CacheLineRegion::new(8);
        let tracker = RaceTracker::new(1, 1);
        let mut c = ctx(&region, &tracker);
        let mut pfd = PfdStore::new(1, 1);
        execute(Action::PointerChase, &mut c, &mut pfd, 0);
        assert_eq!(pfd.samples(0).len(), 1);
    }

    #[test]
    fn fence_actions_record_samples() {
        let region = CacheLineRegion::new(1);
        let tracker = RaceTracker::new(1, 1);
        let mut c = ctx(&region, &tracker);
        let mut pfd = PfdStore::new(1, 1);
        execute(Action::Fence(FenceKind::Mfence), &mut c, &mut pfd, 0);
        assert_eq!(pfd.samples(0).len(), 1);
    }
}
