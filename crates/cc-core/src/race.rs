//! Race tracker: the shared atomics recording, per repetition, who won the
//! race to the contended line and how long each rank took to reach it.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::barrier::BarrierBank;

pub const UNCLAIMED: u64 = u64::MAX;

/// Three parallel arrays indexed by repetition or rank, plus per-rank retry
/// counters. All fields are written with atomic stores/compare-and-set;
/// the Reporter only reads them after every worker thread has joined.
pub struct RaceTracker {
    n_reps: usize,
    round_start: Vec<AtomicU64>,
    first_winner: Vec<AtomicU64>,
    common_latency: Vec<AtomicU64>,
    wins: Vec<AtomicU64>,
    cas_attempts: Vec<AtomicU64>,
    cas_successes: Vec<AtomicU64>,
    cas_failures: Vec<AtomicU64>,
}

impl RaceTracker {
    pub fn new(n_ranks: usize, n_reps: usize) -> Self {
        RaceTracker {
            n_reps,
            round_start: (0..n_reps).map(|_| AtomicU64::new(0)).collect(),
            first_winner: (0..n_reps).map(|_| AtomicU64::new(UNCLAIMED)).collect(),
            common_latency: (0..n_ranks * n_reps).map(|_| AtomicU64::new(0)).collect(),
            wins: (0..n_ranks).map(|_| AtomicU64::new(0)).collect(),
            cas_attempts: (0..n_ranks).map(|_| AtomicU64::new(0)).collect(),
            cas_successes: (0..n_ranks).map(|_| AtomicU64::new(0)).collect(),
            cas_failures: (0..n_ranks).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Reset `first_winner[rep]` to `UNCLAIMED` at the start of a repetition
    /// (performed by the seeder, or by rank 0 in classic mode).
    pub fn reset_winner(&self, rep: usize) {
        self.first_winner[rep].store(UNCLAIMED, Ordering::SeqCst);
    }

    /// Publish the common release instant for repetition `rep`.
    pub fn set_round_start(&self, rep: usize, ticks: u64) {
        self.round_start[rep].store(ticks, Ordering::SeqCst);
    }

    pub fn round_start(&self, rep: usize) -> u64 {
        self.round_start[rep].load(Ordering::SeqCst)
    }

    /// Compare-and-set `first_winner[rep]` from `UNCLAIMED` to `rank`; on
    /// success, atomically increments `wins[rank]`. At most one rank per
    /// rep transitions the cell.
    pub fn try_claim(&self, rank: usize, rep: usize) -> bool {
        let won = self.first_winner[rep]
            .compare_exchange(UNCLAIMED, rank as u64, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if won {
            self.wins[rank].fetch_add(1, Ordering::SeqCst);
        }
        won
    }

    pub fn first_winner(&self, rep: usize) -> Option<usize> {
        match self.first_winner[rep].load(Ordering::SeqCst) {
            UNCLAIMED => None,
            r => Some(r as usize),
        }
    }

    /// If `common_latency[rank, rep]` is unset, set it to
    /// `now - round_start[rep]`. Idempotent.
    pub fn record_success(&self, rank: usize, rep: usize, now: u64) {
        let idx = rank * self.n_reps + rep;
        let current = self.common_latency[idx].load(Ordering::SeqCst);
        if current == 0 {
            let latency = now.saturating_sub(self.round_start(rep));
            let _ = self.common_latency[idx].compare_exchange(
                0,
                latency.max(1),
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
        }
    }

    pub fn common_latency(&self, rank: usize, rep: usize) -> u64 {
        self.common_latency[rank * self.n_reps + rep].load(Ordering::SeqCst)
    }

    pub fn wins(&self, rank: usize) -> u64 {
        self.wins[rank].load(Ordering::SeqCst)
    }

    pub fn record_cas_attempt(&self, rank: usize) {
        self.cas_attempts[rank].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cas_success(&self, rank: usize) {
        self.cas_successes[rank].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cas_failure(&self, rank: usize) {
        self.cas_failures[rank].fetch_add(1, Ordering::Relaxed);
    }

    pub fn cas_attempts(&self, rank: usize) -> u64 {
        self.cas_attempts[rank].load(Ordering::Relaxed)
    }

    pub fn cas_successes(&self, rank: usize) -> u64 {
        self.cas_successes[rank].load(Ordering::Relaxed)
    }

    pub fn cas_failures(&self, rank: usize) -> u64 {
        self.cas_failures[rank].load(Ordering::Relaxed)
    }

    pub fn n_reps(&self) -> usize {
        self.n_reps
    }
}

/// The mutable state shared by every worker: the race tracker and the
/// barrier bank. Everything else a worker needs comes from an immutable
/// `RunConfig` held alongside this, per the "pass config, not globals"
/// design used throughout this harness.
pub struct RunState {
    pub tracker: RaceTracker,
    pub barriers: BarrierBank,
}

impl RunState {
    pub fn new(n_bar: usize, n_ranks: usize, n_reps: usize) -> Self {
        RunState {
            tracker: RaceTracker::new(n_ranks, n_reps),
            barriers: BarrierBank::init(n_bar, n_ranks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_most_one_winner_per_rep() {
        let tracker = RaceTracker::new(4, 1);
        assert!(tracker.try_claim(0, 0));
        assert!(!tracker.try_claim(1, 0));
        assert_eq!(tracker.first_winner(0), Some(0));
        assert_eq!(tracker.wins(0), 1);
        assert_eq!(tracker.wins(1), 0);
    }

    #[test]
    fn record_success_is_idempotent() {
        let tracker = RaceTracker::new(2, 1);
        tracker.set_round_start(0, 100);
        tracker.record_success(0, 0, 150);
        let first = tracker.common_latency(0, 0);
        tracker.record_success(0, 0, 999);
        assert_eq!(tracker.common_latency(0, 0), first);
    }

    #[test]
    fn cas_counters_are_per_rank_cumulative() {
        let tracker = RaceTracker::new(2, 10);
        tracker.record_cas_attempt(0);
        tracker.record_cas_attempt(0);
        tracker.record_cas_success(0);
        tracker.record_cas_failure(0);
        assert_eq!(tracker.cas_attempts(0), 2);
        assert_eq!(tracker.cas_successes(0) + tracker.cas_failures(0), 2);
    }

    #[test]
    fn reset_winner_clears_previous_claim() {
        let tracker = RaceTracker::new(2, 1);
        tracker.try_claim(0, 0);
        tracker.reset_winner(0);
        assert_eq!(tracker.first_winner(0), None);
    }
}
