//! The seeder: primes the contended line and publishes the common release
//! instant each repetition, then joins `B4` as a regular participant.

use std::sync::atomic::Ordering;

use cc_core::barrier::{BarrierBank, B4};
use cc_core::cache_line::CacheLineRegion;
use cc_core::error::CcResult;
use cc_core::race::RaceTracker;
use cc_core::timer::{full_fence, ticks_now};

/// Run one repetition of seeder duty (spec §4.4): set an alternating bit
/// pattern, reset the winner cell, publish `round_start`, then release
/// `B4`. Called either in-band by the rank occupying the seed core, or by
/// a dedicated auxiliary thread. A barrier failure here is as fatal as any
/// other barrier wait in the Round driver, so it propagates rather than
/// panics.
pub fn seed_round(region: &CacheLineRegion, tracker: &RaceTracker, barriers: &BarrierBank, rep: usize, seeder_rank: usize) -> CcResult<()> {
    let value = (rep & 1) as u32;
    region.contended().word[0].store(value, Ordering::SeqCst);
    full_fence();
    tracker.reset_winner(rep);
    full_fence();
    tracker.set_round_start(rep, ticks_now());
    full_fence();
    barriers.wait(B4, seeder_rank)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_core::barrier::BarrierBank;

    #[test]
    fn seed_round_publishes_round_start_and_alternates_value() {
        let region = CacheLineRegion::new(4);
        let tracker = RaceTracker::new(1, 2);
        let barriers = BarrierBank::init(8, 1);
        barriers.set_participants(B4, 1).unwrap();

        seed_round(&region, &tracker, &barriers, 0, 0).unwrap();
        assert_eq!(region.contended().word[0].load(Ordering::SeqCst), 0);
        assert!(tracker.round_start(0) > 0);
        assert_eq!(tracker.first_winner(0), None);

        barriers.set_participants(B4, 1).unwrap();
        seed_round(&region, &tracker, &barriers, 1, 0).unwrap();
        assert_eq!(region.contended().word[0].load(Ordering::SeqCst), 1);
    }
}
