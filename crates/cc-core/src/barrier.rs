//! Barrier bank: a fixed set of independently reconfigurable rendezvous
//! points. Generalizes the worker-coordination pattern of a `Mutex` +
//! `Condvar` pool (the shape the posix backend used for its thread pool)
//! into a counting barrier whose participant count can be reset between
//! rounds, which `std::sync::Barrier` cannot do.

use std::sync::{Condvar, Mutex};

use crate::error::{CcError, CcResult};
use crate::timer::full_fence;

/// Named fixed slots. `B0..B4` drive one repetition; `B10` is reserved for
/// future whole-run synchronization (e.g. a start-of-run rendezvous).
pub const B0: usize = 0;
pub const B1: usize = 1;
pub const B2: usize = 2;
pub const B3: usize = 3;
pub const B4: usize = 4;
pub const B10: usize = 10;

/// Per-group slots begin here; each group owns `PER_GROUP_SLOTS` consecutive
/// indices, addressed as `PER_GROUP_BASE + group * PER_GROUP_SLOTS + k`.
pub const PER_GROUP_BASE: usize = 16;
pub const PER_GROUP_SLOTS: usize = 2;

pub fn per_group_slot(group: usize, k: usize) -> usize {
    PER_GROUP_BASE + group * PER_GROUP_SLOTS + k
}

struct SlotState {
    participants: usize,
    waiting: usize,
    generation: u64,
}

struct Slot {
    state: Mutex<SlotState>,
    cond: Condvar,
}

/// A fixed array of `N_BAR` reconfigurable barriers.
pub struct BarrierBank {
    slots: Vec<Slot>,
}

impl BarrierBank {
    /// Allocate `n_bar` barriers, each initially expecting `num_procs`
    /// participants.
    pub fn init(n_bar: usize, num_procs: usize) -> Self {
        let slots = (0..n_bar)
            .map(|_| Slot {
                state: Mutex::new(SlotState {
                    participants: num_procs,
                    waiting: 0,
                    generation: 0,
                }),
                cond: Condvar::new(),
            })
            .collect();
        BarrierBank { slots }
    }

    /// Reconfigure `slot` to expect `n` callers on its next use. Fails if
    /// any thread is currently blocked inside that slot.
    pub fn set_participants(&self, slot: usize, n: usize) -> CcResult<()> {
        let mut state = self.lock(slot)?;
        if state.waiting != 0 {
            return Err(CcError::config(format!(
                "cannot reconfigure barrier {slot}: {} caller(s) already waiting",
                state.waiting
            )));
        }
        state.participants = n;
        Ok(())
    }

    /// Block until all configured participants for `slot` have called
    /// `wait`. A full memory fence is issued before entering.
    pub fn wait(&self, slot: usize, _rank: usize) -> CcResult<()> {
        full_fence();
        let mut state = self.lock(slot)?;
        let my_generation = state.generation;
        state.waiting += 1;
        if state.waiting >= state.participants.max(1) {
            state.waiting = 0;
            state.generation = state.generation.wrapping_add(1);
            self.slots[slot].cond.notify_all();
            return Ok(());
        }
        while state.generation == my_generation {
            state = self
                .slots
                .get(slot)
                .expect("slot index out of range")
                .cond
                .wait(state)
                .map_err(|_| CcError::system(format!("barrier {slot} mutex poisoned")))?;
        }
        Ok(())
    }

    fn lock(&self, slot: usize) -> CcResult<std::sync::MutexGuard<'_, SlotState>> {
        self.slots
            .get(slot)
            .ok_or_else(|| CcError::config(format!("barrier slot {slot} out of range")))?
            .state
            .lock()
            .map_err(|_| CcError::system(format!("barrier {slot} mutex poisoned")))
    }

    /// Destroy all slots (a no-op beyond normal drop; exposed so callers can
    /// make the teardown point explicit, matching the run's "every resource
    /// is released on every exit path" discipline).
    pub fn term(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn n_participants_all_return() {
        let bank = Arc::new(BarrierBank::init(8, 1));
        bank.set_participants(B0, 4).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|r| {
                let bank = bank.clone();
                thread::spawn(move || bank.wait(B0, r).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn n_minus_one_participants_block() {
        let bank = Arc::new(BarrierBank::init(8, 1));
        bank.set_participants(B0, 4).unwrap();
        let handles: Vec<_> = (0..3)
            .map(|r| {
                let bank = bank.clone();
                thread::spawn(move || bank.wait(B0, r).unwrap())
            })
            .collect();
        // Give the three threads a chance to block, then confirm none have
        // completed by checking the handles are still joinable with a
        // short timeout substitute: since std threads have no join_timeout,
        // we instead verify the waiting counter never drained.
        thread::sleep(std::time::Duration::from_millis(50));
        let state = bank.slots[B0].state.lock().unwrap();
        assert_eq!(state.waiting, 3);
        drop(state);
        // release them so the test process can exit cleanly
        let bank2 = bank.clone();
        let releaser = thread::spawn(move || bank2.wait(B0, 99).unwrap());
        for h in handles {
            h.join().unwrap();
        }
        releaser.join().unwrap();
    }

    #[test]
    fn reconfigure_rejects_active_waiters() {
        let bank = Arc::new(BarrierBank::init(8, 1));
        bank.set_participants(B0, 2).unwrap();
        let bank2 = bank.clone();
        let waiter = thread::spawn(move || bank2.wait(B0, 0).unwrap());
        thread::sleep(std::time::Duration::from_millis(30));
        assert!(bank.set_participants(B0, 3).is_err());
        bank.wait(B0, 1).unwrap();
        waiter.join().unwrap();
    }

    #[test]
    fn per_group_slot_addressing_is_disjoint() {
        assert_ne!(per_group_slot(0, 0), per_group_slot(1, 0));
        assert_ne!(per_group_slot(0, 0), per_group_slot(0, 1));
    }
}
