//! Platform atomic intrinsics: CAS/FAI/TAS/SWAP on fixed-width words.
//!
//! These are thin wrappers over `core::sync::atomic` so the kernels crate
//! never touches `Ordering` directly; every call here uses `SeqCst`, matching
//! the "full fence before entering every barrier wait" ordering discipline
//! of the rest of the harness.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Compare-and-set on a 32-bit word. Returns `Ok(old)` on success,
/// `Err(actual)` on failure.
#[inline]
pub fn cas32(slot: &AtomicU32, expected: u32, new: u32) -> Result<u32, u32> {
    slot.compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst)
}

/// Fetch-and-increment on a 32-bit word; returns the previous value.
#[inline]
pub fn fai32(slot: &AtomicU32) -> u32 {
    slot.fetch_add(1, Ordering::SeqCst)
}

/// Test-and-set on an 8-bit word: atomically sets the slot to 1 and returns
/// the previous value (0 meant "was free").
#[inline]
pub fn tas8(slot: &AtomicU8) -> u8 {
    slot.swap(1, Ordering::SeqCst)
}

/// Reset a TAS slot back to free (0).
#[inline]
pub fn tas_reset8(slot: &AtomicU8) {
    slot.store(0, Ordering::SeqCst);
}

/// Unconditional swap on a 32-bit word; returns the previous value.
#[inline]
pub fn swap32(slot: &AtomicU32, new: u32) -> u32 {
    slot.swap(new, Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cas_succeeds_on_match() {
        let a = AtomicU32::new(5);
        assert_eq!(cas32(&a, 5, 6), Ok(5));
        assert_eq!(a.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn cas_fails_on_mismatch() {
        let a = AtomicU32::new(5);
        assert_eq!(cas32(&a, 4, 6), Err(5));
        assert_eq!(a.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn fai_returns_previous() {
        let a = AtomicU32::new(10);
        assert_eq!(fai32(&a), 10);
        assert_eq!(a.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn tas_then_reset() {
        let a = AtomicU8::new(0);
        assert_eq!(tas8(&a), 0);
        assert_eq!(tas8(&a), 1);
        tas_reset8(&a);
        assert_eq!(a.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn swap_returns_previous() {
        let a = AtomicU32::new(3);
        assert_eq!(swap32(&a, 9), 3);
        assert_eq!(a.load(Ordering::SeqCst), 9);
    }
}
