//! Cycle-accurate timing primitive.
//!
//! Reference: the teacher's `ior_core::timer::now()` wall-clock epoch; this
//! reads the hardware cycle counter instead of a monotonic `Instant`, since
//! samples here are compared as raw cycle counts across threads rather than
//! per-thread elapsed seconds.

/// Read the monotonic cycle counter, ordered by a full fence on entry so the
/// read cannot be reordered ahead of the work it is timing.
#[inline]
pub fn ticks_now() -> u64 {
    full_fence();
    read_tsc()
}

#[cfg(target_arch = "x86_64")]
#[inline]
fn read_tsc() -> u64 {
    unsafe { core::arch::x86_64::_rdtsc() }
}

#[cfg(target_arch = "aarch64")]
#[inline]
fn read_tsc() -> u64 {
    let ticks: u64;
    unsafe {
        core::arch::asm!("mrs {0}, cntvct_el0", out(reg) ticks, options(nomem, nostack));
    }
    ticks
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline]
fn read_tsc() -> u64 {
    use std::time::Instant;
    use std::sync::OnceLock;
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_nanos() as u64
}

/// A full memory fence: no load or store may cross it in either direction.
#[inline]
pub fn full_fence() {
    std::sync::atomic::fence(std::sync::atomic::Ordering::SeqCst);
    #[cfg(target_arch = "x86_64")]
    unsafe {
        core::arch::asm!("mfence", options(nomem, nostack, preserves_flags));
    }
}

/// A store fence: no store may cross it in either direction.
#[inline]
pub fn store_fence() {
    std::sync::atomic::fence(std::sync::atomic::Ordering::Release);
    #[cfg(target_arch = "x86_64")]
    unsafe {
        core::arch::asm!("sfence", options(nomem, nostack, preserves_flags));
    }
}

/// A load fence: no load may cross it in either direction.
#[inline]
pub fn load_fence() {
    std::sync::atomic::fence(std::sync::atomic::Ordering::Acquire);
    #[cfg(target_arch = "x86_64")]
    unsafe {
        core::arch::asm!("lfence", options(nomem, nostack, preserves_flags));
    }
}

/// A spin-wait hint instruction; does not order memory.
#[inline]
pub fn pause() {
    std::hint::spin_loop();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_monotonic_enough() {
        let a = ticks_now();
        let b = ticks_now();
        assert!(b >= a);
    }

    #[test]
    fn fences_do_not_panic() {
        full_fence();
        store_fence();
        load_fence();
        pause();
    }
}
