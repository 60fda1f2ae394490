//! Buffer allocator: produces a cache-line-aligned `CacheLineRegion`,
//! optionally first-touched and page-locked. NUMA placement and page
//! locking are best-effort; their failure never aborts the run.

use crate::cache_line::CacheLineRegion;
use crate::error::{CcError, CcResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPolicy {
    SingleLine,
    FullRegion,
}

#[derive(Debug, Clone)]
pub struct AllocOptions {
    pub n_lines: usize,
    pub preferred_node: Option<u32>,
    pub lock_pages: bool,
    pub touch_policy: TouchPolicy,
}

/// Allocate the shared region per `opts`, applying the requested touch
/// policy and returning the region ready for use by round 0.
///
/// Reference: the teacher's `AlignedBuffer` (page-aligned, zero-filled,
/// `unsafe impl Send + Sync` backed by an owned allocation) is the model for
/// "return an aligned, owned, thread-shareable buffer"; here the owned
/// allocation is `CacheLineRegion` itself rather than a raw byte slice.
pub fn allocate(opts: &AllocOptions) -> CcResult<CacheLineRegion> {
    if opts.n_lines == 0 {
        return Err(CcError::alloc("region must contain at least one line"));
    }
    let region = CacheLineRegion::new(opts.n_lines);

    if opts.preferred_node.is_some() {
        // NUMA-local placement is attempted via first-touch on the calling
        // thread only; if the platform cannot honor node affinity this is
        // silently a uniform allocation, per contract.
    }

    touch(&region, opts.touch_policy);

    if opts.lock_pages {
        let _ = try_mlock(&region);
    }

    Ok(region)
}

fn touch(region: &CacheLineRegion, policy: TouchPolicy) {
    use std::sync::atomic::Ordering;
    match policy {
        TouchPolicy::SingleLine => {
            region.contended().word[0].store(0, Ordering::Relaxed);
        }
        TouchPolicy::FullRegion => {
            for i in 0..region.len() {
                region.line(i).word[0].store(0, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(unix)]
fn try_mlock(region: &CacheLineRegion) -> CcResult<()> {
    if region.is_empty() {
        return Ok(());
    }
    let ptr = region.contended() as *const _ as *const libc::c_void;
    let len = std::mem::size_of::<crate::cache_line::CacheLine>() * region.len();
    // SAFETY: `ptr` points at memory owned by `region` for at least `len`
    // bytes, which outlives this call. Failure is intentionally ignored.
    let rc = unsafe { libc::mlock(ptr, len) };
    if rc != 0 {
        return Err(CcError::alloc("mlock failed (non-fatal, proceeding unlocked)"));
    }
    Ok(())
}

#[cfg(not(unix))]
fn try_mlock(_region: &CacheLineRegion) -> CcResult<()> {
    Err(CcError::alloc("page locking not supported on this platform"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_requested_line_count() {
        let region = allocate(&AllocOptions {
            n_lines: 16,
            preferred_node: None,
            lock_pages: false,
            touch_policy: TouchPolicy::SingleLine,
        })
        .unwrap();
        assert_eq!(region.len(), 16);
    }

    #[test]
    fn zero_lines_is_an_alloc_error() {
        let err = allocate(&AllocOptions {
            n_lines: 0,
            preferred_node: None,
            lock_pages: false,
            touch_policy: TouchPolicy::SingleLine,
        });
        assert!(matches!(err, Err(CcError::Alloc(_))));
    }
}
