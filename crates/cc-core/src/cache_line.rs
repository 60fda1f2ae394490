//! The contended cache line and the region of lines backing pointer-chase
//! tests.

use std::sync::atomic::{AtomicU32, AtomicU8};

/// A 64-byte-aligned record holding the words one rank's kernel mutates.
/// `word[0]` is the value read/written by store/load/CAS/FAI/SWAP kernels;
/// `tas_slot` is the dedicated byte TAS kernels test-and-set.
#[repr(align(64))]
pub struct CacheLine {
    pub word: [AtomicU32; 15],
    pub tas_slot: AtomicU8,
}

impl CacheLine {
    fn zeroed() -> Self {
        CacheLine {
            word: std::array::from_fn(|_| AtomicU32::new(0)),
            tas_slot: AtomicU8::new(0),
        }
    }
}

/// An ordered sequence of cache lines. Line 0 is the contended target;
/// lines `1..N_lines` form a pointer-chase arena reachable via `next`, a
/// single permutation cycle over `0..N_lines`.
pub struct CacheLineRegion {
    lines: Vec<CacheLine>,
    next: Vec<u32>,
}

impl CacheLineRegion {
    /// Allocate `n_lines` zero-initialized lines and build a pointer-chase
    /// permutation cycle over all of them using a seeded LCG-driven Sattolo
    /// shuffle (a Fisher-Yates variant excluding fixed points, guaranteeing
    /// a single cycle rather than a set of disjoint ones).
    pub fn new(n_lines: usize) -> Self {
        assert!(n_lines > 0, "a region must hold at least one line");
        let lines = (0..n_lines).map(|_| CacheLine::zeroed()).collect();
        let next = build_permutation_cycle(n_lines, 0x9E3779B97F4A7C15);
        CacheLineRegion { lines, next }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, idx: usize) -> &CacheLine {
        &self.lines[idx]
    }

    /// The contended target line.
    pub fn contended(&self) -> &CacheLine {
        &self.lines[0]
    }

    /// Next index in the pointer-chase permutation cycle.
    pub fn chase_next(&self, idx: usize) -> usize {
        self.next[idx] as usize
    }
}

/// A small LCG, matching the `lcg_next`-style PRNG pattern used elsewhere in
/// this codebase for reproducible shuffles and stride-hiding draws.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Lcg(seed | 1)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        self.0
    }

    /// Uniform value in `[0, bound)`.
    pub fn next_bounded(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        (self.next_u64() % bound as u64) as u32
    }
}

fn build_permutation_cycle(n: usize, seed: u64) -> Vec<u32> {
    let mut order: Vec<u32> = (0..n as u32).collect();
    let mut rng = Lcg::new(seed);
    // Sattolo's algorithm: for i from n-1 down to 1, swap with j in [0, i).
    for i in (1..n).rev() {
        let j = rng.next_bounded(i as u32) as usize;
        order.swap(i, j);
    }
    let mut next = vec![0u32; n];
    for i in 0..n {
        next[order[i] as usize] = order[(i + 1) % n];
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_start_zeroed() {
        let region = CacheLineRegion::new(4);
        for i in 0..4 {
            assert_eq!(region.line(i).word[0].load(std::sync::atomic::Ordering::Relaxed), 0);
        }
    }

    #[test]
    fn pointer_chase_forms_a_single_cycle() {
        let region = CacheLineRegion::new(8);
        let mut seen = vec![false; 8];
        let mut idx = 0usize;
        for _ in 0..8 {
            assert!(!seen[idx], "cycle revisited {idx} before covering all lines");
            seen[idx] = true;
            idx = region.chase_next(idx);
        }
        assert_eq!(idx, 0, "cycle must return to the start after n steps");
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn single_line_region_chases_to_itself() {
        let region = CacheLineRegion::new(1);
        assert_eq!(region.chase_next(0), 0);
    }
}
