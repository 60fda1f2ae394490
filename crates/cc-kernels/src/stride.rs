//! The stride-hiding loop: draw a random line index in `[0, stride)`, act on
//! it, and keep drawing until the contended line (`cln == 0`) is hit. This
//! defeats hardware prefetchers that would otherwise learn a fixed-stride
//! access pattern; the final, `cln == 0` call is the one whose timing is
//! kept as the observable sample.

use cc_core::cache_line::Lcg;

/// Run `op(cln)` in a loop, drawing `cln` uniformly from `[0, stride)` each
/// time, until a draw lands on `0`. `op` is called at least once. Returns
/// the number of iterations performed.
pub fn stride_hide<F: FnMut(usize)>(stride: u32, rng: &mut Lcg, mut op: F) -> u32 {
    let mut iterations = 0u32;
    loop {
        let cln = rng.next_bounded(stride.max(1)) as usize;
        op(cln);
        iterations += 1;
        if cln == 0 {
            return iterations;
        }
    }
}

/// Round a requested stride up to the next power of two, per the CLI
/// contract for `--stride`.
pub fn round_up_pow2(n: u32) -> u32 {
    if n <= 1 {
        1
    } else {
        n.next_power_of_two()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_of_one_resolves_immediately() {
        let mut rng = Lcg::new(1);
        let mut calls = 0;
        let iters = stride_hide(1, &mut rng, |cln| {
            calls += 1;
            assert_eq!(cln, 0);
        });
        assert_eq!(iters, 1);
        assert_eq!(calls, 1);
    }

    #[test]
    fn loop_always_ends_on_zero() {
        let mut rng = Lcg::new(42);
        let mut last_seen = 99usize;
        stride_hide(8, &mut rng, |cln| last_seen = cln);
        assert_eq!(last_seen, 0);
    }

    #[test]
    fn round_up_pow2_table() {
        assert_eq!(round_up_pow2(0), 1);
        assert_eq!(round_up_pow2(1), 1);
        assert_eq!(round_up_pow2(2), 2);
        assert_eq!(round_up_pow2(3), 4);
        assert_eq!(round_up_pow2(9), 16);
    }
}
