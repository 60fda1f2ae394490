//! The immutable configuration handed to every worker thread. Built once
//! by the controller from parsed CLI input; never mutated afterward. The
//! atomics every worker also needs live in `cc_core::race::RunState`
//! instead, per the split mandated for this rewrite.

use cc_core::error::{CcError, CcResult};
use cc_core::fence_policy::{self, FenceMode};
use cc_core::jagged;
use cc_core::rank::{self, MapInputs, RankMap};

use crate::cli::{parse_mem_size, CliArgs};

pub const CACHE_LINE_BYTES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedMode {
    Classic,
    InBand(usize),
    Auxiliary,
}

pub struct RunConfig {
    pub rank_map: RankMap,
    pub n_reps: u64,
    pub stride: u32,
    pub fence_lvl: u8,
    pub load_fence: FenceMode,
    pub store_fence: FenceMode,
    pub flush_before_rep: bool,
    pub force_success: bool,
    pub backoff_max: u32,
    pub mlock: bool,
    pub no_numa: bool,
    pub verbose: u8,
    pub print_every: u32,
    pub seed_core: Option<i64>,
    pub seed_mode: SeedMode,
    pub n_lines: usize,
    pub json: bool,
}

impl RunConfig {
    pub fn from_cli(args: &CliArgs) -> CcResult<RunConfig> {
        let test_spec = args
            .test
            .as_deref()
            .map(jagged::parse)
            .transpose()?;
        let cores_spec = args
            .cores_array
            .as_deref()
            .map(jagged::parse)
            .transpose()?;
        let backoff_spec = args
            .backoff_array
            .as_deref()
            .map(jagged::parse)
            .transpose()?;

        let default_backoff = if args.backoff { args.backoff_max.max(1) } else { 1 };
        let inputs = MapInputs {
            test_spec: test_spec.as_ref(),
            cores_spec: cores_spec.as_ref(),
            backoff_spec: backoff_spec.as_ref(),
            default_t: args.cores,
            default_test: 0,
            default_backoff,
        };
        let rank_map = rank::map_ranks(&inputs)?;

        let (load_fence, store_fence) = fence_policy::resolve(args.fence)?;

        let mem_size = parse_mem_size(&args.mem_size).map_err(CcError::config)?;
        let n_lines = (mem_size / CACHE_LINE_BYTES).max(1);

        let stride = cc_kernels::round_up_pow2(args.stride.max(1));

        // Non-flush preconditioned tests must draw from an arena large
        // enough to sustain `repetitions * stride` worst-case draws;
        // stride == 1 always resolves on its first draw so it is exempt.
        if !args.flush && stride > 1 && args.repetitions * stride as u64 > n_lines as u64 {
            return Err(CcError::config(
                "repetitions * stride exceeds the available line count; grow --mem-size or shrink --stride",
            ));
        }

        let seed_mode = match args.seed {
            None => SeedMode::Classic,
            Some(core) => {
                if rank_map.ranks.iter().any(|r| r.core == core) {
                    let idx = rank_map.ranks.iter().position(|r| r.core == core).unwrap();
                    SeedMode::InBand(idx)
                } else {
                    SeedMode::Auxiliary
                }
            }
        };

        Ok(RunConfig {
            rank_map,
            n_reps: args.repetitions,
            stride,
            fence_lvl: args.fence,
            load_fence,
            store_fence,
            flush_before_rep: args.flush,
            force_success: args.success,
            backoff_max: args.backoff_max.max(1),
            mlock: args.mlock,
            no_numa: args.no_numa,
            verbose: args.verbose,
            print_every: args.print,
            seed_core: args.seed,
            seed_mode,
            n_lines,
            json: args.json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> CliArgs {
        CliArgs {
            repetitions: 100,
            test: Some("[16]".to_string()),
            cores_array: Some("[[0,1]]".to_string()),
            cores: 2,
            seed: None,
            stride: 1,
            fence: 0,
            mem_size: "64K".to_string(),
            flush: false,
            success: false,
            backoff: false,
            backoff_max: 1024,
            backoff_array: None,
            mlock: false,
            no_numa: false,
            verbose: 0,
            print: 0,
            json: false,
        }
    }

    #[test]
    fn builds_classic_mode_when_no_seed() {
        let cfg = RunConfig::from_cli(&base_args()).unwrap();
        assert_eq!(cfg.seed_mode, SeedMode::Classic);
        assert_eq!(cfg.rank_map.num_ranks(), 2);
    }

    #[test]
    fn seed_core_in_array_is_in_band() {
        let mut args = base_args();
        args.seed = Some(0);
        let cfg = RunConfig::from_cli(&args).unwrap();
        assert_eq!(cfg.seed_mode, SeedMode::InBand(0));
    }

    #[test]
    fn seed_core_outside_array_is_auxiliary() {
        let mut args = base_args();
        args.seed = Some(2);
        let cfg = RunConfig::from_cli(&args).unwrap();
        assert_eq!(cfg.seed_mode, SeedMode::Auxiliary);
    }

    #[test]
    fn out_of_range_fence_is_config_error() {
        let mut args = base_args();
        args.fence = 20;
        assert!(RunConfig::from_cli(&args).is_err());
    }

    #[test]
    fn stride_rounds_up_to_power_of_two() {
        let mut args = base_args();
        args.stride = 9;
        let cfg = RunConfig::from_cli(&args).unwrap();
        assert_eq!(cfg.stride, 16);
    }
}
