use clap::Parser;

/// Cache-coherence contention microbenchmark.
#[derive(Parser, Debug)]
#[command(
    name = "cc-bench",
    about = "Cache-coherence contention microbenchmark",
    after_help = test_catalogue()
)]
pub struct CliArgs {
    /// Number of rounds to run.
    #[arg(short = 'r', long = "repetitions", default_value_t = 1_000_000)]
    pub repetitions: u64,

    /// Jagged array of test ids, e.g. `[12]` or `[[12],[13]]`.
    #[arg(short = 't', long = "test")]
    pub test: Option<String>,

    /// Jagged array of physical core ids, e.g. `[[0,1],[2,3]]`.
    #[arg(short = 'x', long = "cores_array")]
    pub cores_array: Option<String>,

    /// Legacy core count, used when `--cores_array` is absent.
    #[arg(short = 'c', long = "cores", default_value_t = 2)]
    pub cores: usize,

    /// Prime core for each repetition; absent means classic (no-seed) mode.
    #[arg(short = 'b', long = "seed")]
    pub seed: Option<i64>,

    /// Stride-hiding factor; rounded up to a power of two.
    #[arg(short = 's', long = "stride", default_value_t = 1)]
    pub stride: u32,

    /// Fence policy level, 0..9.
    #[arg(short = 'e', long = "fence", default_value_t = 0)]
    pub fence: u8,

    /// Buffer size; accepts K/M/G suffix.
    #[arg(short = 'm', long = "mem-size", default_value = "64K")]
    pub mem_size: String,

    /// Flush the contended line before each repetition.
    #[arg(short = 'f', long = "flush")]
    pub flush: bool,

    /// Force atomic ops to always succeed.
    #[arg(short = 'u', long = "success")]
    pub success: bool,

    /// Enable exponential backoff in retry-until-success.
    #[arg(short = 'B', long = "backoff")]
    pub backoff: bool,

    /// Cap on pause iterations for retry loops (>= 1).
    #[arg(short = 'M', long = "backoff-max", default_value_t = 1024)]
    pub backoff_max: u32,

    /// Per-rank backoff caps; length must equal T.
    #[arg(short = 'A', long = "backoff-array")]
    pub backoff_array: Option<String>,

    /// Best-effort page lock of the shared buffer.
    #[arg(short = 'K', long = "mlock")]
    pub mlock: bool,

    /// Disable NUMA-local placement.
    #[arg(short = 'n', long = "no-numa")]
    pub no_numa: bool,

    /// Verbosity (repeat for higher levels).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Verbose per-sample printing; print every Nth sample (0 = off).
    #[arg(short = 'p', long = "print", default_value_t = 0)]
    pub print: u32,

    /// Emit a machine-readable JSON summary on stdout alongside the text
    /// report.
    #[arg(long = "json")]
    pub json: bool,
}

/// The `-t`/`--test` catalogue printed after the flag listing in `--help`.
fn test_catalogue() -> String {
    let mut out = String::from("Test ID catalogue (for -t/--test):\n");
    for &(id, name) in cc_kernels::action::catalogue() {
        out.push_str(&format!("  {id:>3}  {name}\n"));
    }
    out
}

/// Parse a size string with an optional k/m/g/t suffix (case-insensitive).
pub fn parse_mem_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size".to_string());
    }
    let (num_str, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024usize),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        Some(b't' | b'T') => (&s[..s.len() - 1], 1024usize * 1024 * 1024 * 1024),
        _ => (s, 1),
    };
    num_str
        .trim()
        .parse::<usize>()
        .map(|n| n * multiplier)
        .map_err(|e| format!("invalid size '{s}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffixed_sizes() {
        assert_eq!(parse_mem_size("1024").unwrap(), 1024);
        assert_eq!(parse_mem_size("4k").unwrap(), 4096);
        assert_eq!(parse_mem_size("4K").unwrap(), 4096);
        assert_eq!(parse_mem_size("4m").unwrap(), 4 * 1024 * 1024);
    }

    #[test]
    fn rejects_empty_size() {
        assert!(parse_mem_size("").is_err());
    }
}
