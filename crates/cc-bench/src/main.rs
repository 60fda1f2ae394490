mod cli;
mod config;
mod driver;
mod report;

use clap::Parser;

use cc_core::buffer::{self, AllocOptions, TouchPolicy};
use cc_core::error::CcError;
use cc_core::race::RunState;

use cli::CliArgs;
use config::RunConfig;
use report::ParitySocketPolicy;

const N_BARRIERS: usize = 16;

fn main() {
    let args = CliArgs::parse();

    let config = match RunConfig::from_cli(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(exit_code(&e));
        }
    };

    let alloc_opts = AllocOptions {
        n_lines: config.n_lines,
        preferred_node: if config.no_numa { None } else { Some(0) },
        lock_pages: config.mlock,
        touch_policy: TouchPolicy::FullRegion,
    };
    let region = match buffer::allocate(&alloc_opts) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(exit_code(&e));
        }
    };

    let n_bar = N_BARRIERS + config.rank_map.num_groups() * cc_core::barrier::PER_GROUP_SLOTS;
    let state = RunState::new(n_bar, config.rank_map.num_ranks(), config.n_reps as usize);

    println!("cc-bench (cache-coherence contention microbenchmark)");
    println!("  ranks          = {}", config.rank_map.num_ranks());
    println!("  groups         = {}", config.rank_map.num_groups());
    println!("  repetitions    = {}", config.n_reps);
    println!("  stride         = {}", config.stride);
    println!("  fence level    = {}", config.fence_lvl);
    println!("  n_lines        = {}", config.n_lines);

    let results = match driver::run(&config, &region, &state) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(exit_code(&e));
        }
    };

    let has_retry_kernel = config
        .rank_map
        .ranks
        .iter()
        .any(|r| cc_kernels::TestId::from_i64(r.test_id) == Some(cc_kernels::TestId::CasUntilSuccess));

    let summary = report::report(
        &config.rank_map,
        &results,
        &state.tracker,
        &ParitySocketPolicy,
        has_retry_kernel,
    );

    if config.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("ERROR: failed to serialize JSON summary: {e}"),
        }
    }
}

fn exit_code(e: &CcError) -> i32 {
    match e {
        CcError::Config(_) => 1,
        CcError::Alloc(_) => 2,
        CcError::System(_) => 3,
        CcError::KernelInternal(_) => 4,
    }
}
