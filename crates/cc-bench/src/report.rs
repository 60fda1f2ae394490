//! Reporter: post-join summary of every rank's PFDStore and the shared
//! race tracker, in the stable line-oriented stdout format plus an
//! optional JSON mirror.

use serde::Serialize;

use cc_core::pfd::AbsDeviation;
use cc_core::race::RaceTracker;
use cc_core::rank::RankMap;

use crate::driver::RankResult;

/// Maps a physical core id to a socket index. Exposed as an injectable
/// policy since the mapping is platform-specific.
pub trait SocketPolicy {
    fn socket_of(&self, core: i64) -> usize;
}

/// Default policy: even physical ids are socket 0, odd are socket 1.
pub struct ParitySocketPolicy;

impl SocketPolicy for ParitySocketPolicy {
    fn socket_of(&self, core: i64) -> usize {
        if core < 0 {
            0
        } else {
            (core % 2) as usize
        }
    }
}

#[derive(Serialize)]
pub struct RankLine {
    pub rank: usize,
    pub core: i64,
    pub group: usize,
    pub role: usize,
    pub socket: usize,
    pub avg: Option<f64>,
    pub min: Option<u64>,
    pub max: Option<u64>,
    pub std_dev: Option<f64>,
    pub abs_dev: Option<f64>,
    pub wins: u64,
    pub cas_attempts: u64,
    pub cas_successes: u64,
    pub cas_failures: u64,
    pub common_latency_avg: Option<f64>,
    pub common_latency_min: Option<u64>,
    pub common_latency_max: Option<u64>,
}

/// Per-socket aggregate over the ranks `ParitySocketPolicy` (or whatever
/// policy is injected) assigns to that socket.
#[derive(Serialize)]
pub struct SocketLine {
    pub socket: usize,
    pub n_ranks: usize,
    pub mean_avg: f64,
    pub min_avg: f64,
    pub max_avg: f64,
}

/// Per-repetition fairness check: does the rank that actually won the race
/// (`first_winner`) match the rank with the smallest measured common-start
/// latency for that repetition? Disagreement means the race-claim ordering
/// and the latency ordering diverge for that rep.
#[derive(Serialize)]
pub struct FairnessSummary {
    pub reps_checked: usize,
    pub agreements: usize,
    pub agreement_rate: f64,
}

#[derive(Serialize)]
pub struct ReportSummary {
    pub ranks: Vec<RankLine>,
    pub mean_avg: Option<f64>,
    pub min_avg_core: Option<(i64, f64)>,
    pub max_avg_core: Option<(i64, f64)>,
    pub retries_observed: bool,
    pub sockets: Vec<SocketLine>,
    pub fairness: Option<FairnessSummary>,
}

/// Build the summary and print the stable text report to stdout. Returns
/// the structured summary so the caller can additionally emit JSON.
pub fn report(
    rank_map: &RankMap,
    results: &[RankResult],
    tracker: &RaceTracker,
    socket_policy: &dyn SocketPolicy,
    has_retry_kernel: bool,
) -> ReportSummary {
    println!();
    println!("Core/role mapping: {} ranks across {} group(s)", rank_map.num_ranks(), rank_map.num_groups());

    let mut lines = Vec::with_capacity(rank_map.num_ranks());
    for (rank, r) in rank_map.ranks.iter().enumerate() {
        let pfd = results.get(rank).map(|rr| &rr.pfd);
        let summary = pfd
            .and_then(|p| p.first_valid())
            .and_then(|sid| pfd.map(|p| AbsDeviation::summarize(p.samples(sid))))
            .flatten();

        match &summary {
            Some(s) => println!(
                "Core number {} is using thread: {}. with: avg {:.2} cycles (min {} | max {}), std dev: {:.2}, abs dev: {:.2}",
                r.role, r.core, s.avg, s.min, s.max, s.std_dev, s.abs_dev
            ),
            None => println!("Core number {} is using thread: {}. no samples recorded", r.role, r.core),
        }

        let n_reps = tracker.n_reps();
        let common_samples: Vec<u64> = (0..n_reps)
            .map(|rep| tracker.common_latency(rank, rep))
            .filter(|&v| v > 0)
            .collect();
        let common_summary = AbsDeviation::summarize(&common_samples);

        lines.push(RankLine {
            rank,
            core: r.core,
            group: r.group,
            role: r.role,
            socket: socket_policy.socket_of(r.core),
            avg: summary.as_ref().map(|s| s.avg),
            min: summary.as_ref().map(|s| s.min),
            max: summary.as_ref().map(|s| s.max),
            std_dev: summary.as_ref().map(|s| s.std_dev),
            abs_dev: summary.as_ref().map(|s| s.abs_dev),
            wins: tracker.wins(rank),
            cas_attempts: tracker.cas_attempts(rank),
            cas_successes: tracker.cas_successes(rank),
            cas_failures: tracker.cas_failures(rank),
            common_latency_avg: common_summary.as_ref().map(|s| s.avg),
            common_latency_min: common_summary.as_ref().map(|s| s.min),
            common_latency_max: common_summary.as_ref().map(|s| s.max),
        });
    }

    let avgs: Vec<(i64, f64)> = lines
        .iter()
        .filter_map(|l| l.avg.map(|a| (l.core, a)))
        .collect();
    let mean_avg = if avgs.is_empty() {
        None
    } else {
        Some(avgs.iter().map(|(_, a)| a).sum::<f64>() / avgs.len() as f64)
    };
    let min_avg_core = avgs.iter().cloned().reduce(|a, b| if b.1 < a.1 { b } else { a });
    let max_avg_core = avgs.iter().cloned().reduce(|a, b| if b.1 > a.1 { b } else { a });

    match (mean_avg, min_avg_core, max_avg_core) {
        (Some(mean), Some((min_c, min_a)), Some((max_c, max_a))) => println!(
            "Summary : mean avg {mean:.2} cycles | min avg {min_a:.2} (core {min_c}) | max avg {max_a:.2} (core {max_c})"
        ),
        _ => println!("Summary : no samples recorded"),
    }

    for line in &lines {
        println!(
            "Group {} role {} on thread {} (thread ID {}): {} wins",
            line.group, line.role, line.core, line.rank, line.wins
        );
    }

    if has_retry_kernel {
        for line in &lines {
            println!(
                "Group {} role {} retry stats: attempts {} successes {} failures {}",
                line.group, line.role, line.cas_attempts, line.cas_successes, line.cas_failures
            );
        }
    }

    for line in &lines {
        if let (Some(avg), Some(min), Some(max)) =
            (line.common_latency_avg, line.common_latency_min, line.common_latency_max)
        {
            println!(
                "Group {} role {} common-start latency: avg {:.2} min {} max {}",
                line.group, line.role, avg, min, max
            );
        }
    }

    let sockets = socket_rollup(&lines);
    for s in &sockets {
        println!(
            "Socket {}: {} rank(s), mean avg {:.2} cycles (min {:.2} | max {:.2})",
            s.socket, s.n_ranks, s.mean_avg, s.min_avg, s.max_avg
        );
    }

    let fairness = fairness_agreement(rank_map.num_ranks(), tracker);
    if let Some(f) = &fairness {
        println!(
            "Fairness: first-claimed winner matched the lowest common-start latency in {}/{} repetitions ({:.1}%)",
            f.agreements,
            f.reps_checked,
            f.agreement_rate * 100.0
        );
    }

    ReportSummary {
        ranks: lines,
        mean_avg,
        min_avg_core,
        max_avg_core,
        retries_observed: has_retry_kernel,
        sockets,
        fairness,
    }
}

/// Group rank lines by socket and summarize each group's `avg` latency.
/// Ranks with no recorded samples (`avg: None`) are excluded from every
/// socket's aggregate.
fn socket_rollup(lines: &[RankLine]) -> Vec<SocketLine> {
    let mut sockets: Vec<usize> = lines.iter().map(|l| l.socket).collect();
    sockets.sort_unstable();
    sockets.dedup();

    sockets
        .into_iter()
        .filter_map(|socket| {
            let avgs: Vec<f64> = lines.iter().filter(|l| l.socket == socket).filter_map(|l| l.avg).collect();
            if avgs.is_empty() {
                return None;
            }
            let n_ranks = avgs.len();
            let mean_avg = avgs.iter().sum::<f64>() / n_ranks as f64;
            let min_avg = avgs.iter().cloned().fold(f64::INFINITY, f64::min);
            let max_avg = avgs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            Some(SocketLine {
                socket,
                n_ranks,
                mean_avg,
                min_avg,
                max_avg,
            })
        })
        .collect()
}

/// For every repetition that recorded both a winner and at least one
/// common-start latency sample, check whether the rank that won the race
/// is also the rank with the smallest recorded common-start latency.
fn fairness_agreement(n_ranks: usize, tracker: &RaceTracker) -> Option<FairnessSummary> {
    let n_reps = tracker.n_reps();
    let mut reps_checked = 0usize;
    let mut agreements = 0usize;

    for rep in 0..n_reps {
        let Some(winner) = tracker.first_winner(rep) else {
            continue;
        };
        let fastest = (0..n_ranks)
            .map(|rank| (rank, tracker.common_latency(rank, rep)))
            .filter(|&(_, latency)| latency > 0)
            .min_by_key(|&(_, latency)| latency);
        let Some((fastest_rank, _)) = fastest else {
            continue;
        };
        reps_checked += 1;
        if fastest_rank == winner {
            agreements += 1;
        }
    }

    if reps_checked == 0 {
        return None;
    }
    Some(FairnessSummary {
        reps_checked,
        agreements,
        agreement_rate: agreements as f64 / reps_checked as f64,
    })
}
