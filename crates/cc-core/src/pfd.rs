//! PFD (per-fire-duration) sample store: a fixed-capacity, per-rank,
//! per-repetition ring of cycle samples, plus the summary statistics
//! derived from it.

/// A bounded buffer of `n_reps` cycle samples per `store_id`. `store_id`
/// permits multiple measurement points per repetition (e.g. the second
/// store in an owned-transition choreography). Single-writer (the owning
/// rank during the run), single-reader (the Reporter after join); the run
/// never shares a `PfdStore` across threads, so no synchronization is used.
pub struct PfdStore {
    samples: Vec<Vec<u64>>,
}

impl PfdStore {
    pub fn new(n_stores: usize, n_reps: usize) -> Self {
        PfdStore {
            samples: vec![Vec::with_capacity(n_reps); n_stores],
        }
    }

    /// Record the cycle cost of repetition `rep` at measurement point
    /// `store_id`. Call exactly once per `(store_id, rep)` pair (bracketing
    /// a kernel's `PFD_IN`/`PFD_OUT` pair).
    pub fn record(&mut self, store_id: usize, sample: u64) {
        self.samples[store_id].push(sample);
    }

    pub fn samples(&self, store_id: usize) -> &[u64] {
        &self.samples[store_id]
    }

    pub fn n_stores(&self) -> usize {
        self.samples.len()
    }

    /// The first store_id (ascending) that recorded at least one sample,
    /// per the Reporter's "first valid PFDStore" selection rule.
    pub fn first_valid(&self) -> Option<usize> {
        self.samples.iter().position(|s| !s.is_empty())
    }
}

/// Summary `{avg, min, max, std_dev, abs_dev}` over a PFDStore's samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsDeviation {
    pub avg: f64,
    pub min: u64,
    pub max: u64,
    pub std_dev: f64,
    pub abs_dev: f64,
}

impl AbsDeviation {
    /// Summarize a slice of cycle samples. Returns `None` for an empty
    /// slice ("no samples recorded").
    pub fn summarize(samples: &[u64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let min = *samples.iter().min().unwrap();
        let max = *samples.iter().max().unwrap();
        let avg = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
        let variance = samples
            .iter()
            .map(|&s| {
                let d = s as f64 - avg;
                d * d
            })
            .sum::<f64>()
            / n;
        let abs_dev = samples
            .iter()
            .map(|&s| (s as f64 - avg).abs())
            .sum::<f64>()
            / n;
        Some(AbsDeviation {
            avg,
            min,
            max,
            std_dev: variance.sqrt(),
            abs_dev,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_reads_back_samples() {
        let mut store = PfdStore::new(2, 4);
        store.record(0, 10);
        store.record(0, 20);
        assert_eq!(store.samples(0), &[10, 20]);
        assert!(store.samples(1).is_empty());
    }

    #[test]
    fn first_valid_skips_empty_stores() {
        let mut store = PfdStore::new(3, 4);
        store.record(1, 5);
        assert_eq!(store.first_valid(), Some(1));
    }

    #[test]
    fn no_samples_summarizes_to_none() {
        assert!(AbsDeviation::summarize(&[]).is_none());
    }

    #[test]
    fn summary_matches_hand_computed_values() {
        let s = AbsDeviation::summarize(&[10, 20, 30]).unwrap();
        assert_eq!(s.min, 10);
        assert_eq!(s.max, 30);
        assert!((s.avg - 20.0).abs() < 1e-9);
        // variance of [10,20,30] about mean 20 is (100+0+100)/3 = 66.666..
        assert!((s.std_dev - 66.666_666_666_f64.sqrt()).abs() < 1e-6);
        assert!((s.abs_dev - (10.0 / 3.0 + 0.0 + 10.0 / 3.0)).abs() < 1e-6);
    }
}
