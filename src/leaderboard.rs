//! Best fitness per algorithm and per optimizer up to the current step
//!
//! Scans the full dataset (not the reduced render set), so results are
//! memoized on `(step, filters)` and only recomputed when that changes.

use crate::dataset::{Algo, Dataset, Filters, Optimizer};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Standings {
    by_algo: [Option<f64>; 2],
    by_opt: [Option<f64>; 2],
}

impl Standings {
    pub fn algo(&self, algo: Algo) -> Option<f64> {
        self.by_algo[algo.index()]
    }

    pub fn opt(&self, opt: Optimizer) -> Option<f64> {
        self.by_opt[opt.index()]
    }

    fn compute(dataset: &Dataset, threshold: u32, filters: Filters) -> Self {
        let limit = f64::from(threshold) + 0.5;
        let mut out = Standings::default();
        for r in dataset.records() {
            if f64::from(r.step) > limit || !filters.matches(r) {
                continue;
            }
            keep_min(&mut out.by_algo[r.algo.index()], r.fitness_ms);
            keep_min(&mut out.by_opt[r.opt.index()], r.fitness_ms);
        }
        out
    }
}

fn keep_min(slot: &mut Option<f64>, v: f64) {
    *slot = Some(slot.map_or(v, |best| best.min(v)));
}

#[derive(Debug, Default)]
pub struct Leaderboard {
    key: Option<(u32, Filters)>,
    standings: Standings,
}

impl Leaderboard {
    /// Recompute if `(threshold, filters)` differs from the last call.
    /// Returns true when a scan ran.
    pub fn refresh(&mut self, dataset: &Dataset, threshold: u32, filters: Filters) -> bool {
        let key = (threshold, filters);
        if self.key == Some(key) {
            return false;
        }
        self.standings = Standings::compute(dataset, threshold, filters);
        self.key = Some(key);
        tracing::debug!("Leaderboard recomputed at step {} with {:?}", threshold, filters);
        true
    }

    pub fn invalidate(&mut self) {
        self.key = None;
        self.standings = Standings::default();
    }

    pub fn standings(&self) -> &Standings {
        &self.standings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::rich_log;

    fn sample() -> Dataset {
        Dataset::parse(&rich_log(&[
            (0, "QS", "GA", 5.0, 1, 1),
            (0, "QS", "SA", 3.0, 1, 1),
            (1, "MS", "GA", 1.0, 1, 1),
            (2, "MS", "SA", 0.5, 1, 1),
        ]))
        .unwrap()
    }

    #[test]
    fn test_step_threshold() {
        let ds = sample();
        let mut lb = Leaderboard::default();
        assert!(lb.refresh(&ds, 0, Filters::default()));
        let s = lb.standings();
        assert_eq!(s.algo(Algo::QuickSort), Some(3.0));
        assert_eq!(s.algo(Algo::MergeSort), None);
        assert_eq!(s.opt(Optimizer::Genetic), Some(5.0));
        assert_eq!(s.opt(Optimizer::Annealing), Some(3.0));

        lb.refresh(&ds, 1, Filters::default());
        assert_eq!(lb.standings().algo(Algo::MergeSort), Some(1.0));
        assert_eq!(lb.standings().opt(Optimizer::Genetic), Some(1.0));
    }

    #[test]
    fn test_filters_apply_to_both_axes() {
        let ds = sample();
        let mut lb = Leaderboard::default();
        lb.refresh(&ds, 2, Filters { algo: Some(Algo::QuickSort), opt: None });
        let s = lb.standings();
        assert_eq!(s.algo(Algo::MergeSort), None);
        assert_eq!(s.opt(Optimizer::Annealing), Some(3.0));
        assert_eq!(s.opt(Optimizer::Genetic), Some(5.0));
    }

    #[test]
    fn test_memoized_on_key() {
        let ds = sample();
        let mut lb = Leaderboard::default();
        assert!(lb.refresh(&ds, 1, Filters::default()));
        assert!(!lb.refresh(&ds, 1, Filters::default()));
        assert!(lb.refresh(&ds, 1, Filters { algo: None, opt: Some(Optimizer::Genetic) }));
        lb.invalidate();
        assert!(lb.refresh(&ds, 1, Filters { algo: None, opt: Some(Optimizer::Genetic) }));
    }
}
