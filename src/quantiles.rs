//! Per-step fitness statistics, built once per load
//!
//! - Quartile bands (25th/75th percentile) used for coloring
//! - Best fitness per step for the timeline plot

use std::collections::{BTreeMap, HashMap};

use crate::dataset::Record;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quartiles {
    pub q25: f64,
    pub q75: f64,
}

/// Step → quartile band of that step's fitness values
#[derive(Debug, Clone, Default)]
pub struct QuantileTable {
    by_step: HashMap<u32, Quartiles>,
}

impl QuantileTable {
    pub fn build(records: &[Record]) -> Self {
        let by_step = group_fitness(records)
            .into_iter()
            .map(|(step, mut values)| {
                values.sort_by(f64::total_cmp);
                let q = Quartiles {
                    q25: nearest_rank(&values, 0.25),
                    q75: nearest_rank(&values, 0.75),
                };
                (step, q)
            })
            .collect();
        Self { by_step }
    }

    pub fn get(&self, step: u32) -> Option<&Quartiles> {
        self.by_step.get(&step)
    }

    pub fn len(&self) -> usize {
        self.by_step.len()
    }
}

/// Minimum fitness at each step, in step order
pub fn best_by_step(records: &[Record]) -> Vec<(u32, f64)> {
    let mut best: BTreeMap<u32, f64> = BTreeMap::new();
    for r in records {
        best.entry(r.step)
            .and_modify(|b| *b = b.min(r.fitness_ms))
            .or_insert(r.fitness_ms);
    }
    best.into_iter().collect()
}

fn group_fitness(records: &[Record]) -> HashMap<u32, Vec<f64>> {
    let mut groups: HashMap<u32, Vec<f64>> = HashMap::new();
    for r in records {
        groups.entry(r.step).or_default().push(r.fitness_ms);
    }
    groups
}

/// `sorted[floor(rank * (n - 1))]`; `sorted` must be non-empty
fn nearest_rank(sorted: &[f64], rank: f64) -> f64 {
    let last = sorted.len() - 1;
    let idx = ((rank * last as f64).floor() as usize).min(last);
    sorted[idx]
}
