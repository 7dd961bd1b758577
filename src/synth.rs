//! Synthetic experiment logs
//!
//! Writes rich-layout CSV with the shape real optimizer runs produce: four
//! lanes (QS/MS x GA/SA), a population per lane per step, and fitness that
//! drifts down as the search goes on. Seeded, so the same arguments always
//! give the same file.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::dataset::{Algo, Optimizer};

pub const HEADER: [&str; 20] = [
    "run_id", "step", "algo", "opt", "pivot", "scheme", "cutoff", "depth", "tail", "run_threshold",
    "iterative", "reuse_buffer", "fitness_ms", "comparisons", "swaps", "n", "trials_per_dist",
    "dist_mask", "pop_idx", "temp",
];

const PIVOTS: [&str; 4] = ["First", "Last", "Median3", "Random"];
const SCHEMES: [&str; 2] = ["Hoare", "Lomuto"];
const SIZES: [u64; 3] = [10_000, 50_000, 100_000];
const TRIALS_PER_DIST: u32 = 3;
const DIST_MASK: u32 = 0b111;
const START_TEMPERATURE: f64 = 100.0;
const COOLING: f64 = 0.95;

#[derive(Debug, Clone, Copy)]
pub struct SynthOptions {
    pub steps: u32,
    /// Individuals per lane per step
    pub population: u32,
    pub seed: u64,
}

impl SynthOptions {
    pub fn rows(&self) -> u64 {
        u64::from(self.steps) * u64::from(self.population) * 4
    }
}

/// Write a synthetic log to `path`
pub fn write_file(path: &Path, options: SynthOptions) -> Result<u64> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let rows = write_rows(std::io::BufWriter::new(file), options)?;
    info!("Wrote {} synthetic rows to {}", rows, path.display());
    Ok(rows)
}

pub fn write_rows<W: Write>(out: W, options: SynthOptions) -> Result<u64> {
    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(HEADER)?;

    let run_id = format!("synth-{:x}", options.seed);
    let mut rows = 0;
    for step in 0..options.steps {
        // 1.0 at the first step, approaching 0.4 at the end
        let progress = f64::from(step) / f64::from(options.steps.max(1));
        let improvement = 1.0 - 0.6 * progress;
        let temperature = START_TEMPERATURE * COOLING.powi(step as i32);

        for algo in Algo::ALL {
            for opt in Optimizer::ALL {
                for idx in 0..options.population {
                    let n = SIZES[rng.gen_range(0..SIZES.len())];
                    let genome = random_genome(&mut rng, algo);
                    let n_log_n = n as f64 * (n as f64).log2();
                    let quality = genome.quality * rng.gen_range(0.85..1.15);
                    let comparisons = (n_log_n * quality * rng.gen_range(0.9..1.1)) as u64;
                    let swaps = match algo {
                        Algo::QuickSort => (comparisons as f64 * rng.gen_range(0.25..0.45)) as u64,
                        Algo::MergeSort => (n_log_n * rng.gen_range(0.9..1.0)) as u64,
                    };
                    let fitness_ms = n_log_n * 1e-5 * quality * improvement;

                    let (pop_idx, temp) = match opt {
                        Optimizer::Genetic => (idx.to_string(), String::new()),
                        Optimizer::Annealing => (String::new(), format!("{:.3}", temperature)),
                    };
                    let [pivot, scheme, cutoff, depth, tail, run_threshold, iterative, reuse] =
                        genome.cells;
                    writer.write_record([
                        run_id.clone(),
                        step.to_string(),
                        algo.tag().to_string(),
                        opt.tag().to_string(),
                        pivot,
                        scheme,
                        cutoff,
                        depth,
                        tail,
                        run_threshold,
                        iterative,
                        reuse,
                        format!("{:.4}", fitness_ms),
                        comparisons.to_string(),
                        swaps.to_string(),
                        n.to_string(),
                        TRIALS_PER_DIST.to_string(),
                        DIST_MASK.to_string(),
                        pop_idx,
                        temp,
                    ])?;
                    rows += 1;
                }
            }
        }
    }
    writer.flush()?;
    Ok(rows)
}

struct RandomGenome {
    /// pivot..reuse_buffer columns, empty where the algorithm has none
    cells: [String; 8],
    /// Relative cost multiplier, lower is faster
    quality: f64,
}

fn random_genome(rng: &mut StdRng, algo: Algo) -> RandomGenome {
    let flag = |b: bool| if b { "1" } else { "0" }.to_string();
    match algo {
        Algo::QuickSort => {
            let pivot = PIVOTS[rng.gen_range(0..PIVOTS.len())];
            let scheme = SCHEMES[rng.gen_range(0..SCHEMES.len())];
            let cutoff: u32 = rng.gen_range(0..=48);
            let depth: u32 = rng.gen_range(0..=64);
            let tail = rng.gen_bool(0.5);
            let mut quality = 1.0;
            if matches!(pivot, "First" | "Last") {
                quality += 0.25;
            }
            if scheme == "Hoare" {
                quality -= 0.05;
            }
            // insertion sort helps most around 16
            quality += (f64::from(cutoff) - 16.0).abs() / 160.0;
            RandomGenome {
                cells: [
                    pivot.to_string(),
                    scheme.to_string(),
                    cutoff.to_string(),
                    depth.to_string(),
                    flag(tail),
                    String::new(),
                    String::new(),
                    String::new(),
                ],
                quality,
            }
        }
        Algo::MergeSort => {
            let run_threshold: u32 = rng.gen_range(8..=64);
            let iterative = rng.gen_bool(0.5);
            let reuse = rng.gen_bool(0.5);
            let mut quality = 1.1 + (f64::from(run_threshold) - 32.0).abs() / 200.0;
            if reuse {
                quality -= 0.08;
            }
            RandomGenome {
                cells: [
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    run_threshold.to_string(),
                    flag(iterative),
                    flag(reuse),
                ],
                quality,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, Genome, Schema};

    fn generate(options: SynthOptions) -> String {
        let mut buf = Vec::new();
        write_rows(&mut buf, options).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_output_parses_as_rich_log() {
        let options = SynthOptions { steps: 5, population: 3, seed: 7 };
        let text = generate(options);
        let ds = Dataset::parse(&text).unwrap();
        assert_eq!(ds.schema(), Schema::Rich);
        assert_eq!(ds.len() as u64, options.rows());
        assert_eq!(ds.skipped_rows(), 0);
        assert_eq!(ds.ranges().max_step, 4);

        for r in ds.records() {
            match (&r.genome, r.algo) {
                (Genome::QuickSort(_), Algo::QuickSort) | (Genome::MergeSort(_), Algo::MergeSort) => {}
                other => panic!("genome does not match algorithm: {:?}", other),
            }
            assert_eq!(r.population_index.is_some(), r.opt == Optimizer::Genetic);
            assert_eq!(r.temperature.is_some(), r.opt == Optimizer::Annealing);
        }
    }

    #[test]
    fn test_seed_is_deterministic() {
        let options = SynthOptions { steps: 2, population: 2, seed: 42 };
        assert_eq!(generate(options), generate(options));
        assert_ne!(generate(options), generate(SynthOptions { seed: 43, ..options }));
    }

    #[test]
    fn test_fitness_improves_over_steps() {
        let text = generate(SynthOptions { steps: 20, population: 25, seed: 1 });
        let ds = Dataset::parse(&text).unwrap();
        let mean_at = |step: u32| {
            let v: Vec<f64> = ds.records().iter().filter(|r| r.step == step).map(|r| r.fitness_ms).collect();
            v.iter().sum::<f64>() / v.len() as f64
        };
        assert!(mean_at(19) < mean_at(0));
    }
}
