//! Text for the output panel: configuration summaries, space estimates, numbers

use crate::dataset::{Genome, Record, LEGACY_PROBLEM_SIZE};

/// Shown where a value has no data behind it
pub const NO_DATA: &str = "—";

/// Rough memory footprint implied by a record's configuration.
/// Descriptive only; nothing is measured.
pub fn estimate_space(record: &Record) -> String {
    match &record.genome {
        Genome::QuickSort(g) => {
            let n = if record.n == 0 { LEGACY_PROBLEM_SIZE } else { record.n };
            let log_n = (n as f64).log2().floor().max(1.0) as u32;
            let depth = match g.depth_cap {
                Some(cap) if cap > 0 => cap.min(log_n),
                _ => log_n,
            };
            let tail = if g.tail_elimination { ", tail-elim" } else { "" };
            let worst = if g.pivot.is_fixed_position() {
                "worst O(n) if adversarial"
            } else {
                "balanced pivots typical"
            };
            format!("O(log n) stack (~{}){}; {}", depth, tail, worst)
        }
        Genome::MergeSort(g) => {
            let mut out = String::from("O(n) buffer");
            if g.iterative {
                out.push_str(", iterative");
            }
            if g.reuse_buffer {
                out.push_str(", reuse buffer");
            }
            out
        }
    }
}

/// Multi-line summary of a record and its configuration
pub fn describe_record(record: &Record) -> String {
    let tunables = match &record.genome {
        Genome::QuickSort(g) => format!(
            "Pivot={}  Scheme={}  Cutoff={}  Depth={}  Tail={}",
            g.pivot.label(),
            g.scheme,
            opt_num(g.cutoff),
            opt_num(g.depth_cap),
            g.tail_elimination
        ),
        Genome::MergeSort(g) => format!(
            "RunThresh={}  Iterative={}  ReuseBuf={}",
            opt_num(g.run_threshold),
            g.iterative,
            g.reuse_buffer
        ),
    };
    [
        format!("Algo: {} | Opt: {}", record.algo.tag(), record.opt.tag()),
        format!("Fitness: {}  |  n={}", format_ms(record.fitness_ms), record.n),
        format!(
            "Comparisons: {} | Swaps: {}",
            group_thousands(record.comparisons),
            group_thousands(record.swaps)
        ),
        tunables,
    ]
    .join("\n")
}

pub fn format_ms(ms: f64) -> String {
    format!("{:.3} ms", ms)
}

pub fn format_best(best: Option<f64>) -> String {
    best.map(format_ms).unwrap_or_else(|| NO_DATA.to_string())
}

/// `1234567` → `1,234,567`
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn opt_num(v: Option<u32>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}
