//! Experiment log ingestion
//!
//! Parses comma-delimited experiment logs into typed records and normalizes
//! comparisons, swaps and fitness against the dataset-wide ranges.
//!
//! Two layouts are understood:
//! - Rich: header carries `run_id,step,algo,opt,fitness_ms`, every other
//!   column is looked up by name and defaulted when absent
//! - Legacy: fixed positions `gen,pop_idx,pivot,scheme,cutoff,fitness,comparisons,swaps`

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Above this many records each step is drawn as a snapshot instead of a trail
pub const HEAVY_THRESHOLD: usize = 1_000_000;

/// Problem size assumed for legacy logs, which do not record it
pub const LEGACY_PROBLEM_SIZE: u64 = 100_000;

/// Columns that mark a header as the rich layout
const RICH_COLUMNS: [&str; 5] = ["run_id", "step", "algo", "opt", "fitness_ms"];

/// Rows shorter than this are malformed in either layout
const MIN_CELLS: usize = 4;

const COUNT_RANGE_FLOOR: f64 = 1.0;
const FITNESS_RANGE_FLOOR: f64 = 1e-9;

#[derive(Error, Debug, PartialEq)]
pub enum IngestError {
    #[error("input needs a header and at least one data row")]
    TooShort,
    #[error("no parseable rows ({skipped} skipped)")]
    NoRecords { skipped: usize },
}

/// Base sorting algorithm a record ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Algo {
    #[serde(rename = "QS")]
    QuickSort,
    #[serde(rename = "MS")]
    MergeSort,
}

impl Algo {
    pub const ALL: [Algo; 2] = [Algo::QuickSort, Algo::MergeSort];

    pub fn tag(self) -> &'static str {
        match self {
            Algo::QuickSort => "QS",
            Algo::MergeSort => "MS",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "" | "QS" => Some(Algo::QuickSort),
            "MS" => Some(Algo::MergeSort),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Search strategy that tuned the record's configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Optimizer {
    #[serde(rename = "GA")]
    Genetic,
    #[serde(rename = "SA")]
    Annealing,
}

impl Optimizer {
    pub const ALL: [Optimizer; 2] = [Optimizer::Genetic, Optimizer::Annealing];

    pub fn tag(self) -> &'static str {
        match self {
            Optimizer::Genetic => "GA",
            Optimizer::Annealing => "SA",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "" | "GA" => Some(Optimizer::Genetic),
            "SA" => Some(Optimizer::Annealing),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pivot {
    Unspecified,
    First,
    Last,
    Median3,
    Other(String),
}

impl Pivot {
    fn parse(cell: &str) -> Self {
        match cell.trim() {
            "" => Pivot::Unspecified,
            "First" => Pivot::First,
            "Last" => Pivot::Last,
            "Median3" => Pivot::Median3,
            other => Pivot::Other(other.to_string()),
        }
    }

    /// First/last element pivots degrade to quadratic depth on sorted input
    pub fn is_fixed_position(&self) -> bool {
        matches!(self, Pivot::First | Pivot::Last)
    }

    pub fn label(&self) -> &str {
        match self {
            Pivot::Unspecified => "",
            Pivot::First => "First",
            Pivot::Last => "Last",
            Pivot::Median3 => "Median3",
            Pivot::Other(s) => s,
        }
    }
}

/// Quick sort tunables. Empty cells map to `None`/`false`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuickSortGenome {
    pub pivot: Pivot,
    pub scheme: String,
    pub cutoff: Option<u32>,
    pub depth_cap: Option<u32>,
    pub tail_elimination: bool,
}

/// Merge sort tunables. Empty cells map to `None`/`false`.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSortGenome {
    pub run_threshold: Option<u32>,
    pub iterative: bool,
    pub reuse_buffer: bool,
}

/// Configuration bundle, resolved once per row by algorithm tag
#[derive(Debug, Clone, PartialEq)]
pub enum Genome {
    QuickSort(QuickSortGenome),
    MergeSort(MergeSortGenome),
}

/// Metrics rescaled to [0, 1] against the dataset ranges
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Normalized {
    pub comparisons: f64,
    pub swaps: f64,
    pub fitness: f64,
}

/// One experiment observation
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub step: u32,
    pub algo: Algo,
    pub opt: Optimizer,
    pub fitness_ms: f64,
    pub comparisons: u64,
    pub swaps: u64,
    pub n: u64,
    pub genome: Genome,
    pub run_id: Option<String>,
    pub population_index: Option<String>,
    pub temperature: Option<String>,
    pub norm: Normalized,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricRange {
    pub min: f64,
    pub max: f64,
}

impl MetricRange {
    fn empty() -> Self {
        Self { min: f64::INFINITY, max: f64::NEG_INFINITY }
    }

    fn include(&mut self, v: f64) {
        self.min = self.min.min(v);
        self.max = self.max.max(v);
    }

    fn normalize(&self, v: f64, floor: f64) -> f64 {
        let span = (self.max - self.min).max(floor);
        ((v - self.min) / span).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranges {
    pub comparisons: MetricRange,
    pub swaps: MetricRange,
    pub fitness: MetricRange,
    pub min_step: u32,
    pub max_step: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Schema {
    Rich,
    Legacy,
}

/// How a time cursor selects records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Every record up to and including the step (trail)
    Cumulative,
    /// Only records at exactly the step
    Snapshot,
}

impl FilterMode {
    pub fn for_len(len: usize) -> Self {
        if len > HEAVY_THRESHOLD {
            FilterMode::Snapshot
        } else {
            FilterMode::Cumulative
        }
    }

    pub fn includes(self, record_step: u32, step: u32) -> bool {
        match self {
            FilterMode::Cumulative => record_step <= step,
            FilterMode::Snapshot => record_step == step,
        }
    }
}

/// Active categorical filters; `None` means all
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filters {
    #[serde(default)]
    pub algo: Option<Algo>,
    #[serde(default)]
    pub opt: Option<Optimizer>,
}

impl Filters {
    pub fn matches(&self, record: &Record) -> bool {
        self.algo.map_or(true, |a| a == record.algo) && self.opt.map_or(true, |o| o == record.opt)
    }
}

/// A fully loaded, immutable experiment log
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<Record>,
    ranges: Ranges,
    schema: Schema,
    filter_mode: FilterMode,
    skipped_rows: usize,
}

impl Dataset {
    /// Parse a whole log. Malformed rows are skipped, never fatal.
    pub fn parse(text: &str) -> Result<Self, IngestError> {
        if text.lines().filter(|l| !l.trim().is_empty()).take(2).count() < 2 {
            return Err(IngestError::TooShort);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        let mut rows = reader.records();

        let header = match rows.next() {
            Some(Ok(row)) => row,
            _ => return Err(IngestError::TooShort),
        };
        let columns = Columns::from_header(&header);
        let schema = if columns.is_rich() { Schema::Rich } else { Schema::Legacy };

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for row in rows {
            let parsed = row.ok().and_then(|row| match schema {
                Schema::Rich => parse_rich_row(&row, &columns),
                Schema::Legacy => parse_legacy_row(&row),
            });
            match parsed {
                Some(r) => records.push(r),
                None => skipped += 1,
            }
        }

        if records.is_empty() {
            return Err(IngestError::NoRecords { skipped });
        }

        let dataset = Self::from_records(records, schema, skipped);
        tracing::debug!(
            "Parsed {:?} log: {} records, {} rows skipped, steps {}..={}, mode {:?}",
            schema,
            dataset.len(),
            skipped,
            dataset.ranges.min_step,
            dataset.ranges.max_step,
            dataset.filter_mode
        );
        Ok(dataset)
    }

    /// Compute ranges in one pass, then normalize in a second.
    /// `records` must be non-empty.
    fn from_records(mut records: Vec<Record>, schema: Schema, skipped_rows: usize) -> Self {
        let mut comparisons = MetricRange::empty();
        let mut swaps = MetricRange::empty();
        let mut fitness = MetricRange::empty();
        let mut min_step = u32::MAX;
        let mut max_step = 0u32;

        for r in &records {
            comparisons.include(r.comparisons as f64);
            swaps.include(r.swaps as f64);
            fitness.include(r.fitness_ms);
            min_step = min_step.min(r.step);
            max_step = max_step.max(r.step);
        }

        for r in &mut records {
            r.norm = Normalized {
                comparisons: comparisons.normalize(r.comparisons as f64, COUNT_RANGE_FLOOR),
                swaps: swaps.normalize(r.swaps as f64, COUNT_RANGE_FLOOR),
                fitness: fitness.normalize(r.fitness_ms, FITNESS_RANGE_FLOOR),
            };
        }

        let filter_mode = FilterMode::for_len(records.len());
        Self {
            records,
            ranges: Ranges { comparisons, swaps, fitness, min_step, max_step },
            schema,
            filter_mode,
            skipped_rows,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn ranges(&self) -> &Ranges {
        &self.ranges
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    pub fn filter_mode(&self) -> FilterMode {
        self.filter_mode
    }

    pub fn is_heavy(&self) -> bool {
        self.filter_mode == FilterMode::Snapshot
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    /// Number of whole steps spanned, at least 1
    pub fn step_span(&self) -> u32 {
        self.ranges.max_step - self.ranges.min_step + 1
    }

    #[cfg(test)]
    pub(crate) fn with_filter_mode(mut self, mode: FilterMode) -> Self {
        self.filter_mode = mode;
        self
    }
}

/// Header-name lookup for the rich layout
struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn from_header(header: &csv::StringRecord) -> Self {
        let index = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        Self { index }
    }

    fn is_rich(&self) -> bool {
        RICH_COLUMNS.iter().all(|c| self.index.contains_key(*c))
    }

    fn cell<'a>(&self, row: &'a csv::StringRecord, name: &str) -> &'a str {
        self.index.get(name).and_then(|&i| row.get(i)).unwrap_or("")
    }

    fn cell_any<'a>(&self, row: &'a csv::StringRecord, names: &[&str]) -> &'a str {
        names
            .iter()
            .find(|n| self.index.contains_key(**n))
            .map(|n| self.cell(row, n))
            .unwrap_or("")
    }
}

fn parse_rich_row(row: &csv::StringRecord, cols: &Columns) -> Option<Record> {
    if row.len() < MIN_CELLS {
        return None;
    }
    let step = parse_step(cols.cell(row, "step"))?;
    let algo = Algo::from_tag(cols.cell(row, "algo"))?;
    let opt = Optimizer::from_tag(cols.cell(row, "opt"))?;

    let genome = match algo {
        Algo::QuickSort => Genome::QuickSort(QuickSortGenome {
            pivot: Pivot::parse(cols.cell(row, "pivot")),
            scheme: cols.cell(row, "scheme").to_string(),
            cutoff: parse_optional_u32(cols.cell(row, "cutoff")),
            depth_cap: parse_optional_u32(cols.cell(row, "depth")),
            tail_elimination: parse_flag(cols.cell(row, "tail")),
        }),
        Algo::MergeSort => Genome::MergeSort(MergeSortGenome {
            run_threshold: parse_optional_u32(cols.cell(row, "run_threshold")),
            iterative: parse_flag(cols.cell(row, "iterative")),
            reuse_buffer: parse_flag(cols.cell(row, "reuse_buffer")),
        }),
    };

    Some(Record {
        step,
        algo,
        opt,
        fitness_ms: parse_metric(cols.cell(row, "fitness_ms")),
        comparisons: parse_count(cols.cell(row, "comparisons")),
        swaps: parse_count(cols.cell(row, "swaps")),
        n: parse_count(cols.cell(row, "n")),
        genome,
        run_id: non_empty(cols.cell(row, "run_id")),
        population_index: non_empty(cols.cell_any(row, &["ga_population_index", "pop_idx"])),
        temperature: non_empty(cols.cell_any(row, &["sa_temperature", "temp"])),
        norm: Normalized::default(),
    })
}

fn parse_legacy_row(row: &csv::StringRecord) -> Option<Record> {
    if row.len() < MIN_CELLS {
        return None;
    }
    let cell = |i: usize| row.get(i).unwrap_or("");
    let step = parse_step(cell(0))?;

    Some(Record {
        step,
        algo: Algo::QuickSort,
        opt: Optimizer::Genetic,
        fitness_ms: parse_metric(cell(5)),
        comparisons: parse_count(cell(6)),
        swaps: parse_count(cell(7)),
        n: LEGACY_PROBLEM_SIZE,
        genome: Genome::QuickSort(QuickSortGenome {
            pivot: Pivot::parse(cell(2)),
            scheme: cell(3).to_string(),
            cutoff: parse_optional_u32(cell(4)),
            depth_cap: None,
            tail_elimination: false,
        }),
        run_id: None,
        population_index: non_empty(cell(1)),
        temperature: None,
        norm: Normalized::default(),
    })
}

/// Empty step cells count as step 0; anything non-integral rejects the row
fn parse_step(cell: &str) -> Option<u32> {
    if cell.is_empty() {
        return Some(0);
    }
    cell.parse().ok()
}

fn parse_metric(cell: &str) -> f64 {
    cell.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

fn parse_count(cell: &str) -> u64 {
    cell.parse::<u64>().unwrap_or_else(|_| parse_metric(cell) as u64)
}

fn parse_optional_u32(cell: &str) -> Option<u32> {
    cell.parse().ok()
}

/// `1`, `true` and `yes` in any case are set
pub fn parse_flag(cell: &str) -> bool {
    matches!(cell.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn non_empty(cell: &str) -> Option<String> {
    (!cell.is_empty()).then(|| cell.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const RICH_HEADER: &str = "run_id,step,algo,opt,pivot,scheme,cutoff,depth,tail,run_threshold,iterative,reuse_buffer,fitness_ms,comparisons,swaps,n,trials_per_dist,dist_mask,pop_idx,temp";

    /// Rich-layout log from `(step, algo, opt, fitness, comparisons, swaps)` rows
    pub(crate) fn rich_log(rows: &[(u32, &str, &str, f64, u64, u64)]) -> String {
        let mut text = String::from(RICH_HEADER);
        for (step, algo, opt, fit, comp, swp) in rows {
            text.push_str(&format!(
                "\nrun1,{step},{algo},{opt},Median3,Hoare,16,32,1,,,,{fit},{comp},{swp},100000,3,7,0,"
            ));
        }
        text
    }

    #[test]
    fn test_header_only_is_too_short() {
        assert_eq!(Dataset::parse(RICH_HEADER).unwrap_err(), IngestError::TooShort);
        assert_eq!(Dataset::parse("").unwrap_err(), IngestError::TooShort);
        assert_eq!(Dataset::parse("\n\n\n").unwrap_err(), IngestError::TooShort);
    }

    #[test]
    fn test_rich_three_rows() {
        let text = rich_log(&[
            (0, "QS", "GA", 5.0, 100, 10),
            (0, "QS", "SA", 3.0, 200, 20),
            (1, "MS", "GA", 1.0, 300, 30),
        ]);
        let ds = Dataset::parse(&text).unwrap();
        assert_eq!(ds.schema(), Schema::Rich);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.ranges().min_step, 0);
        assert_eq!(ds.ranges().max_step, 1);
        assert_eq!(ds.filter_mode(), FilterMode::Cumulative);

        let r = &ds.records()[1];
        assert_eq!(r.algo, Algo::QuickSort);
        assert_eq!(r.opt, Optimizer::Annealing);
        assert_eq!(r.run_id.as_deref(), Some("run1"));
        assert_eq!(r.population_index.as_deref(), Some("0"));
        assert_eq!(r.temperature, None);
        match &r.genome {
            Genome::QuickSort(g) => {
                assert_eq!(g.pivot, Pivot::Median3);
                assert_eq!(g.scheme, "Hoare");
                assert_eq!(g.cutoff, Some(16));
                assert_eq!(g.depth_cap, Some(32));
                assert!(g.tail_elimination);
            }
            other => panic!("unexpected genome {:?}", other),
        }
        assert!(matches!(ds.records()[2].genome, Genome::MergeSort(_)));
    }

    #[test]
    fn test_legacy_row() {
        let text = "gen,idx,pivot,scheme,cutoff,fitness,comparisons,swaps\n0,1,First,Lomuto,10,12.5,100,50";
        let ds = Dataset::parse(text).unwrap();
        assert_eq!(ds.schema(), Schema::Legacy);
        assert_eq!(ds.len(), 1);
        let r = &ds.records()[0];
        assert_eq!(r.step, 0);
        assert_eq!(r.algo, Algo::QuickSort);
        assert_eq!(r.opt, Optimizer::Genetic);
        assert_eq!(r.fitness_ms, 12.5);
        assert_eq!(r.comparisons, 100);
        assert_eq!(r.swaps, 50);
        assert_eq!(r.n, LEGACY_PROBLEM_SIZE);
        assert_eq!(r.population_index.as_deref(), Some("1"));
        match &r.genome {
            Genome::QuickSort(g) => {
                assert_eq!(g.pivot, Pivot::First);
                assert_eq!(g.scheme, "Lomuto");
                assert_eq!(g.cutoff, Some(10));
            }
            other => panic!("unexpected genome {:?}", other),
        }
    }

    #[test]
    fn test_malformed_rows_skipped() {
        let mut text = rich_log(&[(0, "QS", "GA", 5.0, 1, 1), (2, "MS", "SA", 4.0, 2, 2)]);
        text.push_str("\nrun_id,step,algo,opt,fitness_ms");
        text.push_str("\nrun1,abc,QS,GA,,,,,,,,,1.0,1,1,1");
        text.push_str("\na,b");
        text.push_str("\nrun1,3,HS,GA,,,,,,,,,1.0,1,1,1");
        let ds = Dataset::parse(&text).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.skipped_rows(), 4);
    }

    #[test]
    fn test_only_malformed_rows() {
        let text = format!("{}\nrun1,x,QS,GA", RICH_HEADER);
        assert_eq!(Dataset::parse(&text).unwrap_err(), IngestError::NoRecords { skipped: 1 });
    }

    #[test]
    fn test_missing_columns_default() {
        let text = "run_id,step,algo,opt,fitness_ms\nr,4,,,2.5";
        let ds = Dataset::parse(text).unwrap();
        let r = &ds.records()[0];
        assert_eq!(r.step, 4);
        assert_eq!(r.algo, Algo::QuickSort);
        assert_eq!(r.opt, Optimizer::Genetic);
        assert_eq!(r.comparisons, 0);
        assert_eq!(r.n, 0);
        match &r.genome {
            Genome::QuickSort(g) => {
                assert_eq!(g.pivot, Pivot::Unspecified);
                assert_eq!(g.cutoff, None);
                assert!(!g.tail_elimination);
            }
            other => panic!("unexpected genome {:?}", other),
        }
    }

    #[test]
    fn test_normalized_bounds() {
        let text = rich_log(&[
            (0, "QS", "GA", 5.0, 100, 10),
            (1, "QS", "SA", 3.0, 250, 40),
            (2, "MS", "GA", 1.0, 400, 70),
        ]);
        let ds = Dataset::parse(&text).unwrap();
        for r in ds.records() {
            for v in [r.norm.comparisons, r.norm.swaps, r.norm.fitness] {
                assert!((0.0..=1.0).contains(&v));
            }
        }
        let first = &ds.records()[0].norm;
        let last = &ds.records()[2].norm;
        assert_eq!(first.comparisons, 0.0);
        assert_eq!(last.comparisons, 1.0);
        assert_eq!(first.swaps, 0.0);
        assert_eq!(last.swaps, 1.0);
        assert_eq!(first.fitness, 1.0);
        assert_eq!(last.fitness, 0.0);
        assert!((ds.records()[1].norm.comparisons - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_ranges_normalize_to_zero() {
        let ds = Dataset::parse(&rich_log(&[(3, "QS", "GA", 2.0, 7, 7)])).unwrap();
        let norm = ds.records()[0].norm;
        assert_eq!(norm, Normalized { comparisons: 0.0, swaps: 0.0, fitness: 0.0 });
        assert!(norm.fitness.is_finite());
        assert_eq!(ds.step_span(), 1);
    }

    #[test]
    fn test_reingest_is_identical() {
        let text = rich_log(&[(0, "QS", "GA", 5.0, 1, 9), (1, "MS", "SA", 0.5, 4, 2)]);
        let a = Dataset::parse(&text).unwrap();
        let b = Dataset::parse(&text).unwrap();
        assert_eq!(a.records(), b.records());
        assert_eq!(a.ranges(), b.ranges());
    }

    #[test]
    fn test_flags() {
        assert!(parse_flag("1"));
        assert!(parse_flag("true"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
        assert!(!parse_flag("false"));
    }

    #[test]
    fn test_filters_and_mode() {
        assert_eq!(FilterMode::for_len(HEAVY_THRESHOLD), FilterMode::Cumulative);
        assert_eq!(FilterMode::for_len(HEAVY_THRESHOLD + 1), FilterMode::Snapshot);
        assert!(FilterMode::Cumulative.includes(1, 3));
        assert!(!FilterMode::Snapshot.includes(1, 3));

        let ds = Dataset::parse(&rich_log(&[(0, "MS", "SA", 1.0, 1, 1)])).unwrap();
        let r = &ds.records()[0];
        assert!(Filters::default().matches(r));
        assert!(Filters { algo: Some(Algo::MergeSort), opt: None }.matches(r));
        assert!(!Filters { algo: None, opt: Some(Optimizer::Genetic) }.matches(r));
    }
}
