//! Per-frame render pipeline
//!
//! Order within a frame:
//! 1. Filter by step and categorical filters (cached on `(step, filters)`)
//! 2. Reveal-mode reduction
//! 3. Best record scan
//! 4. Sort by normalized fitness when large, so colors and glows batch
//! 5. Draw up to `min(50_000, area / 100, len)` points, skipping ones that
//!    fall off the surface or into an already occupied dedup cell

use egui::Color32;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::dataset::{Algo, Dataset, Filters, Optimizer, Record};
use crate::projection::{point_color, project, ColorMode};
use crate::quantiles::QuantileTable;

/// Upper bound on draw calls per frame
const MAX_DRAWS: usize = 50_000;
/// Surface pixels budgeted per drawn point
const PIXELS_PER_DRAW: f32 = 100.0;
/// Dedup cells are `1 / DEDUP_SCALE` pixels wide
const DEDUP_SCALE: f32 = 0.75;
/// Sets larger than this are drawn in fitness order
const SORT_THRESHOLD: usize = 100;
/// Top-N reveal keeps this many records
pub const TOP_N: usize = 1000;
/// Progressive reveal cap at the end of the step span
const PROGRESSIVE_CEILING: f64 = 100_000.0;
const PROGRESSIVE_FLOOR: usize = 2;
const COLOR_CACHE_LIMIT: usize = 10_000;

/// Where points end up: the egui canvas, a PNG raster, or a test double
pub trait Surface {
    fn size(&self) -> (f32, f32);

    fn fill_circle(&mut self, center: [f32; 2], radius: f32, color: Color32, glow: f32);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevealMode {
    /// First-N cap growing from 2 with the cursor's progress through the steps
    #[default]
    Progressive,
    /// The 1000 lowest-fitness records
    TopN,
    Off,
}

impl RevealMode {
    pub const ALL: [RevealMode; 3] = [RevealMode::Progressive, RevealMode::TopN, RevealMode::Off];

    pub fn label(self) -> &'static str {
        match self {
            RevealMode::Progressive => "Progressive",
            RevealMode::TopN => "Top 1000",
            RevealMode::Off => "Off",
        }
    }
}

/// Inputs read from the control surface each frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRequest {
    pub step: u32,
    pub filters: Filters,
    pub reveal: RevealMode,
    pub color_mode: ColorMode,
}

/// What one frame produced
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub step: u32,
    /// Records left after filtering and reduction
    pub visible: usize,
    pub drawn: usize,
    /// Index into the dataset's records
    pub best: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CacheKey {
    step: u32,
    filters: Filters,
}

/// Filtered record indices for one `(step, filters)` key
#[derive(Debug, Default)]
struct RenderCache {
    key: Option<CacheKey>,
    indices: Vec<usize>,
}

impl RenderCache {
    fn get_or_filter(&mut self, dataset: &Dataset, key: CacheKey) -> &[usize] {
        if self.key != Some(key) {
            let mode = dataset.filter_mode();
            self.indices.clear();
            self.indices.extend(
                dataset
                    .records()
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| mode.includes(r.step, key.step) && key.filters.matches(r))
                    .map(|(i, _)| i),
            );
            self.key = Some(key);
            tracing::debug!(
                "Render cache rebuilt: step {} {:?} → {} records",
                key.step,
                key.filters,
                self.indices.len()
            );
        }
        &self.indices
    }

    fn invalidate(&mut self) {
        self.key = None;
        self.indices.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ColorKey {
    algo: Algo,
    opt: Optimizer,
    step: u32,
    fitness_bits: u64,
}

impl ColorKey {
    fn of(r: &Record) -> Self {
        Self { algo: r.algo, opt: r.opt, step: r.step, fitness_bits: r.fitness_ms.to_bits() }
    }
}

/// Mutable per-frame state, owned by the viewer
#[derive(Debug, Default)]
pub struct RenderState {
    cache: RenderCache,
    colors: HashMap<ColorKey, Color32>,
    seen: HashSet<u64>,
    scratch: Vec<usize>,
    surface_size: Option<(f32, f32)>,
    color_mode: Option<ColorMode>,
}

impl RenderState {
    /// Drop everything derived from the dataset (new load, resize)
    pub fn invalidate(&mut self) {
        self.cache.invalidate();
        self.colors.clear();
    }

    /// Colors depend on the color mode; positions do not
    fn invalidate_colors(&mut self) {
        self.colors.clear();
    }

    pub fn render<S: Surface>(
        &mut self,
        dataset: &Dataset,
        quantiles: &QuantileTable,
        request: FrameRequest,
        surface: &mut S,
    ) -> Frame {
        let FrameRequest { step, filters, reveal, color_mode } = request;
        let (width, height) = surface.size();
        if self.surface_size != Some((width, height)) {
            if self.surface_size.is_some() {
                tracing::debug!("Surface resized to {}x{}", width, height);
            }
            self.invalidate();
            self.surface_size = Some((width, height));
        }
        if self.color_mode != Some(color_mode) {
            self.invalidate_colors();
            self.color_mode = Some(color_mode);
        }

        let records = dataset.records();
        let filtered = self.cache.get_or_filter(dataset, CacheKey { step, filters });
        self.scratch.clear();
        self.scratch.extend_from_slice(filtered);

        reduce(&mut self.scratch, records, dataset, step, reveal);

        let best = self
            .scratch
            .iter()
            .copied()
            .min_by(|&a, &b| records[a].fitness_ms.total_cmp(&records[b].fitness_ms));

        if self.scratch.len() > SORT_THRESHOLD {
            self.scratch
                .sort_by(|&a, &b| records[a].norm.fitness.total_cmp(&records[b].norm.fitness));
        }

        let cap = draw_cap(width, height, self.scratch.len());
        self.seen.clear();
        let mut drawn = 0;
        for &i in &self.scratch {
            if drawn >= cap {
                break;
            }
            let r = &records[i];
            let p = project(&r.norm, width, height);
            if p.is_off_surface(width, height) {
                continue;
            }
            if !self.seen.insert(dedup_cell(p.x, p.y)) {
                continue;
            }
            let color = *self
                .colors
                .entry(ColorKey::of(r))
                .or_insert_with(|| point_color(r, color_mode, quantiles));
            surface.fill_circle([p.x, p.y], p.radius, color, p.glow());
            drawn += 1;
        }

        if self.colors.len() > COLOR_CACHE_LIMIT {
            self.colors.clear();
        }

        Frame { step, visible: self.scratch.len(), drawn, best }
    }
}

/// Apply the reveal mode to `indices` in place
fn reduce(indices: &mut Vec<usize>, records: &[Record], dataset: &Dataset, step: u32, reveal: RevealMode) {
    match reveal {
        RevealMode::Progressive => {
            let min_step = dataset.ranges().min_step;
            let progress = f64::from(step.saturating_sub(min_step)) / f64::from(dataset.step_span());
            let target = ((PROGRESSIVE_FLOOR as f64 + progress * PROGRESSIVE_CEILING).floor() as usize)
                .max(PROGRESSIVE_FLOOR);
            indices.truncate(target);
        }
        RevealMode::TopN => {
            if indices.len() > TOP_N {
                indices.sort_by(|&a, &b| records[a].fitness_ms.total_cmp(&records[b].fitness_ms));
                indices.truncate(TOP_N);
            }
        }
        RevealMode::Off => {}
    }
}

pub fn draw_cap(width: f32, height: f32, len: usize) -> usize {
    let by_area = ((width * height) / PIXELS_PER_DRAW).floor().max(0.0) as usize;
    MAX_DRAWS.min(by_area).min(len)
}

/// Grid cell id for a screen position, both coordinates truncated toward zero
fn dedup_cell(x: f32, y: f32) -> u64 {
    let gx = (x * DEDUP_SCALE) as i32;
    let gy = (y * DEDUP_SCALE) as i32;
    (u64::from(gx as u32) << 32) | u64::from(gy as u32)
}
