//! Screen projection and point colors
//!
//! Records are placed around the surface center by normalized comparisons (x)
//! and swaps (y). The offset shrinks as normalized fitness grows, so the
//! fastest configurations spread out and draw larger while slow ones
//! collapse toward the middle.

use egui::Color32;
use serde::{Deserialize, Serialize};

use crate::dataset::{Algo, Normalized, Record};
use crate::quantiles::QuantileTable;

/// Fitness attenuation strength
const SHRINK_K: f32 = 1.4;
const BASE_RADIUS: f32 = 3.2;
const MIN_RADIUS: f32 = 1.5;
const GLOW_PER_SCALE: f32 = 8.0;

pub const QUICK_SORT_COLOR: Color32 = Color32::from_rgb(0x3f, 0xa7, 0xff);
pub const MERGE_SORT_COLOR: Color32 = Color32::from_rgb(0xff, 0x8e, 0x3f);
pub const FAST_COLOR: Color32 = Color32::from_rgb(0x28, 0xa7, 0x45);
pub const MIDDLE_COLOR: Color32 = Color32::from_rgb(0xff, 0xeb, 0x3b);
pub const SLOW_COLOR: Color32 = Color32::from_rgb(0xf4, 0x43, 0x36);
pub const UNBANDED_COLOR: Color32 = Color32::from_rgb(0x7b, 0xc9, 0x6f);
pub const BACKGROUND_COLOR: Color32 = Color32::from_rgb(0x0b, 0x0f, 0x14);

/// A record placed on the surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projected {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// Shrink factor in (0, 1]; 1 for the best fitness
    pub scale: f32,
}

impl Projected {
    /// True when the whole bounding box lies outside `[0, w] x [0, h]`
    pub fn is_off_surface(&self, width: f32, height: f32) -> bool {
        self.x + self.radius < 0.0
            || self.x - self.radius > width
            || self.y + self.radius < 0.0
            || self.y - self.radius > height
    }

    pub fn glow(&self) -> f32 {
        (GLOW_PER_SCALE * self.scale).max(0.0)
    }
}

pub fn project(norm: &Normalized, width: f32, height: f32) -> Projected {
    let scale = 1.0 / (1.0 + SHRINK_K * norm.fitness as f32);
    let dx = (norm.comparisons as f32 - 0.5) * width;
    let dy = (norm.swaps as f32 - 0.5) * height;
    Projected {
        x: width / 2.0 + dx * scale,
        y: height / 2.0 + dy * scale,
        radius: (BASE_RADIUS * scale).max(MIN_RADIUS),
        scale,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorMode {
    /// Green/yellow/red against the step's quartile band
    #[default]
    FitnessQuantile,
    /// Fixed color per sorting algorithm
    Algorithm,
}

impl ColorMode {
    pub const ALL: [ColorMode; 2] = [ColorMode::FitnessQuantile, ColorMode::Algorithm];

    pub fn label(self) -> &'static str {
        match self {
            ColorMode::FitnessQuantile => "Fitness quantile",
            ColorMode::Algorithm => "Algorithm",
        }
    }
}

pub fn point_color(record: &Record, mode: ColorMode, quantiles: &QuantileTable) -> Color32 {
    match mode {
        ColorMode::Algorithm => match record.algo {
            Algo::QuickSort => QUICK_SORT_COLOR,
            Algo::MergeSort => MERGE_SORT_COLOR,
        },
        ColorMode::FitnessQuantile => match quantiles.get(record.step) {
            None => UNBANDED_COLOR,
            Some(q) if record.fitness_ms <= q.q25 => FAST_COLOR,
            Some(q) if record.fitness_ms <= q.q75 => MIDDLE_COLOR,
            Some(_) => SLOW_COLOR,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::rich_log;
    use crate::dataset::Dataset;

    fn norm(comparisons: f64, swaps: f64, fitness: f64) -> Normalized {
        Normalized { comparisons, swaps, fitness }
    }

    #[test]
    fn test_center_and_extremes() {
        let p = project(&norm(0.5, 0.5, 0.3), 800.0, 600.0);
        assert_eq!((p.x, p.y), (400.0, 300.0));

        let best = project(&norm(1.0, 0.0, 0.0), 800.0, 600.0);
        assert_eq!(best.scale, 1.0);
        assert_eq!((best.x, best.y), (800.0, 0.0));
        assert_eq!(best.radius, BASE_RADIUS);
    }

    #[test]
    fn test_worse_fitness_pulls_inward_and_shrinks() {
        let good = project(&norm(1.0, 1.0, 0.0), 800.0, 600.0);
        let bad = project(&norm(1.0, 1.0, 1.0), 800.0, 600.0);
        assert!(bad.x < good.x && bad.y < good.y);
        assert!(bad.radius < good.radius);
        assert!((bad.scale - 1.0 / 2.4).abs() < 1e-6);
        assert_eq!(bad.radius, MIN_RADIUS.max(BASE_RADIUS / 2.4));
        assert!(bad.glow() < good.glow());
    }

    #[test]
    fn test_off_surface() {
        let p = Projected { x: -5.0, y: 10.0, radius: 2.0, scale: 1.0 };
        assert!(p.is_off_surface(100.0, 100.0));
        let edge = Projected { x: -1.0, y: 10.0, radius: 2.0, scale: 1.0 };
        assert!(!edge.is_off_surface(100.0, 100.0));
    }

    #[test]
    fn test_quantile_colors() {
        let rows: Vec<_> = [1.0, 2.0, 3.0, 4.0, 5.0]
            .iter()
            .map(|&f| (0u32, "QS", "GA", f, 1u64, 1u64))
            .collect();
        let ds = Dataset::parse(&rich_log(&rows)).unwrap();
        let table = QuantileTable::build(ds.records());
        // q25 = 2, q75 = 4
        let colors: Vec<_> = ds
            .records()
            .iter()
            .map(|r| point_color(r, ColorMode::FitnessQuantile, &table))
            .collect();
        assert_eq!(colors, vec![FAST_COLOR, FAST_COLOR, MIDDLE_COLOR, MIDDLE_COLOR, SLOW_COLOR]);

        let empty = QuantileTable::default();
        assert_eq!(point_color(&ds.records()[0], ColorMode::FitnessQuantile, &empty), UNBANDED_COLOR);
    }

    #[test]
    fn test_algorithm_colors() {
        let ds = Dataset::parse(&rich_log(&[(0, "QS", "GA", 1.0, 1, 1), (0, "MS", "GA", 1.0, 1, 1)])).unwrap();
        let table = QuantileTable::build(ds.records());
        assert_eq!(point_color(&ds.records()[0], ColorMode::Algorithm, &table), QUICK_SORT_COLOR);
        assert_eq!(point_color(&ds.records()[1], ColorMode::Algorithm, &table), MERGE_SORT_COLOR);
    }
}
