//! Viewer controller - owns the loaded dataset and every piece of frame state
//!
//! Front ends (the egui app, the headless CLI commands) drive it through
//! `load_text`, the playback methods, `advance` and `render`, and read the
//! resulting text back from `panel`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::dataset::{Algo, Dataset, Filters, IngestError, Optimizer, Record};
use crate::describe::{describe_record, estimate_space, format_best, group_thousands, NO_DATA};
use crate::leaderboard::Leaderboard;
use crate::playback::Playback;
use crate::projection::{project, ColorMode};
use crate::quantiles::{best_by_step, QuantileTable};
use crate::render::{Frame, FrameRequest, RenderState, RevealMode, Surface};

/// Clicks farther than this from every point select nothing
const PICK_RADIUS: f32 = 15.0;

/// Control-surface values read every frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub filters: Filters,
    pub reveal: RevealMode,
    pub color_mode: ColorMode,
    /// Steps per second while playing
    pub speed: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            filters: Filters::default(),
            reveal: RevealMode::default(),
            color_mode: ColorMode::default(),
            speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardText {
    pub quick_sort: String,
    pub merge_sort: String,
    pub genetic: String,
    pub annealing: String,
}

impl Default for LeaderboardText {
    fn default() -> Self {
        Self {
            quick_sort: NO_DATA.to_string(),
            merge_sort: NO_DATA.to_string(),
            genetic: NO_DATA.to_string(),
            annealing: NO_DATA.to_string(),
        }
    }
}

/// Text the presentation layer shows next to the canvas
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Panel {
    pub step: String,
    pub visible: String,
    pub best_fitness: String,
    pub best_record: String,
    pub space: String,
    pub leaderboard: LeaderboardText,
}

impl Default for Panel {
    fn default() -> Self {
        Self {
            step: "0 / 0".to_string(),
            visible: "0".to_string(),
            best_fitness: NO_DATA.to_string(),
            best_record: String::new(),
            space: String::new(),
            leaderboard: LeaderboardText::default(),
        }
    }
}

/// A dataset plus everything derived from it once per load
struct Loaded {
    dataset: Dataset,
    quantiles: QuantileTable,
    best_series: Vec<(u32, f64)>,
}

pub struct Viewer {
    loaded: Option<Loaded>,
    playback: Playback,
    render: RenderState,
    leaderboard: Leaderboard,
    pub settings: Settings,
    panel: Panel,
    last_frame: Option<Frame>,
}

impl Viewer {
    pub fn new(settings: Settings) -> Self {
        Self {
            loaded: None,
            playback: Playback::new(0, 0),
            render: RenderState::default(),
            leaderboard: Leaderboard::default(),
            settings,
            panel: Panel::default(),
            last_frame: None,
        }
    }

    /// Replace the dataset wholesale. On error the previous dataset stays.
    pub fn load_text(&mut self, text: &str) -> Result<&Dataset, IngestError> {
        let dataset = Dataset::parse(text)?;
        let quantiles = QuantileTable::build(dataset.records());
        let best_series = best_by_step(dataset.records());
        let ranges = *dataset.ranges();

        tracing::info!(
            "Dataset loaded: {} records, steps {}..={}, {} quantile bands, heavy={}",
            dataset.len(),
            ranges.min_step,
            ranges.max_step,
            quantiles.len(),
            dataset.is_heavy()
        );

        self.playback = Playback::new(ranges.min_step, ranges.max_step);
        self.render.invalidate();
        self.leaderboard.invalidate();
        self.panel = Panel::default();
        self.last_frame = None;
        let loaded = self.loaded.insert(Loaded { dataset, quantiles, best_series });
        Ok(&loaded.dataset)
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.loaded.as_ref().map(|l| &l.dataset)
    }

    pub fn best_series(&self) -> &[(u32, f64)] {
        self.loaded.as_ref().map_or(&[][..], |l| l.best_series.as_slice())
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn toggle_play(&mut self) {
        self.playback.toggle();
    }

    pub fn reset(&mut self) {
        self.playback.reset();
    }

    pub fn step_back(&mut self) {
        self.playback.step_back();
    }

    pub fn step_forward(&mut self) {
        self.playback.step_forward();
    }

    pub fn seek(&mut self, step: u32) {
        self.playback.seek(step);
    }

    /// One scheduling tick of wall-clock time
    pub fn advance(&mut self, elapsed: Duration) {
        self.playback.tick(elapsed, self.settings.speed);
    }

    /// Draw one frame and refresh the panel. `None` until a dataset is loaded.
    pub fn render<S: Surface>(&mut self, surface: &mut S) -> Option<&Frame> {
        let loaded = self.loaded.as_ref()?;
        let request = FrameRequest {
            step: self.playback.step(),
            filters: self.settings.filters,
            reveal: self.settings.reveal,
            color_mode: self.settings.color_mode,
        };
        let frame = self.render.render(&loaded.dataset, &loaded.quantiles, request, surface);

        let dataset = &loaded.dataset;
        let ranges = dataset.ranges();
        let current = (frame.step.saturating_sub(ranges.min_step) + 1).max(1);
        self.panel.step = format!("{} / {}", current, dataset.step_span());
        self.panel.visible = group_thousands(frame.visible as u64);
        let best = frame.best.map(|i| &dataset.records()[i]);
        self.panel.best_fitness = format_best(best.map(|r| r.fitness_ms));
        if let Some(r) = best {
            self.panel.best_record = describe_record(r);
            self.panel.space = estimate_space(r);
        }

        if self.leaderboard.refresh(dataset, frame.step, request.filters) {
            let s = self.leaderboard.standings();
            self.panel.leaderboard = LeaderboardText {
                quick_sort: format_best(s.algo(Algo::QuickSort)),
                merge_sort: format_best(s.algo(Algo::MergeSort)),
                genetic: format_best(s.opt(Optimizer::Genetic)),
                annealing: format_best(s.opt(Optimizer::Annealing)),
            };
        }

        self.last_frame = Some(frame);
        self.last_frame.as_ref()
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    /// Record drawn nearest to `(x, y)` on a `width x height` surface, within 15 px.
    /// Considers every record up to the current step that passes the filters.
    pub fn pick(&self, x: f32, y: f32, width: f32, height: f32) -> Option<&Record> {
        let dataset = self.dataset()?;
        let step = self.playback.step();
        let filters = self.settings.filters;
        dataset
            .records()
            .iter()
            .filter(|r| r.step <= step && filters.matches(r))
            .map(|r| {
                let p = project(&r.norm, width, height);
                let d2 = (p.x - x).powi(2) + (p.y - y).powi(2);
                (r, d2)
            })
            .filter(|(_, d2)| *d2 < PICK_RADIUS * PICK_RADIUS)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(r, _)| r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::rich_log;
    use crate::render::tests::Recorder;

    fn scenario_text() -> String {
        rich_log(&[
            (0, "QS", "GA", 5.0, 100, 10),
            (0, "QS", "SA", 3.0, 200, 20),
            (1, "MS", "GA", 1.0, 300, 30),
        ])
    }

    fn off() -> Settings {
        Settings { reveal: RevealMode::Off, ..Settings::default() }
    }

    #[test]
    fn test_scenario_at_step_zero() {
        let mut viewer = Viewer::new(off());
        viewer.load_text(&scenario_text()).unwrap();
        let frame = viewer.render(&mut Recorder::new(800.0, 600.0)).cloned().unwrap();
        assert_eq!(frame.visible, 2);

        let panel = viewer.panel();
        assert_eq!(panel.step, "1 / 2");
        assert_eq!(panel.visible, "2");
        assert_eq!(panel.best_fitness, "3.000 ms");
        assert_eq!(panel.leaderboard.quick_sort, "3.000 ms");
        assert_eq!(panel.leaderboard.merge_sort, NO_DATA);
        assert!(panel.best_record.starts_with("Algo: QS | Opt: SA"));
        assert!(panel.space.starts_with("O(log n) stack"));
    }

    #[test]
    fn test_load_resets_playback() {
        let mut viewer = Viewer::new(off());
        viewer.load_text(&scenario_text()).unwrap();
        viewer.toggle_play();
        viewer.advance(Duration::from_millis(100));
        viewer.step_forward();
        assert_eq!(viewer.playback().step(), 1);

        viewer.load_text(&scenario_text()).unwrap();
        assert_eq!(viewer.playback().cursor(), 0.0);
        assert!(!viewer.playback().is_playing());
        assert_eq!(viewer.panel(), &Panel::default());
    }

    #[test]
    fn test_reload_smaller_log_drops_cached_indices() {
        let mut viewer = Viewer::new(off());
        viewer.load_text(&scenario_text()).unwrap();
        viewer.seek(1);
        let frame = viewer.render(&mut Recorder::new(800.0, 600.0)).cloned().unwrap();
        assert_eq!(frame.visible, 3);

        viewer.load_text(&rich_log(&[(0, "MS", "SA", 2.0, 10, 1)])).unwrap();
        let frame = viewer.render(&mut Recorder::new(800.0, 600.0)).cloned().unwrap();
        assert_eq!(frame.visible, 1);
        assert_eq!(frame.drawn, 1);
        assert_eq!(viewer.panel().best_fitness, "2.000 ms");
    }

    #[test]
    fn test_failed_load_keeps_previous_dataset() {
        let mut viewer = Viewer::new(off());
        viewer.load_text(&scenario_text()).unwrap();
        viewer.seek(1);
        assert_eq!(viewer.load_text("run_id,step\n").unwrap_err(), IngestError::TooShort);
        assert_eq!(viewer.dataset().map(Dataset::len), Some(3));
        assert_eq!(viewer.playback().step(), 1);
    }

    #[test]
    fn test_render_without_data() {
        let mut viewer = Viewer::new(Settings::default());
        assert!(viewer.render(&mut Recorder::new(10.0, 10.0)).is_none());
        assert!(viewer.best_series().is_empty());
    }

    #[test]
    fn test_filter_change_refreshes_leaderboard() {
        let mut viewer = Viewer::new(off());
        viewer.load_text(&scenario_text()).unwrap();
        viewer.seek(1);
        viewer.render(&mut Recorder::new(800.0, 600.0));
        assert_eq!(viewer.panel().leaderboard.genetic, "1.000 ms");

        viewer.settings.filters.algo = Some(Algo::QuickSort);
        viewer.render(&mut Recorder::new(800.0, 600.0));
        assert_eq!(viewer.panel().leaderboard.genetic, "5.000 ms");
        assert_eq!(viewer.panel().leaderboard.merge_sort, NO_DATA);
    }

    #[test]
    fn test_pick_nearest() {
        let mut viewer = Viewer::new(off());
        viewer.load_text(&scenario_text()).unwrap();
        // second record normalizes to the center
        let r = viewer.pick(402.0, 298.0, 800.0, 600.0).unwrap();
        assert_eq!(r.fitness_ms, 3.0);
        assert!(viewer.pick(10.0, 590.0, 800.0, 600.0).is_none());
    }
}
