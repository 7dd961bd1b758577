//! Native GUI viewer using egui
//!
//! Control panel on the left, scatter canvas in the middle. Loads run on the
//! tokio runtime and come back through a channel polled once per frame.

use eframe::egui;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Instant;
use tracing::{info, warn};

use crate::config::{Env, ViewerConfig, ViewerState};
use crate::dataset::{Algo, FilterMode, Optimizer, Record};
use crate::describe::{describe_record, estimate_space};
use crate::projection::{ColorMode, BACKGROUND_COLOR};
use crate::render::{RevealMode, Surface};
use crate::source::{fetch_first, fetch_text, pasted_source, LoadError, SourceRef};
use crate::viewer::Viewer;

/// Run the native GUI viewer
pub fn run_viewer(config: ViewerConfig, env: Env, initial: Option<SourceRef>) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| anyhow::anyhow!("GUI needs a tokio runtime: {}", e))?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window.width, config.window.height])
            .with_title("Sort Evolution Viewer"),
        ..Default::default()
    };

    eframe::run_native(
        "Sort Evolution Viewer",
        options,
        Box::new(move |cc| Ok(Box::new(ViewerApp::new(cc, config, env, runtime, initial)))),
    )
    .map_err(|e| anyhow::anyhow!("GUI error: {}", e))
}

/// Result of a background load
enum LoadOutcome {
    Loaded { source: SourceRef, text: String },
    Failed(LoadError),
}

/// Draws onto the canvas rect; surface coordinates start at the rect's corner
struct EguiSurface<'a> {
    painter: &'a egui::Painter,
    rect: egui::Rect,
}

impl Surface for EguiSurface<'_> {
    fn size(&self) -> (f32, f32) {
        (self.rect.width(), self.rect.height())
    }

    fn fill_circle(&mut self, center: [f32; 2], radius: f32, color: egui::Color32, glow: f32) {
        let pos = self.rect.min + egui::vec2(center[0], center[1]);
        if glow > 0.0 {
            self.painter.circle_filled(pos, radius + glow * 0.5, color.gamma_multiply(0.15));
        }
        self.painter.circle_filled(pos, radius, color);
    }
}

struct ViewerApp {
    viewer: Viewer,
    demo_candidates: Vec<String>,
    state: ViewerState,
    state_file: PathBuf,
    // Background loading
    runtime: tokio::runtime::Handle,
    tx: Sender<LoadOutcome>,
    rx: Receiver<LoadOutcome>,
    loading: bool,
    // UI state
    source_text: String,
    current_source: Option<SourceRef>,
    selected: Option<Record>,
    alert: Option<String>,
    last_tick: Instant,
    show_series: bool,
}

impl ViewerApp {
    fn new(
        cc: &eframe::CreationContext<'_>,
        config: ViewerConfig,
        env: Env,
        runtime: tokio::runtime::Handle,
        initial: Option<SourceRef>,
    ) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        let state = ViewerState::load(&env.state_file);
        let (tx, rx) = channel();
        let mut app = Self {
            viewer: Viewer::new(config.defaults),
            demo_candidates: config.demo_candidates,
            state,
            state_file: env.state_file,
            runtime,
            tx,
            rx,
            loading: false,
            source_text: String::new(),
            current_source: None,
            selected: None,
            alert: None,
            last_tick: Instant::now(),
            show_series: true,
        };

        // Explicit source, then the last one used, then the demo list
        let startup = initial.or_else(|| app.state.last_source.as_deref().map(SourceRef::parse));
        match startup {
            Some(source) => {
                app.source_text = source.to_string();
                app.start_load(&cc.egui_ctx, source);
            }
            None => app.start_demo(&cc.egui_ctx),
        }
        app
    }

    fn start_load(&mut self, ctx: &egui::Context, source: SourceRef) {
        info!("Queued load of {}", source);
        self.loading = true;
        let tx = self.tx.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let outcome = match fetch_text(&source).await {
                Ok(text) => LoadOutcome::Loaded { source, text },
                Err(e) => LoadOutcome::Failed(e),
            };
            if tx.send(outcome).is_ok() {
                ctx.request_repaint();
            }
        });
    }

    fn start_demo(&mut self, ctx: &egui::Context) {
        info!("Looking for a demo log among {} candidates", self.demo_candidates.len());
        self.loading = true;
        let candidates = self.demo_candidates.clone();
        let tx = self.tx.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let outcome = match fetch_first(&candidates).await {
                Ok((source, text)) => LoadOutcome::Loaded { source, text },
                Err(e) => LoadOutcome::Failed(e),
            };
            if tx.send(outcome).is_ok() {
                ctx.request_repaint();
            }
        });
    }

    /// Apply finished loads. Never blocks.
    fn poll_loads(&mut self) {
        while let Ok(outcome) = self.rx.try_recv() {
            self.loading = false;
            let result = match outcome {
                LoadOutcome::Loaded { source, text } => self
                    .viewer
                    .load_text(&text)
                    .map(|_| source)
                    .map_err(LoadError::from),
                LoadOutcome::Failed(e) => Err(e),
            };
            match result {
                Ok(source) => {
                    self.source_text = source.to_string();
                    self.state.last_source = Some(source.to_string());
                    self.state.save(&self.state_file);
                    self.current_source = Some(source);
                    self.selected = None;
                    self.alert = None;
                    self.last_tick = Instant::now();
                }
                Err(e) => {
                    warn!("Load failed: {}", e);
                    self.alert = Some(e.to_string());
                }
            }
        }
    }

    fn handle_input(&mut self, ctx: &egui::Context) {
        let pasted = ctx.input(|i| {
            i.events.iter().find_map(|e| match e {
                egui::Event::Paste(text) => pasted_source(text),
                _ => None,
            })
        });
        if let Some(source) = pasted {
            self.source_text = source.to_string();
            self.start_load(ctx, source);
        }

        // Keyboard shortcuts only when no text field has focus
        if ctx.memory(|m| m.focused().is_some()) {
            return;
        }
        ctx.input(|i| {
            if i.key_pressed(egui::Key::Space) {
                self.viewer.toggle_play();
            }
            if i.key_pressed(egui::Key::ArrowLeft) {
                self.viewer.step_back();
            }
            if i.key_pressed(egui::Key::ArrowRight) {
                self.viewer.step_forward();
            }
            if i.key_pressed(egui::Key::Home) {
                self.viewer.reset();
            }
        });
    }

    fn controls_ui(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.heading("Sort Evolution");
        ui.separator();

        // Source
        ui.label("CSV path or URL:");
        ui.text_edit_singleline(&mut self.source_text);
        ui.horizontal(|ui| {
            let can_load = !self.loading && !self.source_text.trim().is_empty();
            if ui.add_enabled(can_load, egui::Button::new("Load")).clicked() {
                let source = SourceRef::parse(&self.source_text);
                self.start_load(ctx, source);
            }
            if ui.add_enabled(!self.loading, egui::Button::new("Demo")).clicked() {
                self.start_demo(ctx);
            }
            if self.loading {
                ui.spinner();
            }
        });

        ui.separator();

        // Playback
        ui.horizontal(|ui| {
            let label = if self.viewer.playback().is_playing() { "⏸ Pause" } else { "▶ Play" };
            if ui.button(label).clicked() {
                self.viewer.toggle_play();
            }
            if ui.button("⏮ Reset").clicked() {
                self.viewer.reset();
            }
            if ui.button("◀").clicked() {
                self.viewer.step_back();
            }
            if ui.button("▶").clicked() {
                self.viewer.step_forward();
            }
        });
        ui.add(
            egui::Slider::new(&mut self.viewer.settings.speed, 0.1..=50.0)
                .logarithmic(true)
                .text("steps/s"),
        );
        if let Some(ranges) = self.viewer.dataset().map(|d| *d.ranges()) {
            let mut step = self.viewer.playback().step();
            let slider = egui::Slider::new(&mut step, ranges.min_step..=ranges.max_step).text("step");
            if ui.add(slider).changed() {
                self.viewer.seek(step);
            }
        }

        ui.separator();

        // Filters and display
        let settings = &mut self.viewer.settings;
        egui::Grid::new("display_grid").num_columns(2).show(ui, |ui| {
            ui.label("Algorithm:");
            egui::ComboBox::from_id_salt("algo_filter")
                .selected_text(settings.filters.algo.map_or("All", Algo::tag))
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut settings.filters.algo, None, "All");
                    for algo in Algo::ALL {
                        ui.selectable_value(&mut settings.filters.algo, Some(algo), algo.tag());
                    }
                });
            ui.end_row();

            ui.label("Optimizer:");
            egui::ComboBox::from_id_salt("opt_filter")
                .selected_text(settings.filters.opt.map_or("All", Optimizer::tag))
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut settings.filters.opt, None, "All");
                    for opt in Optimizer::ALL {
                        ui.selectable_value(&mut settings.filters.opt, Some(opt), opt.tag());
                    }
                });
            ui.end_row();

            ui.label("Reveal:");
            egui::ComboBox::from_id_salt("reveal_mode")
                .selected_text(settings.reveal.label())
                .show_ui(ui, |ui| {
                    for mode in RevealMode::ALL {
                        ui.selectable_value(&mut settings.reveal, mode, mode.label());
                    }
                });
            ui.end_row();

            ui.label("Color:");
            egui::ComboBox::from_id_salt("color_mode")
                .selected_text(settings.color_mode.label())
                .show_ui(ui, |ui| {
                    for mode in ColorMode::ALL {
                        ui.selectable_value(&mut settings.color_mode, mode, mode.label());
                    }
                });
            ui.end_row();
        });

        ui.separator();
        self.stats_ui(ui);
    }

    fn stats_ui(&mut self, ui: &mut egui::Ui) {
        let panel = self.viewer.panel().clone();

        egui::Grid::new("stats_grid").num_columns(2).show(ui, |ui| {
            ui.label("Step:");
            ui.label(&panel.step);
            ui.end_row();
            ui.label("Visible:");
            ui.label(&panel.visible);
            ui.end_row();
            ui.label("Best fitness:");
            ui.strong(&panel.best_fitness);
            ui.end_row();
        });

        if !panel.best_record.is_empty() {
            ui.add_space(4.0);
            ui.monospace(&panel.best_record);
            ui.label(format!("Space: {}", panel.space));
        }

        ui.separator();
        ui.label("Best so far");
        egui::Grid::new("leaderboard_grid").num_columns(2).striped(true).show(ui, |ui| {
            for (name, value) in [
                ("QS", &panel.leaderboard.quick_sort),
                ("MS", &panel.leaderboard.merge_sort),
                ("GA", &panel.leaderboard.genetic),
                ("SA", &panel.leaderboard.annealing),
            ] {
                ui.label(name);
                ui.label(value);
                ui.end_row();
            }
        });

        ui.separator();
        ui.checkbox(&mut self.show_series, "Best fitness per step");
        if self.show_series && !self.viewer.best_series().is_empty() {
            let step = f64::from(self.viewer.playback().step());
            let points: Vec<[f64; 2]> = self
                .viewer
                .best_series()
                .iter()
                .map(|&(s, f)| [f64::from(s), f])
                .collect();
            egui_plot::Plot::new("best_series")
                .height(140.0)
                .allow_drag(false)
                .allow_zoom(false)
                .allow_scroll(false)
                .show(ui, |plot_ui| {
                    plot_ui.line(
                        egui_plot::Line::new(egui_plot::PlotPoints::from(points))
                            .color(crate::projection::FAST_COLOR)
                            .name("best ms"),
                    );
                    plot_ui.vline(egui_plot::VLine::new(step).color(egui::Color32::GRAY));
                });
        }
    }

    fn status_ui(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            match &self.current_source {
                Some(source) => ui.label(source.to_string()),
                None => ui.label("No log loaded"),
            };
            if let Some(dataset) = self.viewer.dataset() {
                ui.separator();
                ui.label(format!("{} records", dataset.len()));
                if dataset.skipped_rows() > 0 {
                    ui.label(format!("({} skipped)", dataset.skipped_rows()));
                }
                if dataset.filter_mode() == FilterMode::Snapshot {
                    ui.separator();
                    ui.label("heavy log: one step at a time");
                }
            }
            if let Some(frame) = self.viewer.last_frame() {
                ui.separator();
                ui.label(format!("{} drawn", frame.drawn));
                ui.label(format!("t = {:.2}", self.viewer.playback().cursor()));
            }
        });
    }

    fn canvas_ui(&mut self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::click());
        let rect = response.rect;

        let mut surface = EguiSurface { painter: &painter, rect };
        if self.viewer.render(&mut surface).is_none() {
            let msg = if self.loading { "Loading…" } else { "Load a CSV log, paste a link, or press Demo" };
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                msg,
                egui::FontId::proportional(16.0),
                egui::Color32::GRAY,
            );
        }

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let local = pos - rect.min;
                self.selected = self
                    .viewer
                    .pick(local.x, local.y, rect.width(), rect.height())
                    .cloned();
            }
        }
    }

    fn windows_ui(&mut self, ctx: &egui::Context) {
        if let Some(record) = &self.selected {
            let mut open = true;
            egui::Window::new("Configuration")
                .open(&mut open)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.monospace(describe_record(record));
                    ui.separator();
                    ui.label(format!("Space: {}", estimate_space(record)));
                    ui.label(format!("Step: {}", record.step));
                    if let Some(run) = &record.run_id {
                        ui.label(format!("Run: {}", run));
                    }
                    if let Some(idx) = &record.population_index {
                        ui.label(format!("Population index: {}", idx));
                    }
                    if let Some(temp) = &record.temperature {
                        ui.label(format!("Temperature: {}", temp));
                    }
                });
            if !open {
                self.selected = None;
            }
        }

        if let Some(msg) = &self.alert {
            let mut open = true;
            egui::Window::new("Load failed")
                .open(&mut open)
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label(msg);
                });
            if !open {
                self.alert = None;
            }
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_loads();
        self.handle_input(ctx);

        let now = Instant::now();
        self.viewer.advance(now - self.last_tick);
        self.last_tick = now;
        if self.viewer.playback().is_playing() {
            ctx.request_repaint();
        }

        egui::SidePanel::left("controls_panel").min_width(260.0).show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.controls_ui(ui, ctx);
            });
        });

        egui::TopBottomPanel::bottom("status_panel").show(ctx, |ui| {
            self.status_ui(ui);
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(BACKGROUND_COLOR))
            .show(ctx, |ui| {
                self.canvas_ui(ui);
            });

        self.windows_ui(ctx);
    }
}
