//! Sort Evolution Viewer
//!
//! Animated scatter view of sorting-algorithm optimizer logs.
//!
//! CLI commands:
//! - view: Launch the native viewer
//! - summary: Print the output panel at a step
//! - snapshot: Render one frame to PNG
//! - synth: Write a synthetic experiment log

mod config;
mod dataset;
mod describe;
mod gui;
mod leaderboard;
mod logging;
mod playback;
mod projection;
mod quantiles;
mod render;
mod snapshot;
mod source;
mod synth;
mod viewer;

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use dataset::{Algo, Filters, Optimizer, Schema};
use render::{RevealMode, Surface};
use source::{LoadError, SourceRef};
use viewer::{Panel, Settings, Viewer};

#[derive(Parser)]
#[command(name = "sort_evo_viz")]
#[command(about = "Animated scatter view of sorting-algorithm optimizer logs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to viewer.yaml config
    #[arg(short, long, default_value = "viewer.yaml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch native GUI viewer
    View {
        /// CSV path or URL to open on startup
        #[arg(long)]
        csv: Option<String>,

        /// Query string carrying `csv=<percent-encoded source>`
        #[arg(long)]
        query: Option<String>,
    },

    /// Print the output panel at a step
    Summary {
        /// CSV path or URL
        source: String,

        /// Time-step (defaults to the last one)
        #[arg(long)]
        step: Option<u32>,

        /// Algorithm filter
        #[arg(long, value_parser = parse_algo)]
        algo: Option<Algo>,

        /// Optimizer filter
        #[arg(long, value_parser = parse_opt)]
        opt: Option<Optimizer>,

        /// Reveal mode: progressive, top-n or off
        #[arg(long, value_parser = parse_reveal)]
        reveal: Option<RevealMode>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Render one frame to PNG
    Snapshot {
        /// CSV path or URL
        source: String,

        /// Time-step (defaults to the last one)
        #[arg(long)]
        step: Option<u32>,

        #[arg(long, default_value = "1280")]
        width: u32,

        #[arg(long, default_value = "800")]
        height: u32,

        /// Output PNG (defaults to a timestamped name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a synthetic experiment log
    Synth {
        #[arg(short, long, default_value = "data/sort_evo_demo.csv")]
        output: PathBuf,

        #[arg(long, default_value = "200")]
        steps: u32,

        /// Individuals per algorithm/optimizer lane per step
        #[arg(long, default_value = "25")]
        population: u32,

        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = config::Env::load();

    // Initialize logging first; the guard flushes the log file on exit
    let _log_guard = logging::init_logging(&env.log_dir)?;
    tracing::info!("Sort Evolution Viewer starting up");

    let cli = Cli::parse();
    tracing::debug!("CLI args parsed: config={:?}", cli.config);

    let config = config::ViewerConfig::load_or_default(&cli.config)?;

    match cli.command {
        Commands::View { csv, query } => {
            let initial = csv
                .as_deref()
                .map(SourceRef::parse)
                .or_else(|| query.as_deref().and_then(source::source_from_query));
            tracing::info!("Launching native GUI viewer");
            gui::run_viewer(config, env, initial)?;
        }

        Commands::Summary { source, step, algo, opt, reveal, json } => {
            let mut settings = config.defaults;
            settings.filters = Filters { algo: algo.or(settings.filters.algo), opt: opt.or(settings.filters.opt) };
            if let Some(reveal) = reveal {
                settings.reveal = reveal;
            }
            let (source, mut viewer) = load_viewer(&source, settings).await?;
            seek_or_last(&mut viewer, step);
            print_summary(&source, &mut viewer, json)?;
        }

        Commands::Snapshot { source, step, width, height, output } => {
            let (_, mut viewer) = load_viewer(&source, config.defaults).await?;
            seek_or_last(&mut viewer, step);
            let output = output.unwrap_or_else(|| snapshot::default_output(viewer.playback().step()));
            let frame = snapshot::capture(&mut viewer, width, height, &output)?;
            println!(
                "Step {}: drew {} of {} points -> {}",
                frame.step,
                frame.drawn,
                frame.visible,
                output.display()
            );
        }

        Commands::Synth { output, steps, population, seed } => {
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let options = synth::SynthOptions { steps, population, seed };
            println!("Generating {} rows...", options.rows());
            let rows = synth::write_file(&output, options)?;
            println!("Done! Wrote {} rows to {}", rows, output.display());
        }
    }

    Ok(())
}

async fn load_viewer(text: &str, settings: Settings) -> anyhow::Result<(SourceRef, Viewer)> {
    let source = SourceRef::parse(text);
    let body = source::fetch_text(&source).await?;
    let mut viewer = Viewer::new(settings);
    let dataset = viewer.load_text(&body).map_err(LoadError::from)?;
    if dataset.skipped_rows() > 0 {
        tracing::warn!("Skipped {} malformed rows in {}", dataset.skipped_rows(), source);
    }
    Ok((source, viewer))
}

fn seek_or_last(viewer: &mut Viewer, step: Option<u32>) {
    let last = viewer.dataset().map_or(0, |d| d.ranges().max_step);
    viewer.seek(step.unwrap_or(last));
}

/// Measures nothing and draws nothing; the panel only needs the frame pass
struct HeadlessSurface;

impl Surface for HeadlessSurface {
    fn size(&self) -> (f32, f32) {
        (1280.0, 800.0)
    }

    fn fill_circle(&mut self, _center: [f32; 2], _radius: f32, _color: egui::Color32, _glow: f32) {}
}

#[derive(Serialize)]
struct Summary<'a> {
    source: String,
    schema: Schema,
    records: usize,
    skipped_rows: usize,
    heavy: bool,
    panel: &'a Panel,
}

fn print_summary(source: &SourceRef, viewer: &mut Viewer, json: bool) -> anyhow::Result<()> {
    viewer.render(&mut HeadlessSurface);
    let Some(dataset) = viewer.dataset() else {
        anyhow::bail!("No dataset loaded");
    };
    let summary = Summary {
        source: source.to_string(),
        schema: dataset.schema(),
        records: dataset.len(),
        skipped_rows: dataset.skipped_rows(),
        heavy: dataset.is_heavy(),
        panel: viewer.panel(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let panel = summary.panel;
    println!("Source:   {}", summary.source);
    println!(
        "Records:  {} ({:?} layout, {} skipped)",
        summary.records, summary.schema, summary.skipped_rows
    );
    println!("Step:     {}", panel.step);
    println!("Visible:  {}", panel.visible);
    println!("Best:     {}", panel.best_fitness);
    if !panel.best_record.is_empty() {
        println!();
        for line in panel.best_record.lines() {
            println!("  {}", line);
        }
        println!("  Space: {}", panel.space);
    }
    println!();
    println!("Best so far:");
    println!("  QS {:>14}   MS {:>14}", panel.leaderboard.quick_sort, panel.leaderboard.merge_sort);
    println!("  GA {:>14}   SA {:>14}", panel.leaderboard.genetic, panel.leaderboard.annealing);
    Ok(())
}

fn parse_algo(s: &str) -> Result<Algo, String> {
    Algo::from_tag(&s.to_ascii_uppercase())
        .filter(|_| !s.is_empty())
        .ok_or_else(|| format!("unknown algorithm '{}' (expected QS or MS)", s))
}

fn parse_opt(s: &str) -> Result<Optimizer, String> {
    Optimizer::from_tag(&s.to_ascii_uppercase())
        .filter(|_| !s.is_empty())
        .ok_or_else(|| format!("unknown optimizer '{}' (expected GA or SA)", s))
}

fn parse_reveal(s: &str) -> Result<RevealMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "progressive" => Ok(RevealMode::Progressive),
        "top-n" | "topn" => Ok(RevealMode::TopN),
        "off" => Ok(RevealMode::Off),
        _ => Err(format!("unknown reveal mode '{}' (expected progressive, top-n or off)", s)),
    }
}
