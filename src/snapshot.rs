//! Headless frame capture
//!
//! Renders one frame through the regular pipeline into an RGBA raster and
//! saves it as PNG.

use anyhow::{Context, Result};
use egui::Color32;
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::projection::BACKGROUND_COLOR;
use crate::render::{Frame, Surface};
use crate::viewer::Viewer;

/// Peak opacity of the glow halo
const GLOW_ALPHA: f32 = 0.35;

pub struct RasterSurface {
    image: RgbaImage,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        let bg = BACKGROUND_COLOR;
        Self { image: RgbaImage::from_pixel(width, height, Rgba([bg.r(), bg.g(), bg.b(), 255])) }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        self.image
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Visit every pixel whose center lies within `outer` of `center`,
    /// with its distance to `center`
    fn for_each_within(&mut self, center: [f32; 2], outer: f32, mut f: impl FnMut(&mut Rgba<u8>, f32)) {
        let (w, h) = (self.image.width() as i64, self.image.height() as i64);
        let x0 = ((center[0] - outer).floor() as i64).max(0);
        let x1 = ((center[0] + outer).ceil() as i64).min(w - 1);
        let y0 = ((center[1] - outer).floor() as i64).max(0);
        let y1 = ((center[1] + outer).ceil() as i64).min(h - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f32 + 0.5 - center[0];
                let dy = y as f32 + 0.5 - center[1];
                let d = (dx * dx + dy * dy).sqrt();
                if d <= outer {
                    f(self.image.get_pixel_mut(x as u32, y as u32), d);
                }
            }
        }
    }
}

impl Surface for RasterSurface {
    fn size(&self) -> (f32, f32) {
        (self.image.width() as f32, self.image.height() as f32)
    }

    fn fill_circle(&mut self, center: [f32; 2], radius: f32, color: Color32, glow: f32) {
        if glow > 0.0 {
            let outer = radius + glow;
            self.for_each_within(center, outer, |px, d| {
                let falloff = 1.0 - ((d - radius).max(0.0) / glow);
                blend(px, color, GLOW_ALPHA * falloff);
            });
        }
        // one pixel of edge coverage for anti-aliasing
        self.for_each_within(center, radius + 0.5, |px, d| {
            let coverage = (radius + 0.5 - d).clamp(0.0, 1.0);
            blend(px, color, coverage);
        });
    }
}

fn blend(px: &mut Rgba<u8>, color: Color32, alpha: f32) {
    let a = alpha.clamp(0.0, 1.0);
    let src = [color.r(), color.g(), color.b()];
    for (dst, s) in px.0.iter_mut().zip(src) {
        *dst = (f32::from(s) * a + f32::from(*dst) * (1.0 - a)).round() as u8;
    }
}

/// Default output name: `snapshot_step<N>_<timestamp>.png`
pub fn default_output(step: u32) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(format!("snapshot_step{}_{}.png", step, stamp))
}

/// Render the viewer's current frame into a `width x height` PNG
pub fn capture(viewer: &mut Viewer, width: u32, height: u32, output: &Path) -> Result<Frame> {
    let mut surface = RasterSurface::new(width, height);
    let frame = viewer
        .render(&mut surface)
        .cloned()
        .context("No dataset loaded")?;
    surface.save(output)?;
    info!(
        "Saved {}x{} snapshot of step {} ({} of {} points drawn) to {}",
        width,
        height,
        frame.step,
        frame.drawn,
        frame.visible,
        output.display()
    );
    Ok(frame)
}
