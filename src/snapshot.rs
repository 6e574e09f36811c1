//! Headless render: replay a scripted drag and write the result to disk.

use std::path::Path;

use anyhow::{Context, Result};
use glam::Vec2;
use image::RgbaImage;

use crate::compositor;
use crate::field::DisplacementGrid;
use crate::pointer::{PointerEvent, PointerQueue, PointerTracker, Region};

/// Drag start and end, as fractions of the image (y down).
const SWEEP_FROM: Vec2 = Vec2::new(0.2, 0.7);
const SWEEP_TO: Vec2 = Vec2::new(0.8, 0.3);

/// Window-space pointer position for `frame` of a `frames`-long sweep.
fn sweep_point(frame: u32, frames: u32, w: f32, h: f32) -> Vec2 {
    let t = if frames <= 1 {
        1.0
    } else {
        frame as f32 / (frames - 1) as f32
    };
    SWEEP_FROM.lerp(SWEEP_TO, t) * Vec2::new(w, h)
}

/// Run `frames` simulation frames of the scripted sweep over `img`.
pub fn simulate(img: &RgbaImage, frames: u32) -> DisplacementGrid {
    let (w, h) = (img.width() as f32, img.height() as f32);
    let region = Region::new(0.0, 0.0, w, h);
    let mut queue = PointerQueue::new();
    let mut tracker = PointerTracker::new();
    let mut grid = DisplacementGrid::new();

    for frame in 0..frames {
        let p = sweep_point(frame, frames, w, h);
        queue.push(PointerEvent::Moved { x: p.x, y: p.y });
        queue.drain_into(&mut tracker, &region);
        grid.step(tracker.state());
        tracker.state_mut().settle();
    }
    grid
}

/// Simulate, composite on the CPU and save as PNG.
pub fn render_to_file(img: &RgbaImage, frames: u32, out: &Path) -> Result<()> {
    let grid = simulate(img, frames);
    log::info!(
        "Simulated {} frames, peak displacement {:.3}",
        frames,
        grid.max_magnitude()
    );
    let rendered = compositor::composite(img, &grid);
    rendered
        .save(out)
        .with_context(|| format!("failed to write snapshot {}", out.display()))?;
    log::info!("Wrote snapshot {}", out.display());
    Ok(())
}
