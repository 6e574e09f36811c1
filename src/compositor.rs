//! CPU mirror of `displace.wgsl`.
//!
//! The live effect runs on the GPU; this copy of the per-pixel math backs
//! headless snapshots and lets the shader's behaviour be checked in tests.
//! Keep the two in step.

use glam::{Vec2, Vec4};
use image::RgbaImage;

use crate::field::{DisplacementGrid, GRID_SIZE};

/// How far the field pushes the lookup coordinate.
pub const DISPLACE_SCALE: f32 = 0.02;
/// Base per-channel separation.
pub const SHIFT_SCALE: f32 = 0.003;
/// Cap on local distortion strength.
pub const MAX_STRENGTH: f32 = 2.0;
/// Extra separation per unit strength for red, green, blue.
pub const CHANNEL_SPREAD: [f32; 3] = [0.5, 1.5, 2.5];

/// Where each output channel is read from, in v-up UV space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelTaps {
    pub r: Vec2,
    pub g: Vec2,
    pub b: Vec2,
    pub a: Vec2,
}

/// Lookup coordinates for a pixel at `uv` under field value `offset`.
pub fn taps(uv: Vec2, offset: Vec2) -> ChannelTaps {
    let displaced = uv - DISPLACE_SCALE * offset;
    let strength = offset.length().clamp(0.0, MAX_STRENGTH);
    let shift = offset * SHIFT_SCALE;
    let tap = |spread: f32| displaced + shift * (1.0 + strength * spread);
    ChannelTaps {
        r: tap(CHANNEL_SPREAD[0]),
        g: tap(CHANNEL_SPREAD[1]),
        b: tap(CHANNEL_SPREAD[2]),
        a: displaced,
    }
}

/// Bilinear field lookup with cell (i, j) at (i/N, j/N), clamped at the edges.
pub fn sample_field(grid: &DisplacementGrid, uv: Vec2) -> Vec2 {
    let n = GRID_SIZE as f32;
    let max = (GRID_SIZE - 1) as f32;
    let x = (uv.x * n).clamp(0.0, max);
    let y = (uv.y * n).clamp(0.0, max);
    let (i0, j0) = (x.floor() as usize, y.floor() as usize);
    let (i1, j1) = ((i0 + 1).min(GRID_SIZE - 1), (j0 + 1).min(GRID_SIZE - 1));
    let (fx, fy) = (x - i0 as f32, y - j0 as f32);

    let top = grid.get(i0, j0).lerp(grid.get(i1, j0), fx);
    let bottom = grid.get(i0, j1).lerp(grid.get(i1, j1), fx);
    top.lerp(bottom, fy)
}

/// Bilinear, clamp-to-edge RGBA lookup in 0..1 floats. `uv` is v-up.
pub fn sample_source(img: &RgbaImage, uv: Vec2) -> Vec4 {
    let (w, h) = img.dimensions();
    let max_x = (w - 1) as f32;
    let max_y = (h - 1) as f32;
    let x = (uv.x * w as f32 - 0.5).clamp(0.0, max_x);
    let y = ((1.0 - uv.y) * h as f32 - 0.5).clamp(0.0, max_y);
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
    let (fx, fy) = (x - x0 as f32, y - y0 as f32);

    let texel = |px: u32, py: u32| {
        let p = img.get_pixel(px, py).0;
        Vec4::new(p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32) / 255.0
    };
    let top = texel(x0, y0).lerp(texel(x1, y0), fx);
    let bottom = texel(x0, y1).lerp(texel(x1, y1), fx);
    top.lerp(bottom, fy)
}

/// Shade one pixel.
pub fn shade(img: &RgbaImage, grid: &DisplacementGrid, uv: Vec2) -> Vec4 {
    let t = taps(uv, sample_field(grid, uv));
    Vec4::new(
        sample_source(img, t.r).x,
        sample_source(img, t.g).y,
        sample_source(img, t.b).z,
        sample_source(img, t.a).w,
    )
}

/// Render the whole source through the field at the source's resolution.
pub fn composite(img: &RgbaImage, grid: &DisplacementGrid) -> RgbaImage {
    let (w, h) = img.dimensions();
    RgbaImage::from_fn(w, h, |px, py| {
        let uv = Vec2::new(
            (px as f32 + 0.5) / w as f32,
            1.0 - (py as f32 + 0.5) / h as f32,
        );
        let c = shade(img, grid, uv).clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
        image::Rgba([
            c.x.round() as u8,
            c.y.round() as u8,
            c.z.round() as u8,
            c.w.round() as u8,
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointer::PointerState;

    fn test_image() -> RgbaImage {
        RgbaImage::from_fn(32, 24, |x, y| {
            image::Rgba([(x * 8) as u8, (y * 10) as u8, ((x + y) * 4) as u8, 200 + (x % 5) as u8])
        })
    }

    fn swiped_grid() -> DisplacementGrid {
        let mut grid = DisplacementGrid::new();
        grid.step(&PointerState {
            previous: Vec2::new(0.3, 0.5),
            current: Vec2::new(0.7, 0.5),
            velocity: Vec2::new(0.4, 0.0),
            inside: true,
        });
        grid
    }

    #[test]
    fn zero_offset_taps_are_identity() {
        let uv = Vec2::new(0.3, 0.8);
        let t = taps(uv, Vec2::ZERO);
        assert_eq!(t, ChannelTaps { r: uv, g: uv, b: uv, a: uv });
    }

    #[test]
    fn empty_field_is_undistorted() {
        let img = test_image();
        let out = composite(&img, &DisplacementGrid::new());
        assert_eq!(out, img);
    }

    #[test]
    fn channel_separation_grows_with_strength() {
        let uv = Vec2::new(0.5, 0.5);
        let t = taps(uv, Vec2::new(1.0, 0.0));
        let displaced = uv - Vec2::new(DISPLACE_SCALE, 0.0);
        assert_eq!(t.a, displaced);
        // strength = 1: shifts of 1.5, 2.5 and 3.5 times 0.003.
        assert!((t.r.x - displaced.x - 0.0045).abs() < 1e-6);
        assert!((t.g.x - displaced.x - 0.0075).abs() < 1e-6);
        assert!((t.b.x - displaced.x - 0.0105).abs() < 1e-6);
        assert!(t.r.x < t.g.x && t.g.x < t.b.x);
    }

    #[test]
    fn strength_is_capped() {
        let uv = Vec2::new(0.5, 0.5);
        let big = taps(uv, Vec2::new(10.0, 0.0));
        let displaced = uv - Vec2::new(DISPLACE_SCALE * 10.0, 0.0);
        // strength clamps to 2, so blue shifts by 10 * 0.003 * (1 + 2 * 2.5).
        assert!((big.b.x - displaced.x - 0.18).abs() < 1e-5);
    }

    #[test]
    fn field_sampling_hits_cells_exactly() {
        let grid = swiped_grid();
        let n = GRID_SIZE as f32;
        for (i, j) in [(20, 32), (32, 32), (44, 30)] {
            let s = sample_field(&grid, Vec2::new(i as f32 / n, j as f32 / n));
            assert!((s - grid.get(i, j)).length() < 1e-5);
        }
    }

    #[test]
    fn field_sampling_interpolates_between_cells() {
        let grid = swiped_grid();
        let n = GRID_SIZE as f32;
        let mid = sample_field(&grid, Vec2::new(32.5 / n, 32.0 / n));
        let expected = (grid.get(32, 32) + grid.get(33, 32)) * 0.5;
        assert!((mid - expected).length() < 1e-5);
    }

    #[test]
    fn source_sampling_clamps_to_edge() {
        let img = test_image();
        let corner = sample_source(&img, Vec2::new(-0.5, 2.0));
        let p = img.get_pixel(0, 0).0;
        assert!((corner.x - p[0] as f32 / 255.0).abs() < 1e-6);
        assert!((corner.w - p[3] as f32 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn swipe_distorts_only_near_the_path() {
        let img = test_image();
        let out = composite(&img, &swiped_grid());
        assert_ne!(out, img);
        // Top-left corner is well outside the swipe's reach.
        assert_eq!(out.get_pixel(0, 0), img.get_pixel(0, 0));
    }
}
