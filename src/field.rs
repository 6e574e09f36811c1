//! Pointer displacement field: velocity painted into a coarse grid.
//! Sampled by the displace shader to offset texture lookups.

use glam::Vec2;

use crate::pointer::PointerState;

/// Grid resolution (cells per axis).
pub const GRID_SIZE: usize = 64;
/// Influence radius around the pointer, in normalized units.
pub const RADIUS: f32 = 0.15;
/// Global deposit strength.
const STRENGTH: f32 = 1.0;
/// Amplification so that small pointer motion reads as visible distortion.
const AMPLIFY: f32 = 100.0;
/// Decay factor per frame (half-life ~17 frames: 0.96^17 ≈ 0.5).
pub const DECAY: f32 = 0.96;
/// Normalized distance covered by one deposit sub-step.
const SUBSTEP_LEN: f32 = 0.01;

/// Number of deposit sub-steps for a pointer move of length `dist`.
pub fn substeps(dist: f32) -> usize {
    ((dist / SUBSTEP_LEN).floor() as usize).max(1)
}

pub struct DisplacementGrid {
    /// Row-major `[dx, dy, reserved, reserved]`; row j is v = j / GRID_SIZE.
    cells: Vec<[f32; 4]>,
}

impl DisplacementGrid {
    pub fn new() -> Self {
        Self {
            cells: vec![[0.0; 4]; GRID_SIZE * GRID_SIZE],
        }
    }

    pub fn get(&self, i: usize, j: usize) -> Vec2 {
        let c = self.cells[j * GRID_SIZE + i];
        Vec2::new(c[0], c[1])
    }

    /// Advance one frame: deposit along the pointer's path, then decay.
    pub fn step(&mut self, pointer: &PointerState) {
        let path = pointer.current - pointer.previous;
        let steps = substeps(path.length());
        let slice = pointer.velocity / steps as f32;

        if pointer.inside {
            for s in 0..steps {
                let t = if steps == 1 {
                    1.0
                } else {
                    s as f32 / (steps - 1) as f32
                };
                self.deposit(pointer.previous + path * t, slice);
            }
        }

        self.decay();
    }

    /// Add `velocity` with linear falloff to every cell within `RADIUS` of `pos`.
    fn deposit(&mut self, pos: Vec2, velocity: Vec2) {
        if velocity == Vec2::ZERO {
            return;
        }
        let n = GRID_SIZE as f32;
        let (i0, i1) = cell_span(pos.x, n);
        let (j0, j1) = cell_span(pos.y, n);

        for j in j0..j1 {
            for i in i0..i1 {
                let cell_pos = Vec2::new(i as f32 / n, j as f32 / n);
                let d = cell_pos.distance(pos);
                if d < RADIUS {
                    let add = STRENGTH * velocity * (1.0 - d / RADIUS) * AMPLIFY;
                    let c = &mut self.cells[j * GRID_SIZE + i];
                    c[0] += add.x;
                    c[1] += add.y;
                }
            }
        }
    }

    fn decay(&mut self) {
        for c in &mut self.cells {
            c[0] *= DECAY;
            c[1] *= DECAY;
        }
    }

    /// Zero every cell.
    pub fn clear(&mut self) {
        self.cells.fill([0.0; 4]);
    }

    /// Largest displacement length across the grid.
    pub fn max_magnitude(&self) -> f32 {
        self.cells
            .iter()
            .map(|c| Vec2::new(c[0], c[1]).length())
            .fold(0.0, f32::max)
    }

    /// Raw cells for RGBA32F texture upload.
    pub fn texture_data(&self) -> &[[f32; 4]] {
        &self.cells
    }
}

/// Half-open range of cell indices on one axis that can lie within
/// `RADIUS` of coordinate `p`.
fn cell_span(p: f32, n: f32) -> (usize, usize) {
    let lo = ((p - RADIUS) * n).floor().max(0.0);
    let hi = ((p + RADIUS) * n).ceil() + 1.0;
    (lo.min(n) as usize, hi.clamp(0.0, n) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moving(prev: Vec2, cur: Vec2) -> PointerState {
        PointerState {
            current: cur,
            previous: prev,
            velocity: cur - prev,
            inside: true,
        }
    }

    /// Full-grid scan used as ground truth for the bounded deposit.
    fn deposit_full_scan(cells: &mut [[f32; 4]], pos: Vec2, velocity: Vec2) {
        let n = GRID_SIZE as f32;
        for j in 0..GRID_SIZE {
            for i in 0..GRID_SIZE {
                let d = Vec2::new(i as f32 / n, j as f32 / n).distance(pos);
                if d < RADIUS {
                    let add = STRENGTH * velocity * (1.0 - d / RADIUS) * AMPLIFY;
                    cells[j * GRID_SIZE + i][0] += add.x;
                    cells[j * GRID_SIZE + i][1] += add.y;
                }
            }
        }
    }

    #[test]
    fn substep_counts() {
        assert_eq!(substeps(0.05), 5);
        assert_eq!(substeps(0.003), 1);
        assert_eq!(substeps(0.0), 1);
        assert_eq!(substeps(0.2), 20);
    }

    #[test]
    fn deposit_stays_inside_radius() {
        let mut grid = DisplacementGrid::new();
        let pos = Vec2::new(0.5, 0.5);
        grid.deposit(pos, Vec2::new(0.01, 0.0));

        let n = GRID_SIZE as f32;
        for j in 0..GRID_SIZE {
            for i in 0..GRID_SIZE {
                let d = Vec2::new(i as f32 / n, j as f32 / n).distance(pos);
                let v = grid.get(i, j);
                if d >= RADIUS {
                    assert_eq!(v, Vec2::ZERO, "cell ({i}, {j}) at distance {d}");
                } else {
                    assert!(v.x > 0.0, "cell ({i}, {j}) at distance {d} got nothing");
                }
            }
        }
    }

    #[test]
    fn deposit_falls_off_linearly() {
        let mut grid = DisplacementGrid::new();
        grid.deposit(Vec2::new(0.5, 0.5), Vec2::new(0.01, 0.0));
        // Cell (32, 32) sits exactly on the pointer: full strength.
        assert!((grid.get(32, 32).x - 1.0).abs() < 1e-5);
        // Four cells right is 0.0625 away.
        let expected = 1.0 - 0.0625 / RADIUS;
        assert!((grid.get(36, 32).x - expected).abs() < 1e-5);
    }

    #[test]
    fn bounded_deposit_matches_full_scan() {
        let positions = [
            Vec2::new(0.5, 0.5),
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.03, 0.97),
            Vec2::new(0.7312, 0.1234),
            Vec2::new(0.99, 0.5),
        ];
        for pos in positions {
            let mut grid = DisplacementGrid::new();
            let mut reference = vec![[0.0f32; 4]; GRID_SIZE * GRID_SIZE];
            let v = Vec2::new(0.013, -0.007);
            grid.deposit(pos, v);
            deposit_full_scan(&mut reference, pos, v);
            assert_eq!(grid.texture_data(), &reference[..], "mismatch at {pos:?}");
        }
    }

    #[test]
    fn outside_pointer_deposits_nothing() {
        let mut grid = DisplacementGrid::new();
        let mut p = moving(Vec2::new(0.4, 0.4), Vec2::new(0.5, 0.5));
        p.inside = false;
        grid.step(&p);
        assert_eq!(grid.max_magnitude(), 0.0);
    }

    #[test]
    fn fast_swipe_leaves_continuous_trail() {
        let mut grid = DisplacementGrid::new();
        grid.step(&moving(Vec2::new(0.1, 0.5), Vec2::new(0.9, 0.5)));
        // Every cell along the swipe's row got something.
        for i in 7..=57 {
            assert!(grid.get(i, 32).x > 0.0, "gap at column {i}");
        }
    }

    #[test]
    fn decays_monotonically_at_decay_rate() {
        let mut grid = DisplacementGrid::new();
        grid.step(&moving(Vec2::new(0.45, 0.5), Vec2::new(0.55, 0.52)));

        let idle = PointerState::new();
        let start = grid.max_magnitude();
        assert!(start > 0.0);

        let mut prev: Vec<f32> = (0..GRID_SIZE * GRID_SIZE)
            .map(|k| grid.get(k % GRID_SIZE, k / GRID_SIZE).length())
            .collect();
        for frame in 1..=60 {
            grid.step(&idle);
            for (k, before) in prev.iter_mut().enumerate() {
                let now = grid.get(k % GRID_SIZE, k / GRID_SIZE).length();
                if *before > 0.0 {
                    assert!(now < *before, "cell {k} did not shrink on frame {frame}");
                }
                *before = now;
            }
            let expected = start * DECAY.powi(frame);
            assert!((grid.max_magnitude() - expected).abs() <= expected * 1e-4);
        }
    }

    #[test]
    fn sustained_input_stays_bounded() {
        let mut grid = DisplacementGrid::new();
        // Circle around the centre forever, one move per frame.
        let mut tracker = crate::pointer::PointerTracker::new();
        let region = crate::pointer::Region::new(0.0, 0.0, 1000.0, 1000.0);
        let mut peak = 0.0f32;
        for frame in 0..2000 {
            let a = frame as f32 * 0.2;
            tracker.handle_move(500.0 + 200.0 * a.cos(), 500.0 + 200.0 * a.sin(), &region);
            grid.step(tracker.state());
            tracker.state_mut().settle();
            peak = peak.max(grid.max_magnitude());
        }
        // Per-frame deposit is at most |v| * AMPLIFY per overlapping sub-step;
        // geometric decay caps the sum at that over (1 - DECAY).
        let step_len = 0.2 * 0.2;
        let bound = step_len * AMPLIFY / (1.0 - DECAY);
        assert!(peak.is_finite());
        assert!(peak < bound, "peak {peak} exceeds {bound}");
    }

    #[test]
    fn simulation_is_deterministic() {
        let run = || {
            let mut grid = DisplacementGrid::new();
            let mut tracker = crate::pointer::PointerTracker::new();
            let region = crate::pointer::Region::new(10.0, 20.0, 640.0, 480.0);
            for frame in 0..120 {
                let t = frame as f32 / 120.0;
                tracker.handle_move(10.0 + 640.0 * t, 20.0 + 480.0 * (t * 6.0).sin().abs(), &region);
                grid.step(tracker.state());
                tracker.state_mut().settle();
            }
            grid.texture_data().to_vec()
        };
        let a = run();
        let b = run();
        assert!(a
            .iter()
            .zip(&b)
            .all(|(x, y)| x.iter().zip(y).all(|(p, q)| p.to_bits() == q.to_bits())));
    }

    #[test]
    fn reserved_channels_stay_zero() {
        let mut grid = DisplacementGrid::new();
        grid.step(&moving(Vec2::new(0.2, 0.2), Vec2::new(0.6, 0.7)));
        assert!(grid.texture_data().iter().all(|c| c[2] == 0.0 && c[3] == 0.0));
    }

    #[test]
    fn clear_resets_everything() {
        let mut grid = DisplacementGrid::new();
        grid.step(&moving(Vec2::new(0.2, 0.2), Vec2::new(0.6, 0.7)));
        grid.clear();
        assert_eq!(grid.max_magnitude(), 0.0);
    }
}
