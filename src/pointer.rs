use std::collections::VecDeque;

use glam::Vec2;

/// Bounding rectangle of the target region, in window pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Largest rectangle with the image's aspect ratio that fits the
    /// window, centered (letterboxed).
    pub fn fit_contain(window_w: f32, window_h: f32, image_w: u32, image_h: u32) -> Self {
        if window_w <= 0.0 || window_h <= 0.0 || image_w == 0 || image_h == 0 {
            return Self::new(0.0, 0.0, window_w.max(0.0), window_h.max(0.0));
        }
        let aspect = image_w as f32 / image_h as f32;
        let (w, h) = if window_w / window_h > aspect {
            (window_h * aspect, window_h)
        } else {
            (window_w, window_w / aspect)
        };
        Self::new((window_w - w) * 0.5, (window_h - h) * 0.5, w, h)
    }

    /// Map a window-space point to unit-square coordinates, v pointing up.
    pub fn normalize(&self, x: f32, y: f32) -> Vec2 {
        Vec2::new(
            (x - self.left) / self.width,
            1.0 - (y - self.top) / self.height,
        )
    }

    /// Region corners in normalized device coordinates: `[x0, y0, x1, y1]`
    /// with (x0, y0) the top-left.
    pub fn to_ndc(&self, window_w: f32, window_h: f32) -> [f32; 4] {
        let w = window_w.max(1.0);
        let h = window_h.max(1.0);
        [
            self.left / w * 2.0 - 1.0,
            1.0 - self.top / h * 2.0,
            (self.left + self.width) / w * 2.0 - 1.0,
            1.0 - (self.top + self.height) / h * 2.0,
        ]
    }

    fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Pointer position and motion, normalized to the target region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerState {
    pub current: Vec2,
    pub previous: Vec2,
    /// `current - previous` as of the last inside event, then decayed per frame.
    pub velocity: Vec2,
    pub inside: bool,
}

/// Extra decay applied to the tracked velocity each frame.
const VELOCITY_DECAY: f32 = 0.9;

impl PointerState {
    pub fn new() -> Self {
        Self {
            current: Vec2::ZERO,
            previous: Vec2::ZERO,
            velocity: Vec2::ZERO,
            inside: false,
        }
    }

    /// Per-frame velocity falloff so a stopped pointer quits depositing
    /// well before the grid itself relaxes.
    pub fn settle(&mut self) {
        self.velocity *= VELOCITY_DECAY;
    }
}

/// Raw pointer input as delivered by the windowing layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    /// Cursor at a window-space position (physical pixels).
    Moved { x: f32, y: f32 },
    /// Cursor left the window entirely.
    Left,
}

/// Converts raw pointer events into `PointerState` updates.
pub struct PointerTracker {
    state: PointerState,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self {
            state: PointerState::new(),
        }
    }

    pub fn state(&self) -> &PointerState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut PointerState {
        &mut self.state
    }

    /// Apply one pointer move against the region as it is right now.
    pub fn handle_move(&mut self, x: f32, y: f32, region: &Region) {
        if region.is_degenerate() {
            self.state.inside = false;
            return;
        }

        let uv = region.normalize(x, y);
        let inside = (0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y);

        if inside {
            // Seed previous on (re-)entry so the first event carries no jump.
            self.state.previous = if self.state.inside {
                self.state.current
            } else {
                uv
            };
            self.state.current = uv;
            self.state.velocity = self.state.current - self.state.previous;
        }
        self.state.inside = inside;
    }

    pub fn handle(&mut self, event: PointerEvent, region: &Region) {
        match event {
            PointerEvent::Moved { x, y } => self.handle_move(x, y, region),
            PointerEvent::Left => self.state.inside = false,
        }
    }
}

/// FIFO of pointer events between event delivery and the next frame.
pub struct PointerQueue {
    events: VecDeque<PointerEvent>,
}

/// Events kept between frames; older moves are dropped first.
const QUEUE_CAPACITY: usize = 256;

impl PointerQueue {
    pub fn new() -> Self {
        Self {
            events: VecDeque::with_capacity(QUEUE_CAPACITY),
        }
    }

    pub fn push(&mut self, event: PointerEvent) {
        if self.events.len() == QUEUE_CAPACITY {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Feed every queued event, oldest first, into the tracker.
    pub fn drain_into(&mut self, tracker: &mut PointerTracker, region: &Region) -> usize {
        let n = self.events.len();
        for event in self.events.drain(..) {
            tracker.handle(event, region);
        }
        n
    }
}
