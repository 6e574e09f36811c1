use std::sync::Arc;

use anyhow::Context;
use image::RgbaImage;
use instant::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::field::DisplacementGrid;
use crate::pointer::{PointerEvent, PointerQueue, PointerTracker, Region};
use crate::render::GpuState;

/// How often to log FPS (seconds).
const FPS_LOG_INTERVAL: f64 = 5.0;

// ---------------------------------------------------------------------------
// Frame timing
// ---------------------------------------------------------------------------

struct FrameStats {
    frame_count: u64,
    last_log_time: Instant,
    frame_time_sum: f64,
    frame_time_min: f64,
    frame_time_max: f64,
    frames_since_log: u32,
}

impl FrameStats {
    fn new() -> Self {
        Self {
            frame_count: 0,
            last_log_time: Instant::now(),
            frame_time_sum: 0.0,
            frame_time_min: f64::MAX,
            frame_time_max: 0.0,
            frames_since_log: 0,
        }
    }

    fn record_frame(&mut self, dt: f64, grid: &DisplacementGrid, inside: bool) {
        self.frame_count += 1;
        self.frames_since_log += 1;
        self.frame_time_sum += dt;
        self.frame_time_min = self.frame_time_min.min(dt);
        self.frame_time_max = self.frame_time_max.max(dt);

        let elapsed = self.last_log_time.elapsed().as_secs_f64();
        if elapsed >= FPS_LOG_INTERVAL {
            let avg_ms = (self.frame_time_sum / self.frames_since_log as f64) * 1000.0;
            let fps = self.frames_since_log as f64 / elapsed;
            log::info!(
                "FPS: {:.0} | avg: {:.2}ms | min: {:.2}ms | max: {:.2}ms | total frames: {} | peak field: {:.3} | pointer inside: {}",
                fps,
                avg_ms,
                self.frame_time_min * 1000.0,
                self.frame_time_max * 1000.0,
                self.frame_count,
                grid.max_magnitude(),
                inside,
            );
            self.last_log_time = Instant::now();
            self.frame_time_sum = 0.0;
            self.frame_time_min = f64::MAX;
            self.frame_time_max = 0.0;
            self.frames_since_log = 0;
        }
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// Top-level application state.
struct App {
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,

    // Source image, handed to the GPU on first resume.
    source: Option<RgbaImage>,
    image_size: (u32, u32),
    initial_size: LogicalSize<u32>,

    // Pointer input -> displacement field
    pointer_queue: PointerQueue,
    tracker: PointerTracker,
    grid: DisplacementGrid,
    region: Region,

    // Frame timing
    last_frame_time: Option<Instant>,
    frame_stats: FrameStats,

    // Set when setup inside the event loop fails; returned from `run`.
    init_error: Option<anyhow::Error>,
}

impl App {
    fn new(source: RgbaImage, width: u32, height: u32) -> Self {
        Self {
            window: None,
            gpu: None,
            image_size: source.dimensions(),
            source: Some(source),
            initial_size: LogicalSize::new(width.max(1), height.max(1)),
            pointer_queue: PointerQueue::new(),
            tracker: PointerTracker::new(),
            grid: DisplacementGrid::new(),
            region: Region::new(0.0, 0.0, 0.0, 0.0),
            last_frame_time: None,
            frame_stats: FrameStats::new(),
            init_error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let attrs = WindowAttributes::default()
            .with_title("trailwarp")
            .with_inner_size(self.initial_size);
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let source = self
            .source
            .take()
            .context("source image already consumed")?;
        let gpu = GpuState::new(window.clone(), &source)?;
        log::info!("wgpu + displace pipeline initialized");

        let size = window.inner_size();
        self.gpu = Some(gpu);
        self.update_region(size.width, size.height);

        event_loop.set_control_flow(ControlFlow::Poll);
        self.window = Some(window);
        Ok(())
    }

    /// Re-fit the image to the window and move the quad to match.
    fn update_region(&mut self, width: u32, height: u32) {
        let (w, h) = (width as f32, height as f32);
        self.region = Region::fit_contain(w, h, self.image_size.0, self.image_size.1);
        log::debug!("Region: {:?} in {}x{}", self.region, width, height);
        if let Some(gpu) = &self.gpu {
            gpu.update_rect(self.region.to_ndc(w, h));
        }
    }

    /// One simulation frame: apply queued pointer input, step the field.
    fn step_field(&mut self) {
        self.pointer_queue
            .drain_into(&mut self.tracker, &self.region);
        self.grid.step(self.tracker.state());
        self.tracker.state_mut().settle();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(e) = self.init(event_loop) {
            self.init_error = Some(e);
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(new_size.width, new_size.height);
                }
                self.update_region(new_size.width, new_size.height);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.pointer_queue.push(PointerEvent::Moved {
                    x: position.x as f32,
                    y: position.y as f32,
                });
            }
            WindowEvent::CursorLeft { .. } => {
                self.pointer_queue.push(PointerEvent::Left);
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                match event.logical_key.as_ref() {
                    Key::Named(NamedKey::Escape) => {
                        log::info!("ESC pressed, exiting");
                        event_loop.exit();
                    }
                    Key::Character("r") | Key::Character("R") => {
                        self.grid.clear();
                        log::info!("Displacement field cleared");
                    }
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => {
                // --- Timing ---
                let now = Instant::now();
                if let Some(last) = self.last_frame_time {
                    let dt = now.duration_since(last).as_secs_f64();
                    self.frame_stats
                        .record_frame(dt, &self.grid, self.tracker.state().inside);
                }
                self.last_frame_time = Some(now);

                // --- Simulate ---
                self.step_field();

                // --- Render ---
                if let Some(gpu) = &self.gpu {
                    gpu.update_field(self.grid.texture_data());
                    gpu.render_frame();
                }
            }
            _ => {}
        }
    }
}

/// Entry point: create event loop and run until the window closes.
pub fn run(source: RgbaImage, width: u32, height: u32) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let mut app = App::new(source, width, height);
    event_loop
        .run_app(&mut app)
        .context("event loop terminated with an error")?;

    match app.init_error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
