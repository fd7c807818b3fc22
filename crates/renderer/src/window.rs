use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, error, info, trace, warn};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{CursorGrabMode, Fullscreen, Window, WindowBuilder};

use crate::fps::{fps_title, FpsCounter, TitleTicker};
use crate::gpu::GpuContext;
use crate::runtime::{FrameClock, FrameRateCap, FrameScheduler, FrameTime};
use crate::types::VsyncMode;

/// Pixel-precise wheels report pixels; treat this many as one notch.
const PIXELS_PER_SCROLL_LINE: f64 = 40.0;

/// How [`run`] opens the window and paces frames.
#[derive(Debug, Clone)]
pub struct WindowOptions {
    /// Initial title, replaced by [`Demo::title`] once an FPS reading exists.
    pub title: String,
    /// Inner size in physical pixels.
    pub size: (u32, u32),
    /// Borderless fullscreen on the current monitor.
    pub fullscreen: bool,
    /// Confine the cursor to the window.
    pub grab_cursor: bool,
    /// Frame cap; unlimited also turns vsync off.
    pub frame_rate: FrameRateCap,
}

/// One interactive program driven by [`run`].
///
/// Cursor positions are in physical pixels with the origin at the
/// bottom-left corner of the window.
pub trait Demo {
    fn title(&self, fps: f32) -> String {
        fps_title(fps)
    }

    fn resize(&mut self, _ctx: &GpuContext, _size: PhysicalSize<u32>) {}

    /// Called for every fresh key press except Escape, which closes the window.
    fn key_pressed(&mut self, _key: &Key) {}

    fn cursor_moved(&mut self, _x: f32, _y: f32) {}

    /// Wheel movement in lines; positive `y` scrolls up.
    fn scrolled(&mut self, _x: f32, _y: f32) {}

    /// Encodes and submits everything for one frame into `view`.
    fn render(&mut self, ctx: &GpuContext, time: &FrameTime, view: &wgpu::TextureView)
        -> Result<()>;

    /// Runs once when the loop ends, however it ends.
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

enum FrameError {
    Surface(wgpu::SurfaceError),
    Demo(anyhow::Error),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Surface(err) => write!(f, "surface error: {err}"),
            FrameError::Demo(err) => write!(f, "{err:#}"),
        }
    }
}

struct LoopState<D> {
    // Declared before `window`: the surface must be dropped first.
    gpu: GpuContext,
    demo: D,
    window: Arc<Window>,
    clock: FrameClock,
    scheduler: FrameScheduler,
    fps: FpsCounter,
    title: TitleTicker,
    shut_down: bool,
}

impl<D: Demo> LoopState<D> {
    fn redraw(&mut self) -> Result<(), FrameError> {
        let frame = self.gpu.acquire_frame().map_err(FrameError::Surface)?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let now = Instant::now();
        let time = self.clock.advance(now);
        self.demo
            .render(&self.gpu, &time, &view)
            .map_err(FrameError::Demo)?;
        self.window.pre_present_notify();
        frame.present();

        self.scheduler.mark_rendered(now);
        self.fps.tick(now);
        if self.title.poll(now) {
            let fps = self.fps.fps();
            self.window.set_title(&self.demo.title(fps));
            debug!(fps, frame = time.frame, "frame rate");
        }
        Ok(())
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.gpu.resize(size);
        self.demo.resize(&self.gpu, size);
    }

    fn cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        let height = self.gpu.size().height as f64;
        self.demo
            .cursor_moved(position.x as f32, (height - position.y) as f32);
    }

    fn scrolled(&mut self, delta: MouseScrollDelta) {
        let (x, y) = match delta {
            MouseScrollDelta::LineDelta(x, y) => (x, y),
            MouseScrollDelta::PixelDelta(pos) => (
                (pos.x / PIXELS_PER_SCROLL_LINE) as f32,
                (pos.y / PIXELS_PER_SCROLL_LINE) as f32,
            ),
        };
        self.demo.scrolled(x, y);
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        self.demo.shutdown()
    }
}

/// Opens the window, builds the demo against its GPU context and runs the
/// event loop until Escape, window close or a render error.
pub fn run<D, F>(options: WindowOptions, build: F) -> Result<()>
where
    D: Demo + 'static,
    F: FnOnce(&GpuContext) -> Result<D>,
{
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let (width, height) = options.size;
    let mut builder = WindowBuilder::new()
        .with_title(&options.title)
        .with_inner_size(PhysicalSize::new(width, height));
    if options.fullscreen {
        builder = builder.with_fullscreen(Some(Fullscreen::Borderless(None)));
    }
    let window = Arc::new(
        builder
            .build(&event_loop)
            .map_err(|err| anyhow!("failed to create window: {err}"))?,
    );
    window.set_cursor_visible(true);
    if options.grab_cursor {
        grab_cursor(&window);
    }

    let vsync = if options.frame_rate.is_unlimited() {
        VsyncMode::Off
    } else {
        VsyncMode::On
    };
    let gpu = GpuContext::new(window.as_ref(), window.inner_size(), vsync)
        .context("failed to initialise GPU")?;
    let demo = build(&gpu)?;
    info!(
        width = gpu.size().width,
        height = gpu.size().height,
        adapter = gpu.adapter_name(),
        fps_cap = %options.frame_rate,
        "window ready"
    );

    let now = Instant::now();
    let mut state = LoopState {
        gpu,
        demo,
        window,
        clock: FrameClock::new(now),
        scheduler: FrameScheduler::new(options.frame_rate),
        fps: FpsCounter::new(now),
        title: TitleTicker::new(now),
        shut_down: false,
    };
    state.window.request_redraw();

    let failure: Rc<RefCell<Option<anyhow::Error>>> = Rc::new(RefCell::new(None));
    let loop_failure = Rc::clone(&failure);

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { window_id, event } if window_id == state.window.id() => {
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                        elwt.exit();
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        if event.state == ElementState::Pressed && !event.repeat {
                            if matches!(event.logical_key, Key::Named(NamedKey::Escape)) {
                                elwt.exit();
                            } else {
                                state.demo.key_pressed(&event.logical_key);
                            }
                        }
                    }
                    WindowEvent::CursorMoved { position, .. } => state.cursor_moved(position),
                    WindowEvent::MouseWheel { delta, .. } => state.scrolled(delta),
                    WindowEvent::Resized(size) => state.resize(size),
                    WindowEvent::ScaleFactorChanged {
                        mut inner_size_writer,
                        ..
                    } => {
                        let _ = inner_size_writer.request_inner_size(state.gpu.size());
                    }
                    WindowEvent::RedrawRequested => match state.redraw() {
                        Ok(()) => {}
                        Err(FrameError::Surface(
                            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated,
                        )) => state.gpu.reconfigure(),
                        Err(FrameError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                            error!("surface out of memory; exiting");
                            elwt.exit();
                        }
                        Err(FrameError::Surface(wgpu::SurfaceError::Timeout)) => {
                            warn!("surface timeout; retrying next frame");
                        }
                        Err(err @ FrameError::Surface(_)) => {
                            warn!("{err}; retrying next frame");
                        }
                        Err(FrameError::Demo(err)) => {
                            error!("frame failed: {err:#}");
                            remember_failure(&loop_failure, err);
                            elwt.exit();
                        }
                    },
                    _ => {}
                }
            }
            Event::AboutToWait => {
                let now = Instant::now();
                if state.scheduler.ready_for_frame(now) {
                    trace!("scheduler: issuing redraw now");
                    state.window.request_redraw();
                    elwt.set_control_flow(ControlFlow::Wait);
                } else if let Some(deadline) = state.scheduler.next_deadline() {
                    trace!(
                        deadline_ms = deadline.saturating_duration_since(now).as_millis(),
                        "scheduler: waiting until next frame"
                    );
                    elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
                } else {
                    elwt.set_control_flow(ControlFlow::Wait);
                }
            }
            Event::LoopExiting => {
                if let Err(err) = state.shutdown() {
                    error!("shutdown failed: {err:#}");
                    remember_failure(&loop_failure, err);
                }
            }
            _ => {}
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))?;

    match failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn remember_failure(slot: &RefCell<Option<anyhow::Error>>, err: anyhow::Error) {
    let mut slot = slot.borrow_mut();
    if slot.is_none() {
        *slot = Some(err);
    }
}

fn grab_cursor(window: &Window) {
    let grabbed = window
        .set_cursor_grab(CursorGrabMode::Confined)
        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked));
    if let Err(err) = grabbed {
        warn!("failed to grab cursor: {err}");
    }
}
