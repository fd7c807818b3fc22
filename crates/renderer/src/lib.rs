//! Shared scaffold for the shader demos.
//!
//! Each demo binary implements [`Demo`] and hands it to [`run`], which owns
//! the window, the GPU context and the frame loop:
//!
//! ```text
//!   binary (cli + config)
//!          │ WindowOptions, build closure
//!          ▼
//!   window::run ──▶ GpuContext::new ──▶ build(&ctx) -> impl Demo
//!          │
//!          └─▶ winit loop ──▶ FrameScheduler ──▶ Demo::render ──▶ present
//!                                                     │
//!                             UniformBuffer::flush ◀──┘──▶ ComputeCanvas::capture ─▶ Recorder
//! ```
//!
//! Shaders are plain GLSL files. [`compile::prepare_source`] injects a std140
//! uniform block generated from a [`UniformLayout`] and substitutes the
//! workgroup size tokens before naga compiles them.

pub mod canvas;
pub mod compile;
pub mod fps;
pub mod gpu;
pub mod record;
pub mod runtime;
pub mod types;
pub mod uniforms;
pub mod window;

pub use canvas::{ComputeCanvas, FramePlan};
pub use compile::ShaderPrelude;
pub use gpu::{ComputeProgram, FullscreenProgram, GpuContext, StorageTarget};
pub use record::{RecordArgs, RecordSettings, Recorder, VideoCodec};
pub use runtime::{FrameRateCap, FrameTime};
pub use types::GroupSize;
pub use uniforms::{UniformBuffer, UniformLayout, UniformType, UniformValue};
pub use window::{run, Demo, WindowOptions};

pub use winit::dpi::PhysicalSize;
pub use winit::keyboard::Key;
