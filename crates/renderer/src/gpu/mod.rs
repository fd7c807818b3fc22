//! GPU plumbing shared by every demo.
//!
//! - `context` owns the wgpu instance/device/surface and rebuilds the
//!   swapchain when the window resizes.
//! - `pipeline` turns compiled GLSL into fullscreen render pipelines and the
//!   blit that shows a compute result on screen.
//! - `compute` wraps compute pipelines together with their bind group layout
//!   and workgroup sizing.
//! - `target` holds the storage texture compute shaders write into and knows
//!   how to read it back for video capture.
//! - `bindings` has the layout entry helpers used by all of the above.

mod bindings;
mod compute;
mod context;
mod pipeline;
mod target;

use anyhow::{anyhow, Result};

pub use bindings::{
    sampler_entry, storage_buffer_entry, storage_texture_entry, texture_entry, uniform_entry,
};
pub use compute::{spread_workgroups, workgroup_count, ComputeProgram};
pub use context::GpuContext;
pub use pipeline::{BlitProgram, FullscreenProgram};
pub use target::{into_top_down, padded_bytes_per_row, unpad_rows, StorageTarget, STORAGE_FORMAT};

/// Runs `create` inside a validation error scope and surfaces the first error.
pub(crate) fn with_validation<T>(
    device: &wgpu::Device,
    what: &str,
    create: impl FnOnce() -> T,
) -> Result<T> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(anyhow!("{what}: {err}")),
        None => Ok(value),
    }
}
