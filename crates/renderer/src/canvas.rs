use std::path::Path;

use anyhow::{Context, Result};
use winit::keyboard::Key;

use crate::gpu::{BlitProgram, GpuContext, StorageTarget};
use crate::record::{RecordSettings, Recorder};

/// What a compute demo does with one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePlan {
    /// Dispatch the compute passes and advance the simulation.
    pub step: bool,
    /// Read the image back into the recorder.
    pub capture: bool,
}

impl FramePlan {
    /// Paused frames are not stepped but are still recorded.
    pub fn new(paused: bool, recording: bool) -> Self {
        Self {
            step: !paused,
            capture: recording,
        }
    }
}

/// Output side of the compute demos: the storage image the shaders write,
/// the blit that puts it on screen, the pause toggle and optional recording.
pub struct ComputeCanvas {
    target: StorageTarget,
    blit: BlitProgram,
    recorder: Option<Recorder>,
    paused: bool,
}

impl ComputeCanvas {
    pub fn new(
        ctx: &GpuContext,
        shader_dir: &Path,
        width: u32,
        height: u32,
        recording: Option<RecordSettings>,
    ) -> Result<Self> {
        let mut target = StorageTarget::new(&ctx.device, "compute output", width, height);
        let blit = BlitProgram::new(ctx, shader_dir, &target)?;
        let recorder = match recording {
            Some(settings) => {
                target.enable_readback(&ctx.device);
                Some(Recorder::start(&settings).context("failed to start video recording")?)
            }
            None => None,
        };

        Ok(Self {
            target,
            blit,
            recorder,
            paused: false,
        })
    }

    pub fn target(&self) -> &StorageTarget {
        &self.target
    }

    pub fn plan(&self) -> FramePlan {
        FramePlan::new(self.paused, self.is_recording())
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    /// Toggles the pause state on `P`. Returns whether the key was used.
    pub fn handle_key(&mut self, key: &Key) -> bool {
        if is_pause_key(key) {
            self.paused = !self.paused;
            tracing::info!(paused = self.paused, "simulation pause toggled");
            true
        } else {
            false
        }
    }

    pub fn present(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        self.blit.draw(encoder, view);
    }

    /// Sends the current image to the recorder, if any. Call after the frame's
    /// commands were submitted.
    pub fn capture(&self, ctx: &GpuContext) -> Result<()> {
        let Some(recorder) = &self.recorder else {
            return Ok(());
        };
        let frame = self.target.read_rgba(ctx)?;
        recorder.capture(frame)?;
        Ok(())
    }

    /// Flushes and closes the recorder.
    pub fn finish(&mut self) -> Result<()> {
        if let Some(recorder) = self.recorder.take() {
            let frames = recorder.finish()?;
            tracing::info!(frames, "video recording finished");
        }
        Ok(())
    }
}

pub fn is_pause_key(key: &Key) -> bool {
    matches!(key, Key::Character(value) if value.eq_ignore_ascii_case("p"))
}
