use std::path::Path;

use anyhow::{Context, Result};
use renderer::compile::compile_program;
use renderer::gpu::uniform_entry;
use renderer::{
    Demo, FrameTime, FullscreenProgram, GpuContext, PhysicalSize, ShaderPrelude, UniformBuffer,
    UniformLayout, UniformType,
};

/// Uniforms every viewer model can read, in block order.
pub const VIEWER_UNIFORMS: [(&str, UniformType); 5] = [
    ("u_resolution", UniformType::Vec2),
    ("u_mouse", UniformType::Vec2),
    ("u_scroll", UniformType::Float),
    ("u_time", UniformType::Float),
    ("u_frames", UniformType::Int),
];

/// Wheel-driven zoom factor that never drops below 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollZoom(f32);

impl ScrollZoom {
    pub const MIN: f32 = 1.0;

    pub fn new(initial: f32) -> Self {
        Self(initial.max(Self::MIN))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    pub fn apply(&mut self, lines: f32) -> f32 {
        self.0 = (self.0 + lines).max(Self::MIN);
        self.0
    }
}

/// `u_frames` counts the frame being drawn, starting at 1.
pub fn frames_uniform(frame: u64) -> i32 {
    i32::try_from(frame.saturating_add(1)).unwrap_or(i32::MAX)
}

pub fn viewer_layout() -> Result<UniformLayout> {
    Ok(UniformLayout::new(VIEWER_UNIFORMS)?)
}

pub struct Viewer {
    program: FullscreenProgram,
    uniforms: UniformBuffer,
    bind_group: wgpu::BindGroup,
    scroll: ScrollZoom,
    model: String,
}

impl Viewer {
    pub fn new(ctx: &GpuContext, shader_dir: &Path, model: &str, initial_scroll: f32) -> Result<Self> {
        let device = &ctx.device;
        let mut uniforms = UniformBuffer::new(device, "viewer uniforms", viewer_layout()?);

        let prelude = ShaderPrelude::new().with_uniforms(0, 0, uniforms.layout());
        let modules = compile_program(device, shader_dir, model, &prelude)
            .with_context(|| format!("failed to build shader model '{model}'"))?;

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("viewer uniforms"),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            )],
        });
        let program =
            FullscreenProgram::new(device, model, &modules, &[&layout], ctx.surface_format())?;
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("viewer uniforms"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.binding(),
            }],
        });

        let scroll = ScrollZoom::new(initial_scroll);
        let size = ctx.size();
        uniforms.set("u_resolution", (size.width as f32, size.height as f32));
        uniforms.set("u_scroll", scroll.value());

        tracing::info!(model, shader_dir = %shader_dir.display(), "viewer model loaded");
        Ok(Self {
            program,
            uniforms,
            bind_group,
            scroll,
            model: model.to_string(),
        })
    }
}

impl Demo for Viewer {
    fn resize(&mut self, _ctx: &GpuContext, size: PhysicalSize<u32>) {
        self.uniforms
            .set("u_resolution", (size.width as f32, size.height as f32));
    }

    fn cursor_moved(&mut self, x: f32, y: f32) {
        self.uniforms.set("u_mouse", (x, y));
    }

    fn scrolled(&mut self, _x: f32, y: f32) {
        let zoom = self.scroll.apply(y);
        tracing::trace!(zoom, "scroll");
        self.uniforms.set("u_scroll", zoom);
    }

    fn render(&mut self, ctx: &GpuContext, time: &FrameTime, view: &wgpu::TextureView) -> Result<()> {
        self.uniforms.set("u_time", time.seconds);
        self.uniforms.set("u_frames", frames_uniform(time.frame));
        self.uniforms.flush(&ctx.queue);

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(&self.model),
            });
        self.program.draw(&mut encoder, view, &[&self.bind_group]);
        ctx.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}
