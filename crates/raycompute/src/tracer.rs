use std::path::PathBuf;

use anyhow::Result;
use renderer::gpu::{storage_texture_entry, uniform_entry, STORAGE_FORMAT};
use renderer::{
    ComputeCanvas, ComputeProgram, Demo, FrameTime, GpuContext, GroupSize, Key, RecordSettings,
    ShaderPrelude, UniformBuffer, UniformLayout, UniformType,
};

pub const RAY_SHADER: &str = "ray_cs.glsl";

pub const RAY_UNIFORMS: [(&str, UniformType); 6] = [
    ("SCREEN_WIDTH", UniformType::Int),
    ("SCREEN_HEIGHT", UniformType::Int),
    ("time", UniformType::Float),
    ("delta_time", UniformType::Float),
    ("CAM_POS", UniformType::Vec3),
    ("FOV", UniformType::Float),
];

#[derive(Debug, Clone)]
pub struct TracerSettings {
    pub width: u32,
    pub height: u32,
    pub group: GroupSize,
    pub camera_position: [f32; 3],
    pub fov: f32,
    pub shader_dir: PathBuf,
    pub record: Option<RecordSettings>,
}

pub fn ray_layout() -> Result<UniformLayout> {
    Ok(UniformLayout::new(RAY_UNIFORMS)?)
}

pub struct RayTracer {
    canvas: ComputeCanvas,
    program: ComputeProgram,
    uniforms: UniformBuffer,
    bind_group: wgpu::BindGroup,
    groups: [u32; 3],
}

impl RayTracer {
    pub fn new(ctx: &GpuContext, settings: TracerSettings) -> Result<Self> {
        let device = &ctx.device;
        let (width, height) = (settings.width, settings.height);

        let mut uniforms = UniformBuffer::new(device, "ray uniforms", ray_layout()?);
        uniforms.set("SCREEN_WIDTH", width);
        uniforms.set("SCREEN_HEIGHT", height);
        uniforms.set("CAM_POS", settings.camera_position);
        uniforms.set("FOV", settings.fov);

        let canvas = ComputeCanvas::new(
            ctx,
            &settings.shader_dir,
            width,
            height,
            settings.record.clone(),
        )?;
        let program = ComputeProgram::new(
            ctx,
            "ray tracer",
            &settings.shader_dir.join(RAY_SHADER),
            ShaderPrelude::new().with_uniforms(0, 0, uniforms.layout()),
            settings.group,
            &[
                uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                storage_texture_entry(1, STORAGE_FORMAT),
            ],
        )?;
        let bind_group = program.create_bind_group(
            device,
            &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(canvas.target().view()),
                },
            ],
        );

        let groups = program.groups_for_image(width, height);
        tracing::info!(
            width,
            height,
            local = %settings.group,
            global_x = groups[0],
            global_y = groups[1],
            global_z = groups[2],
            camera = ?settings.camera_position,
            fov = settings.fov,
            recording = canvas.is_recording(),
            "ray tracer ready"
        );

        Ok(Self {
            canvas,
            program,
            uniforms,
            bind_group,
            groups,
        })
    }
}

impl Demo for RayTracer {
    fn key_pressed(&mut self, key: &Key) {
        self.canvas.handle_key(key);
    }

    fn render(&mut self, ctx: &GpuContext, time: &FrameTime, view: &wgpu::TextureView) -> Result<()> {
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("ray frame"),
            });

        let plan = self.canvas.plan();
        if plan.step {
            self.uniforms.set("time", time.seconds);
            self.uniforms.set("delta_time", time.delta_ms);
            self.uniforms.flush(&ctx.queue);
            self.program
                .dispatch(&mut encoder, &self.bind_group, self.groups);
        }

        self.canvas.present(&mut encoder, view);
        ctx.queue.submit(Some(encoder.finish()));

        if plan.capture {
            self.canvas.capture(ctx)?;
        }
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.canvas.finish()
    }
}
