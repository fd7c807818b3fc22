use std::mem::size_of;
use std::path::PathBuf;

use anyhow::{bail, Result};
use democonfig::SlimeConfig;
use renderer::fps::fps_title;
use renderer::gpu::{storage_buffer_entry, storage_texture_entry, uniform_entry, STORAGE_FORMAT};
use renderer::{
    ComputeCanvas, ComputeProgram, Demo, FrameTime, GpuContext, GroupSize, Key, RecordSettings,
    ShaderPrelude, UniformBuffer, UniformLayout, UniformType, UniformValue,
};
use wgpu::util::DeviceExt;

use crate::bodies::{generate_bodies, seeded_rng, Body};

pub const AGENTS_SHADER: &str = "slime_agents_cs.glsl";
pub const DIFFUSE_SHADER: &str = "slime_diffuse_cs.glsl";

pub const SLIME_UNIFORMS: [(&str, UniformType); 15] = [
    ("SCREEN_WIDTH", UniformType::Int),
    ("SCREEN_HEIGHT", UniformType::Int),
    ("NB_BODY", UniformType::Int),
    ("SPEED_RATE", UniformType::Float),
    ("FADE_RATE", UniformType::Float),
    ("TURN_SPEED", UniformType::Float),
    ("DIFFUSE_RATE", UniformType::Float),
    ("SENSOR_ANGLE", UniformType::Float),
    ("SENSOR_DIST", UniformType::Float),
    ("SENSOR_SIZE", UniformType::Int),
    ("SENSOR_WEIGHT", UniformType::Float),
    ("COLOR", UniformType::Vec3),
    ("RANDOM_DIRECTION_STRENGTH", UniformType::Float),
    ("time", UniformType::Float),
    ("delta_time", UniformType::Float),
];

#[derive(Debug, Clone)]
pub struct SlimeSettings {
    pub width: u32,
    pub height: u32,
    pub body_count: u32,
    pub group: GroupSize,
    pub params: SlimeConfig,
    pub seed: Option<u64>,
    pub shader_dir: PathBuf,
    pub record: Option<RecordSettings>,
}

impl SlimeSettings {
    /// Values that stay fixed for the whole run.
    pub fn constant_uniforms(&self) -> Vec<(&'static str, UniformValue)> {
        let p = &self.params;
        vec![
            ("SCREEN_WIDTH", self.width.into()),
            ("SCREEN_HEIGHT", self.height.into()),
            ("NB_BODY", self.body_count.into()),
            ("SPEED_RATE", p.speed_rate.into()),
            ("FADE_RATE", p.fade_rate.into()),
            ("TURN_SPEED", p.turn_speed.into()),
            ("DIFFUSE_RATE", p.diffuse_rate.into()),
            ("SENSOR_ANGLE", p.sensor_angle.into()),
            ("SENSOR_DIST", p.sensor_dist.into()),
            ("SENSOR_SIZE", p.sensor_size.into()),
            ("SENSOR_WEIGHT", p.sensor_weight.into()),
            ("COLOR", p.color.into()),
            ("RANDOM_DIRECTION_STRENGTH", p.random_direction_strength.into()),
        ]
    }
}

pub fn slime_layout() -> Result<UniformLayout> {
    Ok(UniformLayout::new(SLIME_UNIFORMS)?)
}

/// One `f32` of pheromone per pixel.
pub fn trail_buffer_size(width: u32, height: u32) -> u64 {
    u64::from(width) * u64::from(height) * size_of::<f32>() as u64
}

pub fn check_storage_size(limits: &wgpu::Limits, what: &str, bytes: u64) -> Result<()> {
    let max = u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);
    if bytes > max {
        bail!("{what} needs {bytes} bytes but the device allows {max} per storage buffer");
    }
    Ok(())
}

pub fn check_dispatch(limits: &wgpu::Limits, what: &str, groups: [u32; 3]) -> Result<()> {
    let max = limits.max_compute_workgroups_per_dimension;
    if groups.iter().any(|&count| count > max) {
        bail!(
            "{what} needs {}x{}x{} workgroups but the device allows {max} per dimension",
            groups[0],
            groups[1],
            groups[2]
        );
    }
    Ok(())
}

/// Agents deposit into one trail buffer; the diffuse pass blurs and fades it
/// into the other while colouring the output image. The two swap every step.
pub struct SlimeSim {
    canvas: ComputeCanvas,
    agents: ComputeProgram,
    diffuse: ComputeProgram,
    uniforms: UniformBuffer,
    agent_bind_groups: [wgpu::BindGroup; 2],
    diffuse_bind_groups: [wgpu::BindGroup; 2],
    agent_groups: [u32; 3],
    diffuse_groups: [u32; 3],
    parity: usize,
    body_count: u32,
    _bodies: wgpu::Buffer,
    _trails: [wgpu::Buffer; 2],
}

impl SlimeSim {
    pub fn new(ctx: &GpuContext, settings: SlimeSettings) -> Result<Self> {
        let device = &ctx.device;
        let limits = ctx.limits();
        let (width, height) = (settings.width, settings.height);

        let body_bytes = u64::from(settings.body_count) * size_of::<Body>() as u64;
        check_storage_size(limits, "body buffer", body_bytes)?;
        let trail_bytes = trail_buffer_size(width, height);
        check_storage_size(limits, "trail map", trail_bytes)?;

        let mut uniforms = UniformBuffer::new(device, "slime uniforms", slime_layout()?);
        for (name, value) in settings.constant_uniforms() {
            uniforms.set(name, value);
        }

        let canvas = ComputeCanvas::new(
            ctx,
            &settings.shader_dir,
            width,
            height,
            settings.record.clone(),
        )?;

        let agents = ComputeProgram::new(
            ctx,
            "slime agents",
            &settings.shader_dir.join(AGENTS_SHADER),
            ShaderPrelude::new().with_uniforms(0, 0, uniforms.layout()),
            settings.group,
            &[
                uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                storage_buffer_entry(1, false),
                storage_buffer_entry(2, false),
            ],
        )?;
        let diffuse = ComputeProgram::new(
            ctx,
            "slime diffuse",
            &settings.shader_dir.join(DIFFUSE_SHADER),
            ShaderPrelude::new().with_uniforms(0, 0, uniforms.layout()),
            settings.group,
            &[
                uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                storage_buffer_entry(1, true),
                storage_buffer_entry(2, false),
                storage_texture_entry(3, STORAGE_FORMAT),
            ],
        )?;

        let agent_groups =
            agents.groups_for_items(settings.body_count, limits.max_compute_workgroups_per_dimension);
        let diffuse_groups = diffuse.groups_for_image(width, height);
        check_dispatch(limits, "agent pass", agent_groups)?;
        check_dispatch(limits, "diffuse pass", diffuse_groups)?;

        let bodies = generate_bodies(settings.body_count, &mut seeded_rng(settings.seed));
        let body_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("slime bodies"),
            contents: bytemuck::cast_slice(&bodies),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let trails = [0, 1].map(|index| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(if index == 0 { "slime trail a" } else { "slime trail b" }),
                size: trail_bytes,
                usage: wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            })
        });

        let agent_bind_groups = [0, 1].map(|parity| {
            agents.create_bind_group(
                device,
                &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniforms.binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: body_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: trails[parity].as_entire_binding(),
                    },
                ],
            )
        });
        let diffuse_bind_groups = [0, 1].map(|parity| {
            diffuse.create_bind_group(
                device,
                &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniforms.binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: trails[parity].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: trails[1 - parity].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(canvas.target().view()),
                    },
                ],
            )
        });

        tracing::info!(
            width,
            height,
            local = %settings.group,
            global_x = diffuse_groups[0],
            global_y = diffuse_groups[1],
            global_z = diffuse_groups[2],
            agent_groups = ?agent_groups,
            bodies = settings.body_count,
            recording = canvas.is_recording(),
            "slime simulation ready"
        );

        Ok(Self {
            canvas,
            agents,
            diffuse,
            uniforms,
            agent_bind_groups,
            diffuse_bind_groups,
            agent_groups,
            diffuse_groups,
            parity: 0,
            body_count: settings.body_count,
            _bodies: body_buffer,
            _trails: trails,
        })
    }
}

impl Demo for SlimeSim {
    fn title(&self, fps: f32) -> String {
        format!("{} | BODY: {}", fps_title(fps), self.body_count)
    }

    fn key_pressed(&mut self, key: &Key) {
        self.canvas.handle_key(key);
    }

    fn render(&mut self, ctx: &GpuContext, time: &FrameTime, view: &wgpu::TextureView) -> Result<()> {
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("slime frame"),
            });

        let plan = self.canvas.plan();
        if plan.step {
            self.uniforms.set("time", time.seconds);
            self.uniforms.set("delta_time", time.delta_ms);
            self.uniforms.flush(&ctx.queue);

            self.agents.dispatch(
                &mut encoder,
                &self.agent_bind_groups[self.parity],
                self.agent_groups,
            );
            self.diffuse.dispatch(
                &mut encoder,
                &self.diffuse_bind_groups[self.parity],
                self.diffuse_groups,
            );
            self.parity = 1 - self.parity;
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

#[cfg(test)]
mod tests {
    use super::*;
    use renderer::gpu::{spread_workgroups, workgroup_count};
    use renderer::uniforms::UniformBlock;

    fn constant_block(settings: &SlimeSettings) -> Result<UniformBlock> {
        let mut block = UniformBlock::new(slime_layout()?);
        for (name, value) in settings.constant_uniforms() {
            block.try_set(name, value)?;
        }
        Ok(block)
    }

    fn settings() -> SlimeSettings {
        SlimeSettings {
            width: 1280,
            height: 800,
            body_count: 4096,
            group: GroupSize::default(),
            params: SlimeConfig::default(),
            seed: Some(3),
            shader_dir: PathBuf::from("shaders"),
            record: None,
        }
    }

    #[test]
    fn constants_fit_the_uniform_block() {
        let block = constant_block(&settings()).unwrap();
        assert_eq!(block.get("NB_BODY"), Some(UniformValue::Int(4096)));
        assert_eq!(block.get("SCREEN_HEIGHT"), Some(UniformValue::Int(800)));
        assert_eq!(block.get("SENSOR_SIZE"), Some(UniformValue::Int(1)));
        assert_eq!(
            block.get("COLOR"),
            Some(UniformValue::Vec3([0.4, 0.7, 0.9]))
        );
        assert_eq!(block.get("time"), Some(UniformValue::Float(0.0)));
    }

    #[test]
    fn every_layout_slot_is_named_once() {
        let layout = slime_layout().unwrap();
        assert_eq!(layout.fields().len(), SLIME_UNIFORMS.len());
        let constants = settings().constant_uniforms();
        for (name, _) in &constants {
            assert!(layout.field(name).is_some(), "{name} missing from layout");
        }
        assert_eq!(constants.len() + 2, SLIME_UNIFORMS.len());
    }

    #[test]
    fn trail_map_is_one_float_per_pixel() {
        assert_eq!(trail_buffer_size(1280, 800), 1280 * 800 * 4);
    }

    #[test]
    fn storage_and_dispatch_limits() {
        let limits = wgpu::Limits::default();
        assert!(check_storage_size(&limits, "trail map", trail_buffer_size(1280, 800)).is_ok());
        let too_big = u64::from(limits.max_storage_buffer_binding_size) + 1;
        let err = check_storage_size(&limits, "body buffer", too_big).unwrap_err();
        assert!(err.to_string().contains("body buffer"));

        assert!(check_dispatch(&limits, "agents", [64, 1, 1]).is_ok());
        let over = limits.max_compute_workgroups_per_dimension + 1;
        assert!(check_dispatch(&limits, "agents", [over, 1, 1]).is_err());

        let max = limits.max_compute_workgroups_per_dimension;
        let groups = spread_workgroups(workgroup_count(5_000_000, 64), max);
        assert!(check_dispatch(&limits, "agents", groups).is_ok());
    }
}
