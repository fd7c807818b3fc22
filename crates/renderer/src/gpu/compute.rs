use std::path::Path;

use anyhow::{bail, Result};
use wgpu::naga::ShaderStage;

use crate::compile::{compile_shader_file, ShaderPrelude};
use crate::types::GroupSize;

use super::context::GpuContext;
use super::with_validation;

/// A compute pipeline with a single bind group at set 0.
pub struct ComputeProgram {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    group_size: GroupSize,
    label: String,
}

impl ComputeProgram {
    /// Compiles `path` with `group` substituted into its `local_size_*`
    /// tokens. `entries` describe set 0 as the shader declares it.
    pub fn new(
        ctx: &GpuContext,
        label: &str,
        path: &Path,
        prelude: ShaderPrelude<'_>,
        group: GroupSize,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Result<Self> {
        check_group_size(ctx.limits(), group)?;
        let device = &ctx.device;

        let prelude = prelude.with_group_size(group);
        let module = compile_shader_file(device, path, &prelude, ShaderStage::Compute)?;

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = with_validation(device, label, || {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            })
        })?;

        tracing::debug!(label, %group, path = %path.display(), "compute program ready");
        Ok(Self {
            pipeline,
            layout,
            group_size: group,
            label: label.to_string(),
        })
    }

    pub fn create_bind_group(
        &self,
        device: &wgpu::Device,
        entries: &[wgpu::BindGroupEntry<'_>],
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&self.label),
            layout: &self.layout,
            entries,
        })
    }

    /// Workgroup counts covering a `width` x `height` image, one invocation
    /// per pixel.
    pub fn groups_for_image(&self, width: u32, height: u32) -> [u32; 3] {
        [
            workgroup_count(width, self.group_size.x),
            workgroup_count(height, self.group_size.y),
            1,
        ]
    }

    /// Workgroup counts covering `items` invocations. Groups fill x first
    /// and spill into y, then z, once a dimension reaches
    /// `max_per_dimension`; the shader linearises its global id.
    pub fn groups_for_items(&self, items: u32, max_per_dimension: u32) -> [u32; 3] {
        let per_group = u32::try_from(self.group_size.invocations()).unwrap_or(u32::MAX);
        spread_workgroups(workgroup_count(items, per_group), max_per_dimension)
    }

    pub fn dispatch(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bind_group: &wgpu::BindGroup,
        groups: [u32; 3],
    ) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(&self.label),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, Some(bind_group), &[]);
        pass.dispatch_workgroups(groups[0], groups[1], groups[2]);
    }
}

/// Number of workgroups of `group` invocations needed to cover `extent`.
/// Always at least one so an empty extent still dispatches.
pub fn workgroup_count(extent: u32, group: u32) -> u32 {
    extent.div_ceil(group.max(1)).max(1)
}

/// Folds a flat workgroup count into x, y and z so no dimension exceeds
/// `max_per_dimension`. The product may overshoot `groups`.
pub fn spread_workgroups(groups: u32, max_per_dimension: u32) -> [u32; 3] {
    let max = max_per_dimension.max(1);
    let x = groups.clamp(1, max);
    let rows = groups.div_ceil(x);
    let y = rows.clamp(1, max);
    let z = rows.div_ceil(y).max(1);
    [x, y, z]
}

fn check_group_size(limits: &wgpu::Limits, group: GroupSize) -> Result<()> {
    if group.x == 0 || group.y == 0 || group.z == 0 {
        bail!("workgroup size {group} has a zero dimension");
    }
    if group.x > limits.max_compute_workgroup_size_x
        || group.y > limits.max_compute_workgroup_size_y
        || group.z > limits.max_compute_workgroup_size_z
    {
        bail!(
            "workgroup size {group} exceeds device limits {}x{}x{}",
            limits.max_compute_workgroup_size_x,
            limits.max_compute_workgroup_size_y,
            limits.max_compute_workgroup_size_z
        );
    }
    if group.invocations() > u64::from(limits.max_compute_invocations_per_workgroup) {
        bail!(
            "workgroup size {group} needs {} invocations; device allows {}",
            group.invocations(),
            limits.max_compute_invocations_per_workgroup
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workgroup_count_rounds_up() {
        assert_eq!(workgroup_count(1280, 64), 20);
        assert_eq!(workgroup_count(1281, 64), 21);
        assert_eq!(workgroup_count(800, 1), 800);
        assert_eq!(workgroup_count(0, 64), 1);
        assert_eq!(workgroup_count(10, 0), 10);
    }

    #[test]
    fn large_item_counts_spill_into_y() {
        let max = wgpu::Limits::default().max_compute_workgroups_per_dimension;
        assert_eq!(spread_workgroups(20, max), [20, 1, 1]);
        assert_eq!(spread_workgroups(0, max), [1, 1, 1]);

        // Five million agents at 64 per group need 78125 groups.
        let groups = spread_workgroups(workgroup_count(5_000_000, 64), max);
        assert_eq!(groups, [max, 2, 1]);
        let covered = u64::from(groups[0]) * u64::from(groups[1]) * u64::from(groups[2]) * 64;
        assert!(covered >= 5_000_000);

        assert_eq!(spread_workgroups(10, 3), [3, 3, 2]);
        assert_eq!(spread_workgroups(u32::MAX, max).iter().max(), Some(&max));
    }

    #[test]
    fn group_size_checked_against_limits() {
        let limits = wgpu::Limits::default();
        assert!(check_group_size(&limits, GroupSize::new(64, 1, 1)).is_ok());
        assert!(check_group_size(&limits, GroupSize::new(16, 16, 1)).is_ok());

        let err = check_group_size(&limits, GroupSize::new(0, 1, 1)).unwrap_err();
        assert!(err.to_string().contains("zero"));

        let err = check_group_size(&limits, GroupSize::new(32, 32, 1)).unwrap_err();
        assert!(err.to_string().contains("invocations"));

        let err = check_group_size(&limits, GroupSize::new(1, 1, 128)).unwrap_err();
        assert!(err.to_string().contains("device limits"));
    }
}
