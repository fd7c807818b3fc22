use std::path::PathBuf;

use anyhow::{Context, Result};
use democonfig::{resolve_shader_dir, DemoConfig};
use renderer::{GroupSize, WindowOptions};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::tracer::{RayTracer, TracerSettings};

pub fn resolve_settings(
    args: &RunArgs,
    mut config: DemoConfig,
) -> Result<(WindowOptions, TracerSettings)> {
    if let Some(fov) = args.fov {
        config.raytracer.fov = fov;
    }
    if args.fullscreen {
        config.window.fullscreen = true;
    }
    config
        .validate()
        .context("invalid ray tracer settings after applying command line flags")?;

    let (width, height) = (config.window.width, config.window.height);
    let window = WindowOptions {
        title: "raycompute".to_string(),
        size: (width, height),
        fullscreen: config.window.fullscreen,
        grab_cursor: config.window.grab_mouse,
        frame_rate: args.fps,
    };
    let compute = &config.compute;
    let settings = TracerSettings {
        width,
        height,
        group: GroupSize::new(compute.x_group_size, compute.y_group_size, compute.z_group_size),
        camera_position: config.raytracer.camera_position,
        fov: config.raytracer.fov,
        shader_dir: resolve_shader_dir(args.shader_dir.as_deref()),
        record: args.record.settings(width, height),
    };
    Ok((window, settings))
}

pub fn run(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let (config, source) = DemoConfig::discover(config_path.as_deref())?;
    let (window, settings) = resolve_settings(&args, config)?;
    tracing::debug!(
        config = ?source,
        shader_dir = %settings.shader_dir.display(),
        fps = %window.frame_rate,
        record = ?settings.record,
        "resolved ray tracer settings"
    );

    renderer::run(window, move |ctx| RayTracer::new(ctx, settings))
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::cli::Cli;

    fn args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["raycompute"];
        full.extend_from_slice(argv);
        Cli::try_parse_from(full).unwrap().run
    }

    #[test]
    fn camera_comes_from_config() {
        let (window, settings) = resolve_settings(&args(&[]), DemoConfig::default()).unwrap();
        assert_eq!(settings.camera_position, [14.0, 7.0, 20.0]);
        assert_eq!(settings.fov, 50.0);
        assert_eq!(settings.group, GroupSize::new(64, 1, 1));
        assert_eq!(window.title, "raycompute");
    }

    #[test]
    fn fov_flag_is_validated() {
        let (_, settings) =
            resolve_settings(&args(&["--fov", "75"]), DemoConfig::default()).unwrap();
        assert_eq!(settings.fov, 75.0);

        let err = resolve_settings(&args(&["--fov", "190"]), DemoConfig::default()).unwrap_err();
        assert!(format!("{err:#}").contains("fov"));
    }
}
