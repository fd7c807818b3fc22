use std::path::PathBuf;

use anyhow::{Context, Result};
use democonfig::{resolve_shader_dir, DemoConfig};
use renderer::{GroupSize, WindowOptions};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::sim::{SlimeSettings, SlimeSim};

pub fn resolve_settings(args: &RunArgs, mut config: DemoConfig) -> Result<(WindowOptions, SlimeSettings)> {
    if let Some(body) = args.body {
        config.slime.body_count = body;
    }
    if args.fullscreen {
        config.window.fullscreen = true;
    }
    config
        .validate()
        .context("invalid simulation settings after applying command line flags")?;

    let (width, height) = (config.window.width, config.window.height);
    let window = WindowOptions {
        title: "slimesim".to_string(),
        size: (width, height),
        fullscreen: config.window.fullscreen,
        grab_cursor: config.window.grab_mouse,
        frame_rate: args.fps,
    };
    let compute = &config.compute;
    let settings = SlimeSettings {
        width,
        height,
        body_count: config.slime.body_count,
        group: GroupSize::new(compute.x_group_size, compute.y_group_size, compute.z_group_size),
        params: config.slime,
        seed: args.seed,
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
        seed = ?settings.seed,
        record = ?settings.record,
        "resolved simulation settings"
    );

    renderer::run(window, move |ctx| SlimeSim::new(ctx, settings))
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
    use renderer::VideoCodec;

    use crate::cli::Cli;

    fn args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["slimesim"];
        full.extend_from_slice(argv);
        Cli::try_parse_from(full).unwrap().run
    }

    #[test]
    fn config_supplies_tuning_and_flags_win() {
        let mut config = DemoConfig::default();
        config.slime.body_count = 100;
        config.compute.x_group_size = 32;
        config.window.width = 640;
        config.window.height = 360;

        let (window, settings) = resolve_settings(&args(&[]), config.clone()).unwrap();
        assert_eq!(settings.body_count, 100);
        assert_eq!(settings.group, GroupSize::new(32, 1, 1));
        assert_eq!(window.size, (640, 360));
        assert!(window.frame_rate.is_unlimited());
        assert!(settings.record.is_none());

        let (_, settings) =
            resolve_settings(&args(&["-b", "500", "--rv", "mp4v"]), config).unwrap();
        assert_eq!(settings.body_count, 500);
        let record = settings.record.unwrap();
        assert_eq!(record.codec, VideoCodec::Mp4v);
        assert_eq!((record.width, record.height), (640, 360));
    }
}
