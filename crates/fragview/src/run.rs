use std::path::PathBuf;

use anyhow::{Context, Result};
use democonfig::{resolve_shader_dir, DemoConfig};
use renderer::{FrameRateCap, WindowOptions};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::viewer::Viewer;

#[derive(Debug, Clone)]
pub struct ViewerSettings {
    pub model: String,
    pub shader_dir: PathBuf,
    pub initial_scroll: f32,
    pub window: WindowOptions,
}

/// Folds the command line over the loaded configuration and re-validates the
/// result.
pub fn resolve_settings(args: &RunArgs, mut config: DemoConfig) -> Result<ViewerSettings> {
    if let Some(model) = &args.model {
        config.viewer.model = model.clone();
    }
    if let Some(cap) = args.fps {
        config.viewer.max_fps = cap.fps().unwrap_or(-1.0);
    }
    if let Some((width, height)) = args.size {
        config.window.width = width;
        config.window.height = height;
    }
    if args.fullscreen {
        config.window.fullscreen = true;
    }
    config
        .validate()
        .context("invalid viewer settings after applying command line flags")?;

    let model = config.viewer.model;
    Ok(ViewerSettings {
        window: WindowOptions {
            title: format!("fragview: {model}"),
            size: (config.window.width, config.window.height),
            fullscreen: config.window.fullscreen,
            grab_cursor: config.window.grab_mouse,
            frame_rate: FrameRateCap::new(config.viewer.max_fps),
        },
        model,
        shader_dir: resolve_shader_dir(args.shader_dir.as_deref()),
        initial_scroll: config.viewer.initial_scroll,
    })
}

pub fn run(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let (config, source) = DemoConfig::discover(config_path.as_deref())?;
    let settings = resolve_settings(&args, config)?;
    tracing::debug!(
        config = ?source,
        model = %settings.model,
        shader_dir = %settings.shader_dir.display(),
        fps = %settings.window.frame_rate,
        "resolved viewer settings"
    );

    let ViewerSettings {
        model,
        shader_dir,
        initial_scroll,
        window,
    } = settings;
    renderer::run(window, move |ctx| {
        Viewer::new(ctx, &shader_dir, &model, initial_scroll)
    })
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
        let mut full = vec!["fragview"];
        full.extend_from_slice(argv);
        Cli::try_parse_from(full).unwrap().run
    }

    #[test]
    fn defaults_come_from_config() {
        let settings = resolve_settings(&args(&[]), DemoConfig::default()).unwrap();
        assert_eq!(settings.model, "default");
        assert_eq!(settings.initial_scroll, 5.0);
        assert_eq!(settings.window.size, (1280, 800));
        assert_eq!(settings.window.frame_rate.fps(), Some(60.0));
    }

    #[test]
    fn flags_override_config() {
        let settings = resolve_settings(
            &args(&["--model", "ray", "--fps", "-1", "--size", "320x200", "--fullscreen"]),
            DemoConfig::default(),
        )
        .unwrap();
        assert_eq!(settings.model, "ray");
        assert!(settings.window.frame_rate.is_unlimited());
        assert_eq!(settings.window.size, (320, 200));
        assert!(settings.window.fullscreen);
    }

    #[test]
    fn rejects_model_paths() {
        let err = resolve_settings(&args(&["--model", "../secret"]), DemoConfig::default())
            .unwrap_err();
        assert!(format!("{err:#}").contains("bare shader name"));
    }
}
