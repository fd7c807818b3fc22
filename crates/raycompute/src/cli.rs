use std::path::PathBuf;

use clap::{Parser, Subcommand};
use democonfig::ConfigCommand;
use renderer::{FrameRateCap, RecordArgs};

#[derive(Parser, Debug)]
#[command(
    name = "raycompute",
    author,
    version,
    about = "Compute shader ray tracer",
    arg_required_else_help = false
)]
pub struct Cli {
    /// Configuration file to load instead of the per-user `config.toml`.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Frame rate cap; -1 renders as fast as possible.
    #[arg(
        short,
        long,
        value_name = "FPS",
        default_value = "-1",
        allow_negative_numbers = true
    )]
    pub fps: FrameRateCap,

    /// Vertical field of view in degrees (defaults to `raytracer.fov`).
    #[arg(long, value_name = "DEGREES")]
    pub fov: Option<f32>,

    /// Directory holding the GLSL sources (defaults to `$SHADERDEMOS_SHADER_DIR` or `./shaders`).
    #[arg(long, value_name = "DIR")]
    pub shader_dir: Option<PathBuf>,

    /// Open a borderless fullscreen window.
    #[arg(long)]
    pub fullscreen: bool,

    #[command(flatten)]
    pub record: RecordArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect or create the configuration file.
    Config(ConfigCommand),
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer::VideoCodec;

    fn parse_from(argv: &[&str]) -> Cli {
        let mut full = vec!["raycompute"];
        full.extend_from_slice(argv);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn defaults_render_unthrottled_without_recording() {
        let cli = parse_from(&[]);
        assert!(cli.run.fps.is_unlimited());
        assert_eq!(cli.run.fov, None);
        assert!(cli.run.record.settings(1280, 800).is_none());
        assert!(cli.command.is_none());
    }

    #[test]
    fn png_sequence_recording() {
        let cli = parse_from(&["--fps", "24", "--rv", "png", "--video-output", "frames"]);
        assert_eq!(cli.run.fps.fps(), Some(24.0));
        let settings = cli.run.record.settings(320, 200).unwrap();
        assert_eq!(settings.codec, VideoCodec::PngSequence);
        assert_eq!(settings.frame_dir(), PathBuf::from("frames"));
        assert_eq!(settings.fps, 60);
    }

    #[test]
    fn empty_codec_disables_recording() {
        let cli = parse_from(&["--record-video", ""]);
        assert!(cli.run.record.settings(8, 8).is_none());
    }
}
