use std::path::PathBuf;

use clap::{Parser, Subcommand};
use democonfig::ConfigCommand;
use renderer::FrameRateCap;

#[derive(Parser, Debug)]
#[command(
    name = "fragview",
    author,
    version,
    about = "Fullscreen fragment shader viewer",
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
    /// Shader model to display; loads `<MODEL>_fs.glsl` and an optional `<MODEL>_vs.glsl`.
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Frame rate cap; -1 or 0 renders as fast as possible.
    #[arg(short, long, value_name = "FPS", allow_negative_numbers = true)]
    pub fps: Option<FrameRateCap>,

    /// Directory holding the GLSL sources (defaults to `$SHADERDEMOS_SHADER_DIR` or `./shaders`).
    #[arg(long, value_name = "DIR")]
    pub shader_dir: Option<PathBuf>,

    /// Override the window size (e.g. `1920x1080`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Open a borderless fullscreen window.
    #[arg(long)]
    pub fullscreen: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect or create the configuration file.
    Config(ConfigCommand),
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width '{w}'"))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height '{h}'"))?;
    if width == 0 || height == 0 {
        return Err("window size must be greater than zero".into());
    }
    Ok((width, height))
}
