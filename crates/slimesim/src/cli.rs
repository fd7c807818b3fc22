use std::path::PathBuf;

use clap::{Parser, Subcommand};
use democonfig::ConfigCommand;
use renderer::{FrameRateCap, RecordArgs};

#[derive(Parser, Debug)]
#[command(
    name = "slimesim",
    author,
    version,
    about = "Compute shader slime mould simulation",
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

    /// Number of agents (defaults to `slime.body_count`, 4096).
    #[arg(short, long = "body", value_name = "COUNT", value_parser = clap::value_parser!(u32).range(1..))]
    pub body: Option<u32>,

    /// Seed for the initial agent placement; random when omitted.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

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
