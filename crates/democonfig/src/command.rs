use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::{resolve_config_path, AppPaths, ConfigError, DemoConfig};

/// `config` subcommand shared by every demo binary.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Write a configuration file filled with the defaults.
    Init {
        /// Destination file; defaults to the per-user config file.
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Print where the per-user config file is looked up.
    Path,
}

/// Executes `action` against the config selected by `explicit` (the global
/// `--config` flag) and writes human output to `out`.
pub fn run_config_command<W: Write>(
    action: &ConfigAction,
    explicit: Option<&Path>,
    out: &mut W,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Show => {
            let (config, source) = DemoConfig::discover(explicit)?;
            match &source {
                Some(path) => emit(out, &format!("# source: {}", path.display()))?,
                None => emit(out, "# source: built-in defaults")?,
            }
            emit(out, config.to_toml_string()?.trim_end())
        }
        ConfigAction::Init { path, force } => {
            let target = match path.as_deref().or(explicit) {
                Some(path) => path.to_path_buf(),
                None => user_config_file()?,
            };
            if target.exists() && !force {
                return Err(ConfigError::Invalid(format!(
                    "{} already exists; pass --force to overwrite it",
                    target.display()
                )));
            }
            DemoConfig::default().write(&target)?;
            emit(out, &format!("wrote default configuration to {}", target.display()))
        }
        ConfigAction::Path => {
            let file = user_config_file()?;
            let status = if resolve_config_path(None).is_some() {
                "present"
            } else {
                "missing"
            };
            emit(out, &format!("{} ({status})", file.display()))
        }
    }
}

fn user_config_file() -> Result<PathBuf, ConfigError> {
    AppPaths::discover()
        .map(|paths| paths.config_file())
        .ok_or_else(|| {
            ConfigError::Invalid("no user config directory is available; pass a PATH".into())
        })
}

fn emit<W: Write>(out: &mut W, line: &str) -> Result<(), ConfigError> {
    writeln!(out, "{line}").map_err(|source| ConfigError::Io {
        path: PathBuf::from("<stdout>"),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn run(action: ConfigAction, explicit: Option<&Path>) -> Result<String, ConfigError> {
        let mut out = Vec::new();
        run_config_command(&action, explicit, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn init_then_show_round_trips_defaults() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("nested/config.toml");

        let message = run(
            ConfigAction::Init {
                path: Some(file.clone()),
                force: false,
            },
            None,
        )
        .unwrap();
        assert!(message.contains("wrote default configuration"));

        let shown = run(ConfigAction::Show, Some(&file)).unwrap();
        assert!(shown.starts_with("# source: "));
        assert!(shown.contains("[slime]"));
        assert!(shown.contains("body_count = 4096"));
        let reparsed = DemoConfig::from_toml_str(&shown).unwrap();
        assert_eq!(reparsed, DemoConfig::default());
    }

    #[test]
    fn init_refuses_to_clobber_without_force() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("config.toml");
        fs::write(&file, "[window]\nwidth = 10\n").unwrap();

        let err = run(
            ConfigAction::Init {
                path: Some(file.clone()),
                force: false,
            },
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert_eq!(fs::read_to_string(&file).unwrap(), "[window]\nwidth = 10\n");

        run(
            ConfigAction::Init {
                path: Some(file.clone()),
                force: true,
            },
            None,
        )
        .unwrap();
        assert_eq!(DemoConfig::load(&file).unwrap(), DemoConfig::default());
    }

    #[test]
    fn show_surfaces_invalid_files() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("config.toml");
        fs::write(&file, "[compute]\nx_group_size = 0\n").unwrap();

        let err = run(ConfigAction::Show, Some(&file)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
