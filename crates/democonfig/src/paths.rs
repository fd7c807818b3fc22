use std::env;
use std::path::{Path, PathBuf};

use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "SHADERDEMOS_CONFIG_DIR";
pub const ENV_SHADER_DIR: &str = "SHADERDEMOS_SHADER_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "ShaderDemos";
const APPLICATION: &str = "shaderdemos";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_SHADER_DIR: &str = "shaders";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    /// Returns `None` when neither the override variable nor the platform
    /// user directories are available (e.g. no home directory).
    pub fn discover() -> Option<Self> {
        if let Some(config_dir) = env_override(ENV_CONFIG_DIR) {
            return Some(Self { config_dir });
        }
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)?;
        Some(Self {
            config_dir: project_dirs.config_dir().to_path_buf(),
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }
}

/// Shader directory: explicit flag, then `$SHADERDEMOS_SHADER_DIR`, then
/// `./shaders`.
pub fn resolve_shader_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    env_override(ENV_SHADER_DIR).unwrap_or_else(|| PathBuf::from(DEFAULT_SHADER_DIR))
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{resolve_config_path, DemoConfig};
    use std::ffi::OsString;
    use std::fs;
    use std::sync::{Mutex, OnceLock};
    use tempfile::TempDir;

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    struct EnvGuard {
        key: &'static str,
        previous: Option<OsString>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &Path) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }

        fn clear(key: &'static str) -> Self {
            let previous = env::var_os(key);
            env::remove_var(key);
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = self.previous.take() {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    #[test]
    fn env_override_takes_precedence() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let config_dir = root.path().join("config");
        let _config_guard = EnvGuard::set(ENV_CONFIG_DIR, &config_dir);

        let paths = AppPaths::discover().unwrap();
        assert_eq!(paths.config_file(), config_dir.join("config.toml"));
    }

    #[test]
    fn missing_user_file_falls_back_to_defaults() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let _config_guard = EnvGuard::set(ENV_CONFIG_DIR, root.path());

        assert_eq!(resolve_config_path(None), None);
        let (config, source) = DemoConfig::discover(None).unwrap();
        assert_eq!(config, DemoConfig::default());
        assert!(source.is_none());
    }

    #[test]
    fn user_file_is_picked_up() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let _config_guard = EnvGuard::set(ENV_CONFIG_DIR, root.path());
        fs::write(root.path().join("config.toml"), "[window]\nwidth = 320\n").unwrap();

        let (config, source) = DemoConfig::discover(None).unwrap();
        assert_eq!(config.window.width, 320);
        assert_eq!(source, Some(root.path().join("config.toml")));
    }

    #[test]
    fn shader_dir_resolution_order() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();

        let _cleared = EnvGuard::clear(ENV_SHADER_DIR);
        assert_eq!(resolve_shader_dir(None), PathBuf::from("shaders"));

        let _shader_guard = EnvGuard::set(ENV_SHADER_DIR, root.path());
        assert_eq!(resolve_shader_dir(None), root.path());

        let explicit = root.path().join("custom");
        assert_eq!(resolve_shader_dir(Some(&explicit)), explicit);
    }
}
