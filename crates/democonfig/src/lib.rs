//! TOML configuration shared by the demo binaries.
//!
//! Every field has a default that matches the built-in tuning of the demos, so
//! an empty file (or no file at all) yields a runnable configuration. Command
//! line flags override what is loaded here.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

mod command;
mod paths;

pub use command::{run_config_command, ConfigAction, ConfigCommand};
pub use paths::{resolve_shader_dir, AppPaths, ENV_CONFIG_DIR, ENV_SHADER_DIR};

/// Largest number of invocations a single compute workgroup may request.
pub const MAX_WORKGROUP_INVOCATIONS: u32 = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    pub window: WindowConfig,
    pub compute: ComputeConfig,
    pub viewer: ViewerConfig,
    pub slime: SlimeConfig,
    pub raytracer: RaytracerConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    pub grab_mouse: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
            fullscreen: false,
            grab_mouse: false,
        }
    }
}

/// Local workgroup dimensions substituted into every compute shader.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComputeConfig {
    pub x_group_size: u32,
    pub y_group_size: u32,
    pub z_group_size: u32,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            x_group_size: 64,
            y_group_size: 1,
            z_group_size: 1,
        }
    }
}

impl ComputeConfig {
    pub fn invocations(&self) -> u64 {
        u64::from(self.x_group_size) * u64::from(self.y_group_size) * u64::from(self.z_group_size)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    pub model: String,
    /// Frame cap for the fragment viewer; zero or negative disables it.
    pub max_fps: f32,
    pub initial_scroll: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
            max_fps: 60.0,
            initial_scroll: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlimeConfig {
    pub body_count: u32,
    pub speed_rate: f32,
    pub turn_speed: f32,
    pub fade_rate: f32,
    pub diffuse_rate: f32,
    /// Degrees between the forward sensor and each side sensor.
    pub sensor_angle: f32,
    pub sensor_dist: f32,
    pub sensor_size: i32,
    pub sensor_weight: f32,
    pub random_direction_strength: f32,
    pub color: [f32; 3],
}

impl Default for SlimeConfig {
    fn default() -> Self {
        Self {
            body_count: 4096,
            speed_rate: 0.0002,
            turn_speed: 0.062,
            fade_rate: 0.0002,
            diffuse_rate: 0.1,
            sensor_angle: 60.0,
            sensor_dist: 30.0,
            sensor_size: 1,
            sensor_weight: 1.0,
            random_direction_strength: 0.05,
            color: [0.4, 0.7, 0.9],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RaytracerConfig {
    pub camera_position: [f32; 3],
    pub fov: f32,
}

impl Default for RaytracerConfig {
    fn default() -> Self {
        Self {
            camera_position: [14.0, 7.0, 20.0],
            fov: 50.0,
        }
    }
}

impl DemoConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: DemoConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Loads the explicit file when given, otherwise the per-user file if it
    /// exists, otherwise the defaults. Returns the file that was read.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        match resolve_config_path(explicit) {
            Some(path) => {
                let config = Self::load(&path)?;
                Ok((config, Some(path)))
            }
            None => Ok((Self::default(), None)),
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), ConfigError> {
        let rendered = self.to_toml_string()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, rendered).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }

        let compute = &self.compute;
        if compute.x_group_size == 0 || compute.y_group_size == 0 || compute.z_group_size == 0 {
            return Err(ConfigError::Invalid(
                "compute group sizes must all be greater than zero".into(),
            ));
        }
        if compute.invocations() > u64::from(MAX_WORKGROUP_INVOCATIONS) {
            return Err(ConfigError::Invalid(format!(
                "compute workgroup of {}x{}x{} exceeds {} invocations",
                compute.x_group_size,
                compute.y_group_size,
                compute.z_group_size,
                MAX_WORKGROUP_INVOCATIONS
            )));
        }

        validate_model_name(&self.viewer.model)?;
        if !self.viewer.max_fps.is_finite() {
            return Err(ConfigError::Invalid("viewer.max_fps must be finite".into()));
        }
        if !(self.viewer.initial_scroll >= 1.0) {
            return Err(ConfigError::Invalid(
                "viewer.initial_scroll must be at least 1.0".into(),
            ));
        }

        let slime = &self.slime;
        if slime.body_count == 0 {
            return Err(ConfigError::Invalid(
                "slime.body_count must be greater than zero".into(),
            ));
        }
        for (name, value) in [
            ("speed_rate", slime.speed_rate),
            ("turn_speed", slime.turn_speed),
            ("fade_rate", slime.fade_rate),
            ("diffuse_rate", slime.diffuse_rate),
            ("sensor_dist", slime.sensor_dist),
            ("sensor_weight", slime.sensor_weight),
            ("random_direction_strength", slime.random_direction_strength),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "slime.{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if !slime.sensor_angle.is_finite() {
            return Err(ConfigError::Invalid("slime.sensor_angle must be finite".into()));
        }
        if slime.sensor_size < 0 {
            return Err(ConfigError::Invalid("slime.sensor_size must be >= 0".into()));
        }
        if slime
            .color
            .iter()
            .any(|channel| !(0.0..=1.0).contains(channel))
        {
            return Err(ConfigError::Invalid(
                "slime.color channels must lie within [0, 1]".into(),
            ));
        }

        let tracer = &self.raytracer;
        if tracer.camera_position.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::Invalid(
                "raytracer.camera_position must be finite".into(),
            ));
        }
        if !(tracer.fov > 0.0 && tracer.fov < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "raytracer.fov must lie strictly between 0 and 180 degrees, got {}",
                tracer.fov
            )));
        }

        Ok(())
    }
}

/// Explicit path first, then the per-user config file when it exists.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let paths = AppPaths::discover()?;
    let candidate = paths.config_file();
    candidate.is_file().then_some(candidate)
}

fn validate_model_name(model: &str) -> Result<(), ConfigError> {
    let valid = !model.is_empty()
        && model
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "viewer.model '{model}' must be a bare shader name (letters, digits, '_' or '-')"
        )))
    }
}
