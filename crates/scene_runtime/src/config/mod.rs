//! Configuration system

use std::path::Path;

pub use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match Format::of(path)? {
            Format::Toml => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Format::Ron => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Load configuration from file, falling back to defaults if it is missing
    fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_from_file(path)
        } else {
            log::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match Format::of(path)? {
            Format::Toml => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?,
            Format::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

enum Format {
    Toml,
    Ron,
}

impl Format {
    fn of(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Tuning for a [`Scene`](crate::scene::Scene)'s frame loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Length of one fixed-update step in seconds
    pub fixed_timestep: f32,

    /// Upper bound on fixed steps run in a single frame, so a long hitch
    /// cannot snowball into ever longer frames
    pub max_fixed_steps_per_frame: u32,

    /// Default log filter used when `RUST_LOG` is unset
    pub log_level: String,

    /// Collect per-frame [`SceneStats`](crate::scene::SceneStats)
    pub enable_stats: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 50.0,
            max_fixed_steps_per_frame: 8,
            log_level: "info".to_string(),
            enable_stats: true,
        }
    }
}

impl Config for RuntimeConfig {}

impl RuntimeConfig {
    /// Clamp values that would stall or break the frame loop
    pub fn sanitized(mut self) -> Self {
        if !self.fixed_timestep.is_finite() || self.fixed_timestep <= 0.0 {
            log::warn!(
                "Invalid fixed_timestep {}, using default",
                self.fixed_timestep
            );
            self.fixed_timestep = Self::default().fixed_timestep;
        }
        self.max_fixed_steps_per_frame = self.max_fixed_steps_per_frame.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("scene_runtime_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_toml_round_trip() {
        let path = temp_path("runtime.toml");
        let config = RuntimeConfig {
            fixed_timestep: 0.01,
            max_fixed_steps_per_frame: 3,
            log_level: "debug".to_string(),
            enable_stats: false,
        };

        config.save_to_file(&path).unwrap();
        let loaded = RuntimeConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_ron_partial_file_uses_defaults() {
        let path = temp_path("partial.ron");
        std::fs::write(&path, "(fixed_timestep: 0.05)").unwrap();

        let loaded = RuntimeConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.fixed_timestep, 0.05);
        assert_eq!(loaded.max_fixed_steps_per_frame, 8);
        assert_eq!(loaded.log_level, "info");
    }

    #[test]
    fn test_unsupported_extension_is_rejected() {
        let result = RuntimeConfig::default().save_to_file(temp_path("runtime.json"));
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let loaded = RuntimeConfig::load_or_default(temp_path("does_not_exist.toml")).unwrap();
        assert_eq!(loaded, RuntimeConfig::default());
    }

    #[test]
    fn test_sanitized_replaces_bad_timestep() {
        let config = RuntimeConfig {
            fixed_timestep: 0.0,
            max_fixed_steps_per_frame: 0,
            ..Default::default()
        }
        .sanitized();

        assert_eq!(config.fixed_timestep, RuntimeConfig::default().fixed_timestep);
        assert_eq!(config.max_fixed_steps_per_frame, 1);
    }
}
