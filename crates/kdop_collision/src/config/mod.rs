//! Configuration system
//!
//! [`KdopConfig`] carries the build and tolerance parameters of a tree. Any
//! config type can be loaded from or saved to TOML or RON through [`Config`].

use std::path::Path;

pub use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file, choosing the format by extension
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            ConfigFormat::Ron => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Save configuration to file, choosing the format by extension
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            ConfigFormat::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

#[derive(Debug, Clone, Copy)]
enum ConfigFormat {
    Toml,
    Ron,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
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

/// # kDOP Tree Configuration
///
/// Build parameters and the numeric tolerances shared by every query.
/// The defaults are the values the collision code has historically shipped
/// with for single precision meshes measured in engine units; meshes at a
/// very different scale may want to retune them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdopConfig {
    /// Maximum number of triangles stored in a leaf
    pub leaf_threshold: usize,
    /// Slack added around volumes when confirming a ray entry point
    pub fudge_size: f32,
    /// Distance tolerance for the ray/triangle plane and edge tests
    pub plane_epsilon: f32,
    /// Squared length under which a separating axis candidate is ignored
    pub separating_axis_epsilon: f32,
    /// Projected sweep length under which a sweep counts as parallel to an axis
    pub parallel_epsilon: f32,
    /// Starting "best" penetration distance for point checks
    pub initial_push_out_distance: f32,
}

impl Default for KdopConfig {
    fn default() -> Self {
        Self {
            leaf_threshold: 5,
            fudge_size: 0.1,
            plane_epsilon: 0.001,
            separating_axis_epsilon: 1e-5,
            parallel_epsilon: 1e-30,
            initial_push_out_distance: 100_000.0,
        }
    }
}

impl Config for KdopConfig {}

impl KdopConfig {
    /// Set the leaf threshold
    #[must_use]
    pub const fn with_leaf_threshold(mut self, leaf_threshold: usize) -> Self {
        self.leaf_threshold = leaf_threshold;
        self
    }

    /// Set the fudge size
    #[must_use]
    pub const fn with_fudge_size(mut self, fudge_size: f32) -> Self {
        self.fudge_size = fudge_size;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.leaf_threshold == 0 {
            return Err("leaf_threshold must be at least 1".to_string());
        }
        let tolerances = [
            ("fudge_size", self.fudge_size),
            ("plane_epsilon", self.plane_epsilon),
            ("separating_axis_epsilon", self.separating_axis_epsilon),
            ("parallel_epsilon", self.parallel_epsilon),
        ];
        for (name, value) in tolerances {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{name} must be a finite, non-negative value (got {value})"));
            }
        }
        if !(self.initial_push_out_distance > 0.0) {
            return Err(format!(
                "initial_push_out_distance must be positive (got {})",
                self.initial_push_out_distance
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(KdopConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_leaf_threshold_rejected() {
        let config = KdopConfig::default().with_leaf_threshold(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_fudge_rejected() {
        let config = KdopConfig::default().with_fudge_size(-1.0);
        assert!(config.validate().unwrap_err().contains("fudge_size"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: KdopConfig = toml::from_str("leaf_threshold = 8").unwrap();
        assert_eq!(config.leaf_threshold, 8);
        assert_eq!(config.fudge_size, KdopConfig::default().fudge_size);
    }

    #[test]
    fn test_round_trip_through_files() {
        let dir = std::env::temp_dir().join(format!("kdop_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let config = KdopConfig::default().with_leaf_threshold(3).with_fudge_size(0.25);

        for name in ["tree.toml", "tree.ron"] {
            let path = dir.join(name);
            config.save_to_file(&path).unwrap();
            let loaded = KdopConfig::load_from_file(&path).unwrap();
            assert_eq!(loaded, config);
        }

        let unsupported = KdopConfig::load_from_file(dir.join("tree.json"));
        assert!(matches!(unsupported, Err(ConfigError::Io(_) | ConfigError::UnsupportedFormat(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
