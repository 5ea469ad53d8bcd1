//! Configuration system
//!
//! Scene settings are plain serde structs that can be loaded from and saved
//! to TOML or RON files through the [`Config`] trait.

pub use serde::{Deserialize, Serialize};

use crate::spatial::OctreeConfig;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_str_with_format(&contents, path)
    }

    /// Parse configuration text, picking the format from the file name
    fn from_str_with_format(contents: &str, path: &str) -> Result<Self, ConfigError> {
        if path.ends_with(".toml") {
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
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

    /// A value is outside its accepted range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Cascaded shadow map settings for directional lights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Number of cascades per directional light (1 to 4)
    pub cascade_count: usize,

    /// Blend between uniform (0.0) and logarithmic (1.0) split distribution
    pub split_lambda: f32,

    /// Far distance covered by the last cascade, clamped to the camera far plane
    pub shadow_distance: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            cascade_count: 4,
            split_lambda: 0.5,
            shadow_distance: 500.0,
        }
    }
}

impl ShadowConfig {
    /// Largest supported cascade count
    pub const MAX_CASCADES: usize = 4;

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=Self::MAX_CASCADES).contains(&self.cascade_count) {
            return Err(ConfigError::Invalid(format!(
                "cascade count {} must be between 1 and {}",
                self.cascade_count,
                Self::MAX_CASCADES
            )));
        }
        if !(0.0..=1.0).contains(&self.split_lambda) {
            return Err(ConfigError::Invalid(format!(
                "split lambda {} must be between 0 and 1",
                self.split_lambda
            )));
        }
        if !(self.shadow_distance.is_finite() && self.shadow_distance > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "shadow distance {} must be positive",
                self.shadow_distance
            )));
        }
        Ok(())
    }
}

/// Scene construction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Half-extent of the cubic world, octrees cover `[-boundary, boundary]` on each axis
    pub boundary: f32,

    /// Fixed duration of one logic cycle in microseconds
    pub cycle_duration_us: u64,

    /// Rendering octree settings
    pub rendering: OctreeConfig,

    /// Physics octree settings
    pub physics: OctreeConfig,

    /// Shadow cascade settings
    pub shadow: ShadowConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            boundary: 1000.0,
            cycle_duration_us: 16_666,
            rendering: OctreeConfig::rendering_defaults(),
            physics: OctreeConfig::physics_defaults(),
            shadow: ShadowConfig::default(),
        }
    }
}

impl Config for SceneConfig {}

impl SceneConfig {
    /// Set the world half-extent
    pub fn with_boundary(mut self, boundary: f32) -> Self {
        self.boundary = boundary;
        self
    }

    /// Set the logic cycle duration
    pub fn with_cycle_duration_us(mut self, cycle_duration_us: u64) -> Self {
        self.cycle_duration_us = cycle_duration_us;
        self
    }

    /// Set the rendering octree settings
    pub fn with_rendering_octree(mut self, config: OctreeConfig) -> Self {
        self.rendering = config;
        self
    }

    /// Set the physics octree settings
    pub fn with_physics_octree(mut self, config: OctreeConfig) -> Self {
        self.physics = config;
        self
    }

    /// Set the shadow cascade settings
    pub fn with_shadow(mut self, shadow: ShadowConfig) -> Self {
        self.shadow = shadow;
        self
    }

    /// Check every value range
    ///
    /// The boundary is not checked here: a non-positive boundary is reported
    /// by the scene as `SceneError::InvalidBoundary`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle_duration_us == 0 {
            return Err(ConfigError::Invalid("cycle duration must be positive".to_string()));
        }
        self.rendering.validate()?;
        self.physics.validate()?;
        self.shadow.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_config_toml_partial_file() {
        let text = "boundary = 250.0\n\n[physics]\nmax_element_per_sector = 16\n";
        let config = SceneConfig::from_str_with_format(text, "scene.toml").unwrap();

        assert_eq!(config.boundary, 250.0);
        assert_eq!(config.physics.max_element_per_sector, 16);
        assert_eq!(config.rendering, OctreeConfig::rendering_defaults());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_octree_settings() {
        let config = SceneConfig::default();

        assert_eq!(config.rendering.element_limit(), 256);
        assert!(!config.rendering.auto_collapse);
        assert_eq!(config.rendering.reserve_depth, 0);
        assert_eq!(config.physics.element_limit(), 32);
        assert!(!config.physics.auto_collapse);
        assert_eq!(config.physics.reserve_depth, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scene_config_ron() {
        let text = "(boundary: 64.0, shadow: (cascade_count: 2))";
        let config = SceneConfig::from_str_with_format(text, "scene.ron").unwrap();

        assert_eq!(config.boundary, 64.0);
        assert_eq!(config.shadow.cascade_count, 2);
        assert_eq!(config.shadow.split_lambda, 0.5);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = SceneConfig::from_str_with_format("", "scene.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_validate_rejects_bad_cascades() {
        let config = SceneConfig::default().with_shadow(ShadowConfig {
            cascade_count: 9,
            ..ShadowConfig::default()
        });
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_nan_shadow_distance() {
        let config = SceneConfig::default().with_shadow(ShadowConfig {
            shadow_distance: f32::NAN,
            ..ShadowConfig::default()
        });
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_and_load_round_trip_on_disk() {
        let path = std::env::temp_dir().join(format!("scene_core_config_{}.toml", std::process::id()));
        let path = path.to_string_lossy().to_string();
        let config = SceneConfig::default().with_boundary(42.0);

        config.save_to_file(&path).unwrap();
        let loaded = SceneConfig::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
    }
}
