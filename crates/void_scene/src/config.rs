//! Serializer settings.
//!
//! Stored as TOML next to the other per-user configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use void_asset::ImportSettings;

use crate::error::SceneError;

/// Settings for [`SceneSerializer`](crate::SceneSerializer)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerConfig {
    /// Directory scene files are written to; per-user data dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_dir: Option<PathBuf>,
    pub file_name: String,
    /// Let the asset source reuse already loaded models
    pub cache_enabled: bool,
    /// Outstanding model loads during import; 0 is treated as 1
    pub max_in_flight: usize,
    pub import_settings: ImportSettings,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            scene_dir: None,
            file_name: "scene.json".to_string(),
            cache_enabled: true,
            max_in_flight: 1,
            import_settings: ImportSettings::default(),
        }
    }
}

impl SerializerConfig {
    /// Load settings from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self =
            toml::from_str(&content).map_err(|e| SceneError::Config(e.to_string()))?;
        config.max_in_flight = config.max_in_flight.max(1);
        log::info!("Loaded serializer config from {:?}", path);
        Ok(config)
    }

    /// Load from the default location, falling back to defaults
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring serializer config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Save settings as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), SceneError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SceneError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        log::info!("Saved serializer config to {:?}", path);
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("void_scene");
            p.push("serializer.toml");
            p
        })
    }

    /// Directory scene files live in
    pub fn scene_dir(&self) -> PathBuf {
        self.scene_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|p| p.join("void_scene")))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Default scene file location
    pub fn scene_path(&self) -> PathBuf {
        self.scene_dir().join(&self.file_name)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SerializerConfig::default();
        assert_eq!(config.file_name, "scene.json");
        assert!(config.cache_enabled);
        assert_eq!(config.max_in_flight(), 1);
        assert!(config.scene_path().ends_with("scene.json"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("serializer.toml");
        std::fs::write(
            &path,
            "scene_dir = \"/tmp/scenes\"\nmax_in_flight = 0\n\n\
             [import_settings]\nflip_uvs = true\n",
        )
        .unwrap();

        let config = SerializerConfig::load(&path).unwrap();
        assert_eq!(config.scene_path(), PathBuf::from("/tmp/scenes/scene.json"));
        assert_eq!(config.max_in_flight, 1);
        assert!(config.cache_enabled);
        assert!(config.import_settings.flip_uvs);
        assert!(config.import_settings.generate_normals);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("serializer.toml");
        let config = SerializerConfig {
            scene_dir: Some(dir.path().to_path_buf()),
            file_name: "level.json".into(),
            cache_enabled: false,
            max_in_flight: 4,
            import_settings: ImportSettings::default(),
        };
        config.save(&path).unwrap();
        assert_eq!(SerializerConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("serializer.toml");
        std::fs::write(&path, "max_in_flight = \"many\"").unwrap();
        assert!(matches!(SerializerConfig::load(&path), Err(SceneError::Config(_))));
    }
}
