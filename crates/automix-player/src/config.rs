//! Player configuration for automix-player
//!
//! Configuration is stored as YAML in the user's config directory.
//! Default location: ~/.config/automix-player/config.yaml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Backend API settings
    pub api: ApiConfig,
    /// Audio output settings
    pub audio: AudioConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            audio: AudioConfig::default(),
        }
    }
}

/// Backend API configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the analysis backend
    pub base_url: String,
    /// Session cookie sent with audio requests, when the backend requires one
    pub session_cookie: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/v1".to_string(),
            session_cookie: None,
        }
    }
}

/// Audio configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Master output gain applied after the crossfader, 0.0..=1.0
    pub master_volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { master_volume: 1.0 }
    }
}

/// Get the default config file path
///
/// Returns: ~/.config/automix-player/config.yaml
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("automix-player")
        .join("config.yaml")
}

/// Load configuration from a YAML file
///
/// If the file doesn't exist, returns default config.
/// If the file exists but is invalid, logs a warning and returns default config.
pub fn load_config(path: &Path) -> PlayerConfig {
    log::info!("load_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_config: Config file doesn't exist, using defaults");
        return PlayerConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<PlayerConfig>(&contents) {
            Ok(config) => {
                log::info!(
                    "load_config: Loaded config - API: {}, master volume: {:.2}",
                    config.api.base_url,
                    config.audio.master_volume
                );
                config
            }
            Err(e) => {
                log::warn!("load_config: Failed to parse config: {}, using defaults", e);
                PlayerConfig::default()
            }
        },
        Err(e) => {
            log::warn!(
                "load_config: Failed to read config file: {}, using defaults",
                e
            );
            PlayerConfig::default()
        }
    }
}

/// Save configuration to a YAML file
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &PlayerConfig, path: &Path) -> Result<()> {
    log::info!("save_config: Saving to {:?}", path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml =
        serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("save_config: Config saved successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlayerConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:8000/api/v1");
        assert!(config.api.session_cookie.is_none());
        assert_eq!(config.audio.master_volume, 1.0);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = PlayerConfig {
            api: ApiConfig {
                base_url: "https://mix.example.com/api/v1".to_string(),
                session_cookie: Some("session=abc123".to_string()),
            },
            audio: AudioConfig { master_volume: 0.8 },
        };

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: PlayerConfig = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed.api.base_url, "https://mix.example.com/api/v1");
        assert_eq!(parsed.api.session_cookie.as_deref(), Some("session=abc123"));
        assert_eq!(parsed.audio.master_volume, 0.8);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let parsed: PlayerConfig =
            serde_yaml::from_str("api:\n  base_url: http://other:9000/api/v1\n").unwrap();
        assert_eq!(parsed.api.base_url, "http://other:9000/api/v1");
        assert_eq!(parsed.audio.master_volume, 1.0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = PlayerConfig::default();
        config.audio.master_volume = 0.5;
        save_config(&config, &path).unwrap();

        let loaded = load_config(&path);
        assert_eq!(loaded.audio.master_volume, 0.5);
    }
}
