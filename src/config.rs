use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::model::catalog;

/// Persisted configuration, stored as JSON at `~/.scribekey/config.json`.
///
/// The only persisted field is the active model tier. A stored name that is
/// not in the catalog is discarded on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active model tier, one of the catalog names, or absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_model: Option<String>,
}

impl Config {
    /// Load config from disk, returning defaults if the file does not exist.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).context("failed to read config file")?;
        let mut config: Config =
            serde_json::from_str(&contents).context("failed to parse config JSON")?;

        if let Some(name) = &config.current_model {
            if catalog::find(name).is_none() {
                warn!(tier = %name, "persisted model tier not in catalog, ignoring");
                config.current_model = None;
            }
        }

        Ok(config)
    }

    /// Write config to disk, creating the parent directory if needed.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created or the write fails.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("failed to create config directory")?;
        }
        let contents = serde_json::to_string(self).context("failed to serialize config")?;
        fs::write(path, contents).context("failed to write config file")?;
        Ok(())
    }

    /// Default config file location: `~/.scribekey/config.json`
    pub fn default_path() -> Result<PathBuf> {
        Ok(app_dir()?.join("config.json"))
    }
}

/// Application dot-directory: `~/.scribekey`
pub fn app_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".scribekey"))
}

/// Model cache root: `~/.scribekey/models`
pub fn models_dir() -> Result<PathBuf> {
    Ok(app_dir()?.join("models"))
}

/// Log file location: `~/.scribekey/scribekey.log`
pub fn log_path() -> Result<PathBuf> {
    Ok(app_dir()?.join("scribekey.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config::load_from(&path).unwrap();
        assert!(config.current_model.is_none());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config {
            current_model: Some("small".to_owned()),
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.current_model.as_deref(), Some("small"));
    }

    #[test]
    fn test_unknown_tier_discarded_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"current_model":"gigantic"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(config.current_model.is_none());
    }

    #[test]
    fn test_absent_field_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{}").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(config.current_model.is_none());
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        Config::default().save_to(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
