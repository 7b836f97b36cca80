//! CLI configuration: where the default collection lives.
//!
//! Stored as JSON at `~/.config/mdbase-tasknotes/config.json`. The
//! collection a command operates on is resolved with a fixed precedence:
//! `--collection` flag, then the `MDBASE_TASKNOTES_PATH` environment
//! variable, then the config file, then the current directory.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable overriding the configured collection path.
pub const PATH_ENV_VAR: &str = "MDBASE_TASKNOTES_PATH";

/// Config directory name under the user config root.
const CONFIG_DIR: &str = "mdbase-tasknotes";

/// Config file name inside the config directory.
const CONFIG_FILE: &str = "config.json";

/// Persisted CLI settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Default collection root used when no flag or env override is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl CliConfig {
    /// Load from the default location. A missing file is an empty config.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be parsed, or the
    /// config directory cannot be determined.
    pub fn load() -> Result<Self> {
        Self::load_from(&default_config_dir()?)
    }

    /// Load from a specific config directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be parsed.
    pub fn load_from(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save to the default location, creating the directory as needed.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&default_config_dir()?)
    }

    /// Save to a specific config directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn save_to(&self, config_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(config_dir)?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_dir.join(CONFIG_FILE), content)?;
        Ok(())
    }
}

/// The default config directory (`~/.config/mdbase-tasknotes` on Linux).
///
/// # Errors
///
/// Returns [`Error::NoHomeDir`] when no user config root exists.
pub fn default_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR))
        .ok_or(Error::NoHomeDir)
}

/// Resolve the collection root a command should operate on.
///
/// # Errors
///
/// Propagates config-load errors; a missing config file is not an error.
pub fn resolve_collection_path(flag: Option<&str>, config: &CliConfig) -> Result<PathBuf> {
    if let Some(flag) = flag {
        return Ok(PathBuf::from(flag));
    }
    if let Ok(env_path) = env::var(PATH_ENV_VAR) {
        if !env_path.trim().is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    if let Some(configured) = &config.collection {
        return Ok(PathBuf::from(configured));
    }
    Ok(env::current_dir()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = CliConfig::load_from(dir.path()).unwrap();
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let config = CliConfig {
            collection: Some("/data/tasks".to_string()),
        };
        config.save_to(dir.path()).unwrap();
        assert_eq!(CliConfig::load_from(dir.path()).unwrap(), config);

        let raw = std::fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap();
        assert!(raw.contains("\"collection\": \"/data/tasks\""));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{not json").unwrap();
        assert!(matches!(
            CliConfig::load_from(dir.path()),
            Err(Error::Json(_))
        ));
    }

    #[test]
    #[serial]
    fn test_resolve_flag_wins() {
        env::set_var(PATH_ENV_VAR, "/from-env");
        let config = CliConfig {
            collection: Some("/from-config".to_string()),
        };
        let resolved = resolve_collection_path(Some("/from-flag"), &config).unwrap();
        assert_eq!(resolved, PathBuf::from("/from-flag"));
        env::remove_var(PATH_ENV_VAR);
    }

    #[test]
    #[serial]
    fn test_resolve_env_beats_config() {
        env::set_var(PATH_ENV_VAR, "/from-env");
        let config = CliConfig {
            collection: Some("/from-config".to_string()),
        };
        let resolved = resolve_collection_path(None, &config).unwrap();
        assert_eq!(resolved, PathBuf::from("/from-env"));
        env::remove_var(PATH_ENV_VAR);
    }

    #[test]
    #[serial]
    fn test_resolve_config_then_cwd() {
        env::remove_var(PATH_ENV_VAR);
        let config = CliConfig {
            collection: Some("/from-config".to_string()),
        };
        assert_eq!(
            resolve_collection_path(None, &config).unwrap(),
            PathBuf::from("/from-config")
        );
        assert_eq!(
            resolve_collection_path(None, &CliConfig::default()).unwrap(),
            env::current_dir().unwrap()
        );
    }
}
