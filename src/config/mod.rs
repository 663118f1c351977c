//! Process-level settings for artifact-resource
//!
//! The request `source` configures a single invocation; these settings
//! describe the worker itself (paths, timeouts, retry policy).

pub mod schema;

pub use schema::Settings;

use crate::error::{ResourceError, ResourceResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Environment variable naming an explicit settings file
pub const CONFIG_ENV: &str = "ARTIFACT_RESOURCE_CONFIG";
/// Overrides `download.cache_dir`
pub const CACHE_DIR_ENV: &str = "ARTIFACT_RESOURCE_CACHE_DIR";
/// Overrides `git.work_dir`
pub const WORK_DIR_ENV: &str = "ARTIFACT_RESOURCE_WORK_DIR";

/// Settings manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager, honouring `ARTIFACT_RESOURCE_CONFIG`
    pub fn new() -> Self {
        let config_path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_config_path);
        Self { config_path }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default settings file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("artifact-resource")
            .join("settings.toml")
    }

    /// Load settings, falling back to defaults, then apply env overrides
    pub async fn load(&self) -> ResourceResult<Settings> {
        let mut settings = if self.config_path.exists() {
            self.load_from_file(&self.config_path).await?
        } else {
            debug!("Settings file not found, using defaults");
            Settings::default()
        };

        apply_env_overrides(&mut settings, |key| std::env::var_os(key));
        Ok(settings)
    }

    /// Load settings from a specific file
    pub async fn load_from_file(&self, path: &Path) -> ResourceResult<Settings> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| ResourceError::io(format!("reading settings from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| ResourceError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Get the settings file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_env_overrides(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<std::ffi::OsString>,
) {
    if let Some(dir) = lookup(CACHE_DIR_ENV).filter(|v| !v.is_empty()) {
        settings.download.cache_dir = Some(PathBuf::from(dir));
    }
    if let Some(dir) = lookup(WORK_DIR_ENV).filter(|v| !v.is_empty()) {
        settings.git.work_dir = PathBuf::from(dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp.path().join("missing.toml"));

        let settings = manager.load().await.unwrap();
        assert_eq!(settings.object_store.max_attempts, 12);
    }

    #[tokio::test]
    async fn load_rejects_invalid_toml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.toml");
        std::fs::write(&path, "[download\nmax_retries = ").unwrap();

        let err = ConfigManager::with_path(path).load().await.unwrap_err();
        assert!(matches!(err, ResourceError::ConfigInvalid { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings, |key| match key {
            CACHE_DIR_ENV => Some(OsString::from("/cache")),
            WORK_DIR_ENV => Some(OsString::from("")),
            _ => None,
        });

        assert_eq!(settings.download.cache_dir, Some(PathBuf::from("/cache")));
        assert!(settings.git.work_dir.ends_with("artifact-resource-git-repo"));
    }
}
