//! Settings schema for artifact-resource
//!
//! Settings are stored at `~/.config/artifact-resource/settings.toml`.
//! Every field has a default, so the file is optional.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// General settings
    pub general: GeneralSettings,

    /// Local git working copy and credential files
    pub git: GitSettings,

    /// HTTP transfers and the content cache
    pub download: DownloadSettings,

    /// Object store client
    pub object_store: ObjectStoreSettings,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Paths used by the git-backed version resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSettings {
    /// Working copy, reused across calls within one worker
    pub work_dir: PathBuf,

    /// Where a configured private key is written
    pub private_key_path: PathBuf,

    /// netrc file consulted by git's HTTPS transport
    pub netrc_path: PathBuf,
}

impl Default for GitSettings {
    fn default() -> Self {
        let tmp = std::env::temp_dir();
        Self {
            work_dir: tmp.join("artifact-resource-git-repo"),
            private_key_path: tmp.join("artifact-resource-private-key"),
            netrc_path: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".netrc"),
        }
    }
}

/// Download transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Content cache for licensed downloads (disabled when unset)
    pub cache_dir: Option<PathBuf>,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Time allowed for response headers to arrive, in seconds
    pub response_timeout_secs: u64,

    /// Retries after the first attempt of a streaming download
    pub max_retries: u32,

    /// First backoff delay in milliseconds, doubled per retry
    pub retry_base_delay_ms: u64,

    /// Upper bound for a single backoff delay in milliseconds
    pub retry_max_delay_ms: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            cache_dir: None,
            connect_timeout_secs: 30,
            response_timeout_secs: 120,
            max_retries: 5,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 30_000,
        }
    }
}

impl DownloadSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }
}

/// Object store client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreSettings {
    /// Total attempts per request, including the first
    pub max_attempts: u32,

    /// Size of each ranged GET when downloading an object
    pub part_size_bytes: u64,
}

impl Default for ObjectStoreSettings {
    fn default() -> Self {
        Self {
            max_attempts: 12,
            part_size_bytes: 8 * 1024 * 1024,
        }
    }
}
