//! Artifact download (the file provider)
//!
//! Downloads the files of a product version from a remote store:
//! - `pivnet`: licensed-download API with EULA acceptance and optional cache
//! - `s3`: S3-compatible object store with glob selection
//! - `http`: plain HTTP server laid out as `<base>/<slug>/<version>/<file>`

pub mod cache;
pub mod disk;
mod factory;
pub mod http;
pub mod matcher;
pub mod pivnet;
pub mod retry;
pub mod s3;
pub mod stream;

pub use factory::{FileDriver, FileProviderKind};

use crate::config::schema::Settings;
use crate::error::{ResourceError, ResourceResult};
use crate::ui::UiContext;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Process-wide inputs every driver needs
#[derive(Debug, Clone)]
pub struct DriverContext {
    pub settings: Settings,
    pub ui: UiContext,
    pub cancel: CancellationToken,
}

impl DriverContext {
    pub fn new(settings: Settings, ui: UiContext, cancel: CancellationToken) -> Self {
        Self {
            settings,
            ui,
            cancel,
        }
    }
}

/// Abstract artifact downloader interface
#[async_trait]
pub trait FileProvider: Send + Sync {
    /// Download the files of `product_slug` at `version` matching `pattern`
    /// into `target_dir`, returning the written paths
    async fn download_file(
        &self,
        target_dir: &Path,
        product_slug: &str,
        version: &str,
        pattern: &str,
    ) -> ResourceResult<Vec<PathBuf>>;

    /// Provider tag, for logging
    fn provider_name(&self) -> &'static str;
}

/// Create `dir` and any missing parents
pub(crate) async fn ensure_dir(dir: &Path) -> ResourceResult<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ResourceError::io(format!("creating {}", dir.display()), e))
}
