//! Plain HTTP file provider
//!
//! Files are expected at `<base_url>/<slug>/<version>/<file name>`, where the
//! file name is the pattern with the version substituted in.

use crate::error::{ResourceError, ResourceResult};
use crate::fetcher::disk::{ensure_capacity, DiskUsage, SystemDisk};
use crate::fetcher::matcher::derive_filename;
use crate::fetcher::retry::RetryPolicy;
use crate::fetcher::stream::{self, build_agent, content_length, run_blocking, USER_AGENT};
use crate::fetcher::{ensure_dir, DriverContext, FileProvider};
use crate::ui::{TransferProgress, UiContext};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use ureq::{Agent, ResponseExt};

/// Downloads from a static HTTP file server
#[derive(Clone)]
pub struct HttpProvider {
    base_url: String,
    agent: Agent,
    ui: UiContext,
    cancel: CancellationToken,
    policy: RetryPolicy,
    disk: Arc<dyn DiskUsage>,
}

impl HttpProvider {
    pub fn new(base_url: &str, skip_tls_verification: bool, ctx: &DriverContext) -> Self {
        Self {
            base_url: base_url.to_string(),
            agent: build_agent(&ctx.settings.download, skip_tls_verification),
            ui: ctx.ui.clone(),
            cancel: ctx.cancel.clone(),
            policy: RetryPolicy::from_settings(&ctx.settings.download),
            disk: Arc::new(SystemDisk),
        }
    }

    /// Replace the free-space source
    pub fn with_disk(mut self, disk: Arc<dyn DiskUsage>) -> Self {
        self.disk = disk;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// URL of the file for `slug` and `version` matching `pattern`
    pub fn content_url(&self, slug: &str, version: &str, pattern: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            slug,
            version,
            derive_filename(pattern, version)
        )
    }

    /// Fetch `url` into `target_file`.
    ///
    /// A HEAD request validates the URL, resolves redirects and declares the
    /// size checked against free space. The GET is retried on transient
    /// failures; a failed download leaves no file behind.
    pub async fn download(&self, target_file: &Path, url: &str) -> ResourceResult<()> {
        let agent = self.agent.clone();
        let head_url = url.to_string();
        let (status, final_url, length) = run_blocking(move || {
            let response = agent
                .head(&head_url)
                .header("User-Agent", USER_AGENT)
                .call()
                .map_err(|e| ResourceError::Http(format!("HEAD {}: {}", head_url, e)))?;
            Ok((
                response.status().as_u16(),
                response.get_uri().to_string(),
                content_length(response.headers()),
            ))
        })
        .await?;

        if status != 200 {
            return Err(ResourceError::BadStatus {
                url: url.to_string(),
                status,
            });
        }
        if final_url != url {
            debug!("{} redirected to {}", url, final_url);
        }

        let length = length.unwrap_or(0);
        let dir = target_file.parent().unwrap_or_else(|| Path::new("."));
        ensure_capacity(self.disk.as_ref(), dir, length)?;

        let label = target_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| final_url.clone());
        let progress = TransferProgress::new(&self.ui, &label, length);

        let agent = self.agent.clone();
        let get_url = final_url.clone();
        let send = move || agent.get(&get_url).header("User-Agent", USER_AGENT).call();

        stream::download_to_path(
            send,
            &final_url,
            target_file,
            &progress,
            &self.policy,
            &self.cancel,
        )
        .await?;

        progress.finish();
        Ok(())
    }
}

#[async_trait]
impl FileProvider for HttpProvider {
    async fn download_file(
        &self,
        target_dir: &Path,
        product_slug: &str,
        version: &str,
        pattern: &str,
    ) -> ResourceResult<Vec<PathBuf>> {
        ensure_dir(target_dir).await?;

        let target_file = target_dir.join(derive_filename(pattern, version));
        let url = self.content_url(product_slug, version, pattern);
        info!("Downloading {} from {}", product_slug, url);

        self.download(&target_file, &url).await?;
        Ok(vec![target_file])
    }

    fn provider_name(&self) -> &'static str {
        "http"
    }
}
