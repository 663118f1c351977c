//! Licensed-download API file provider
//!
//! Resolves the release for a version, selects its product files by
//! pattern, accepts the EULA and streams each file. With a content cache
//! configured, files are fetched into the cache once and copied out.

mod api;

pub use api::{PivnetApi, PivnetClient, ProductFile, Release, DEFAULT_HOST};

use crate::error::{ResourceError, ResourceResult};
use crate::fetcher::cache::{verify_sha256, ContentCache};
use crate::fetcher::matcher::{base_name, file_name_matches};
use crate::fetcher::{ensure_dir, DriverContext, FileProvider};
use crate::ui::{TransferProgress, UiContext};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Downloads product files through the licensed-download API
#[derive(Clone)]
pub struct PivnetProvider {
    api: Arc<dyn PivnetApi>,
    cache: Option<ContentCache>,
    ui: UiContext,
}

impl PivnetProvider {
    /// Provider talking to `host` (empty for the public host)
    pub fn new(host: &str, token: &str, ctx: &DriverContext) -> ResourceResult<Self> {
        let client = PivnetClient::new(host, token, ctx)?;
        Ok(Self::with_api(Arc::new(client), ctx.ui.clone()))
    }

    pub fn with_api(api: Arc<dyn PivnetApi>, ui: UiContext) -> Self {
        Self {
            api,
            cache: None,
            ui,
        }
    }

    /// Serve files from `cache`, downloading into it on a miss
    pub fn with_cache(mut self, cache: ContentCache) -> Self {
        self.cache = Some(cache);
        self
    }

    async fn fetch(
        &self,
        slug: &str,
        release_id: u64,
        file: &ProductFile,
        target: &Path,
    ) -> ResourceResult<()> {
        let name = base_name(&file.aws_object_key);
        let progress = TransferProgress::new(&self.ui, name, file.size);
        self.api
            .download_product_file(slug, release_id, file, target, &progress)
            .await?;
        progress.finish();

        if !file.sha256.is_empty() {
            if let Err(e) = verify_sha256(target, name, &file.sha256).await {
                if let Err(remove_err) = tokio::fs::remove_file(target).await {
                    if remove_err.kind() != ErrorKind::NotFound {
                        debug!("Could not remove {}: {}", target.display(), remove_err);
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    async fn fetch_cached(
        &self,
        cache: &ContentCache,
        slug: &str,
        release_id: u64,
        file: &ProductFile,
        target: &Path,
    ) -> ResourceResult<()> {
        let name = base_name(&file.aws_object_key);
        let entry = match cache.lookup(name, Some(&file.sha256)).await? {
            Some(entry) => {
                info!("Found in cache {}", name);
                entry
            }
            None => {
                info!("Not found in cache {}, downloading", name);
                let entry = cache.entry_path(name);
                self.fetch(slug, release_id, file, &entry).await?;
                entry
            }
        };

        cache.copy_to(&entry, target).await?;
        Ok(())
    }
}

/// Keep the files whose object key's last segment matches `pattern`.
///
/// An empty pattern keeps everything.
pub fn filter_by_pattern(files: Vec<ProductFile>, pattern: &str) -> ResourceResult<Vec<ProductFile>> {
    if pattern.is_empty() {
        return Ok(files);
    }

    let mut kept = Vec::new();
    for file in files {
        if file_name_matches(base_name(&file.aws_object_key), pattern)? {
            kept.push(file);
        }
    }

    if kept.is_empty() {
        return Err(ResourceError::NoPatternMatch(pattern.to_string()));
    }
    Ok(kept)
}

#[async_trait]
impl FileProvider for PivnetProvider {
    async fn download_file(
        &self,
        target_dir: &Path,
        product_slug: &str,
        version: &str,
        pattern: &str,
    ) -> ResourceResult<Vec<PathBuf>> {
        let releases = self.api.releases(product_slug).await?;
        let release = releases
            .into_iter()
            .find(|r| r.version == version)
            .ok_or_else(|| ResourceError::ReleaseNotFound {
                slug: product_slug.to_string(),
                version: version.to_string(),
            })?;
        debug!("Release {} of {} has id {}", version, product_slug, release.id);

        let files = self.api.product_files(product_slug, release.id).await?;
        let selected = filter_by_pattern(files, pattern)?;

        self.api.accept_eula(product_slug, release.id).await?;
        ensure_dir(target_dir).await?;

        let mut written = Vec::with_capacity(selected.len());
        for file in &selected {
            let target = target_dir.join(base_name(&file.aws_object_key));
            match &self.cache {
                Some(cache) => {
                    self.fetch_cached(cache, product_slug, release.id, file, &target)
                        .await?
                }
                None => self.fetch(product_slug, release.id, file, &target).await?,
            }
            written.push(target);
        }

        Ok(written)
    }

    fn provider_name(&self) -> &'static str {
        "pivnet"
    }
}
