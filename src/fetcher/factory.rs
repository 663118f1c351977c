//! Fetcher factory mapping `source.file_provider` to a driver

use crate::error::{ResourceError, ResourceResult};
use crate::fetcher::cache::ContentCache;
use crate::fetcher::http::HttpProvider;
use crate::fetcher::pivnet::PivnetProvider;
use crate::fetcher::s3::S3Provider;
use crate::fetcher::{DriverContext, FileProvider};
use crate::types::Source;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Known file provider tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileProviderKind {
    /// `""` or `"pivnet"`
    Pivnet,
    S3,
    Http,
}

impl FileProviderKind {
    /// Parse a provider tag, defaulting the empty tag to pivnet
    pub fn parse(tag: &str) -> ResourceResult<Self> {
        match tag {
            "" | "pivnet" => Ok(Self::Pivnet),
            "s3" => Ok(Self::S3),
            "http" => Ok(Self::Http),
            other => Err(ResourceError::UnknownProvider(other.to_string())),
        }
    }
}

/// A constructed artifact downloader
#[derive(Clone)]
pub enum FileDriver {
    Pivnet(PivnetProvider),
    S3(S3Provider),
    Http(HttpProvider),
}

impl FileDriver {
    /// Create the downloader selected by the source
    pub async fn from_source(source: &Source, ctx: &DriverContext) -> ResourceResult<Self> {
        let kind = FileProviderKind::parse(&source.file_provider)?;
        debug!("Using {:?} file provider", kind);

        match kind {
            FileProviderKind::Pivnet => {
                if source.pivnet_token.is_empty() {
                    return Err(ResourceError::MissingField("pivnet_token"));
                }
                let provider = PivnetProvider::new(&source.pivnet_host, &source.pivnet_token, ctx)?;
                Ok(Self::Pivnet(match &ctx.settings.download.cache_dir {
                    Some(dir) => provider.with_cache(ContentCache::open(dir).await?),
                    None => provider,
                }))
            }
            FileProviderKind::S3 => {
                if source.bucket.is_empty() {
                    return Err(ResourceError::MissingField("bucket"));
                }
                Ok(Self::S3(S3Provider::new(source, ctx).await?))
            }
            FileProviderKind::Http => {
                if source.base_url.is_empty() {
                    return Err(ResourceError::MissingField("base_url"));
                }
                Ok(Self::Http(HttpProvider::new(
                    &source.base_url,
                    source.skip_ssl_verification,
                    ctx,
                )))
            }
        }
    }

    fn inner(&self) -> &dyn FileProvider {
        match self {
            Self::Pivnet(provider) => provider,
            Self::S3(provider) => provider,
            Self::Http(provider) => provider,
        }
    }
}

#[async_trait]
impl FileProvider for FileDriver {
    async fn download_file(
        &self,
        target_dir: &Path,
        product_slug: &str,
        version: &str,
        pattern: &str,
    ) -> ResourceResult<Vec<PathBuf>> {
        self.inner()
            .download_file(target_dir, product_slug, version, pattern)
            .await
    }

    fn provider_name(&self) -> &'static str {
        self.inner().provider_name()
    }
}
