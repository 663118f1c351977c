//! Resolver factory mapping `source.config_provider` to a driver

use crate::config::schema::GitSettings;
use crate::error::{ResourceError, ResourceResult};
use crate::resolver::git::GitProvider;
use crate::resolver::ConfigProvider;
use crate::types::{Source, Version, VersionInfo};
use async_trait::async_trait;
use tracing::debug;

/// Known configuration provider tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigProviderKind {
    /// `""` or `"git"`
    Git,
}

impl ConfigProviderKind {
    /// Parse a provider tag, defaulting the empty tag to git
    pub fn parse(tag: &str) -> ResourceResult<Self> {
        match tag {
            "" | "git" => Ok(Self::Git),
            other => Err(ResourceError::UnknownProvider(other.to_string())),
        }
    }
}

/// A constructed version resolver
#[derive(Debug, Clone)]
pub enum ConfigDriver {
    Git(GitProvider),
}

impl ConfigDriver {
    /// Create the resolver selected by the source
    pub fn from_source(source: &Source, settings: &GitSettings) -> ResourceResult<Self> {
        let kind = ConfigProviderKind::parse(&source.config_provider)?;
        debug!("Using {:?} config provider", kind);

        match kind {
            ConfigProviderKind::Git => Ok(Self::Git(GitProvider::from_source(source, settings)?)),
        }
    }

    fn inner(&self) -> &dyn ConfigProvider {
        match self {
            Self::Git(provider) => provider,
        }
    }
}

#[async_trait]
impl ConfigProvider for ConfigDriver {
    async fn latest_version(&self) -> ResourceResult<Version> {
        self.inner().latest_version().await
    }

    async fn version_info(&self, revision: &str, product: &str) -> ResourceResult<VersionInfo> {
        self.inner().version_info(revision, product).await
    }

    fn provider_name(&self) -> &'static str {
        self.inner().provider_name()
    }
}
