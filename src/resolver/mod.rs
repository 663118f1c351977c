//! Version resolution (the configuration provider)
//!
//! Turns a revision of the tracked source into authoritative version
//! metadata for a product. Only a git-backed driver exists today.

mod auth;
mod factory;
pub mod git;

pub use auth::{is_encrypted_key, CredentialPaths, GitCredentials};
pub use factory::{ConfigDriver, ConfigProviderKind};
pub use git::GitProvider;

use crate::error::ResourceResult;
use crate::types::{Version, VersionInfo};
use async_trait::async_trait;

/// Abstract version resolver interface
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Resolve the latest revision of the tracked source
    async fn latest_version(&self) -> ResourceResult<Version>;

    /// Read the metadata for `product` as of `revision`
    async fn version_info(&self, revision: &str, product: &str) -> ResourceResult<VersionInfo>;

    /// Provider tag, for logging
    fn provider_name(&self) -> &'static str;
}
