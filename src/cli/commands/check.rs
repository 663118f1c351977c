//! Check command - report the latest version

use crate::cli::commands::{read_request, write_response};
use crate::config::schema::Settings;
use crate::error::ResourceResult;
use crate::resolver::{ConfigDriver, ConfigProvider};
use crate::types::{CheckRequest, CheckResponse};
use tracing::info;

/// Execute the check command
pub async fn execute(settings: &Settings) -> ResourceResult<()> {
    let request: CheckRequest = read_request(std::io::stdin().lock())?;

    let resolver = ConfigDriver::from_source(&request.source, &settings.git)
        .map_err(|e| e.during("constructing driver"))?;

    let response = check(&resolver).await?;
    write_response(std::io::stdout().lock(), &response)
}

/// Latest version as a one-element list
pub async fn check(resolver: &dyn ConfigProvider) -> ResourceResult<CheckResponse> {
    let version = resolver
        .latest_version()
        .await
        .map_err(|e| e.during("fetching version"))?;

    info!(
        "Latest {} version is {}",
        resolver.provider_name(),
        version.reference
    );
    Ok(vec![version])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResourceError;
    use crate::types::{Version, VersionInfo};
    use async_trait::async_trait;

    struct FixedResolver(Option<&'static str>);

    #[async_trait]
    impl ConfigProvider for FixedResolver {
        async fn latest_version(&self) -> ResourceResult<Version> {
            match self.0 {
                Some(reference) => Ok(Version::new(reference)),
                None => Err(ResourceError::git("fetch", "fatal: could not read from remote")),
            }
        }

        async fn version_info(&self, _revision: &str, _product: &str) -> ResourceResult<VersionInfo> {
            unreachable!("check never reads version info")
        }

        fn provider_name(&self) -> &'static str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn returns_latest_version() {
        let response = check(&FixedResolver(Some("abc123"))).await.unwrap();
        assert_eq!(response, vec![Version::new("abc123")]);
    }

    #[tokio::test]
    async fn failure_names_the_step() {
        let err = check(&FixedResolver(None)).await.unwrap_err();
        assert!(err.to_string().starts_with("error fetching version: git fetch failed"));
    }
}
