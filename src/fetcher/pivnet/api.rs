//! Client for the licensed-download REST API

use crate::error::{ResourceError, ResourceResult};
use crate::fetcher::retry::RetryPolicy;
use crate::fetcher::stream::{self, build_agent, run_blocking, USER_AGENT};
use crate::fetcher::DriverContext;
use crate::ui::TransferProgress;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use ureq::http::Response;
use ureq::{Agent, Body};
use url::Url;

/// Public API host
pub const DEFAULT_HOST: &str = "https://network.tanzu.vmware.com";

/// Tokens longer than this are refresh tokens; shorter ones are legacy API tokens
const LEGACY_TOKEN_MAX_LEN: usize = 20;

/// A published release of a product
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub id: u64,
    pub version: String,
}

/// A downloadable file attached to a release
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProductFile {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub aws_object_key: String,
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Deserialize)]
struct ReleasesResponse {
    releases: Vec<Release>,
}

#[derive(Deserialize)]
struct ProductFilesResponse {
    product_files: Vec<ProductFile>,
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

/// Operations the download driver needs from the API
#[async_trait]
pub trait PivnetApi: Send + Sync {
    async fn releases(&self, slug: &str) -> ResourceResult<Vec<Release>>;

    async fn product_files(&self, slug: &str, release_id: u64) -> ResourceResult<Vec<ProductFile>>;

    async fn accept_eula(&self, slug: &str, release_id: u64) -> ResourceResult<()>;

    /// Stream a product file into `target`
    async fn download_product_file(
        &self,
        slug: &str,
        release_id: u64,
        file: &ProductFile,
        target: &Path,
        progress: &TransferProgress,
    ) -> ResourceResult<()>;
}

/// HTTP implementation of [`PivnetApi`]
pub struct PivnetClient {
    api_base: String,
    token: String,
    agent: Agent,
    policy: RetryPolicy,
    cancel: CancellationToken,
    authorization: OnceCell<String>,
}

impl PivnetClient {
    pub fn new(host: &str, token: &str, ctx: &DriverContext) -> ResourceResult<Self> {
        let host = if host.is_empty() { DEFAULT_HOST } else { host };
        let mut base = Url::parse(host)
            .map_err(|e| ResourceError::User(format!("invalid pivnet_host '{}': {}", host, e)))?;
        base.path_segments_mut()
            .map_err(|_| ResourceError::User(format!("invalid pivnet_host '{}'", host)))?
            .pop_if_empty()
            .extend(["api", "v2"]);

        Ok(Self {
            api_base: base.as_str().trim_end_matches('/').to_string(),
            token: token.to_string(),
            agent: build_agent(&ctx.settings.download, false),
            policy: RetryPolicy::from_settings(&ctx.settings.download),
            cancel: ctx.cancel.clone(),
            authorization: OnceCell::new(),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    /// `Authorization` header value, exchanging a refresh token on first use
    async fn authorization(&self) -> ResourceResult<String> {
        self.authorization
            .get_or_try_init(|| async {
                if self.token.len() <= LEGACY_TOKEN_MAX_LEN {
                    return Ok(format!("Token {}", self.token));
                }

                debug!("Exchanging refresh token for an access token");
                let agent = self.agent.clone();
                let url = self.endpoint("authentication/access_tokens");
                let token = self.token.clone();
                run_blocking(move || {
                    let mut response = agent
                        .post(&url)
                        .header("User-Agent", USER_AGENT)
                        .header("Accept", "application/json")
                        .send_json(serde_json::json!({ "refresh_token": token }))
                        .map_err(|e| ResourceError::Pivnet(format!("POST {}: {}", url, e)))?;
                    check_status(&url, &mut response)?;
                    let body: AccessTokenResponse = response
                        .body_mut()
                        .read_json()
                        .map_err(|e| ResourceError::Pivnet(format!("decoding {}: {}", url, e)))?;
                    Ok(format!("Bearer {}", body.access_token))
                })
                .await
            })
            .await
            .cloned()
    }

    async fn get_json<T>(&self, path: &str) -> ResourceResult<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let authorization = self.authorization().await?;
        let agent = self.agent.clone();
        let url = self.endpoint(path);
        run_blocking(move || {
            let mut response = agent
                .get(&url)
                .header("Authorization", authorization.as_str())
                .header("Accept", "application/json")
                .header("User-Agent", USER_AGENT)
                .call()
                .map_err(|e| ResourceError::Pivnet(format!("GET {}: {}", url, e)))?;
            check_status(&url, &mut response)?;
            response
                .body_mut()
                .read_json()
                .map_err(|e| ResourceError::Pivnet(format!("decoding {}: {}", url, e)))
        })
        .await
    }
}

/// Turn a non-2xx API response into an error carrying the response body
fn check_status(url: &str, response: &mut Response<Body>) -> ResourceResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.body_mut().read_to_string().unwrap_or_default();
    Err(ResourceError::Pivnet(format!(
        "{} returned {}: {}",
        url,
        status.as_u16(),
        body.trim()
    )))
}

#[async_trait]
impl PivnetApi for PivnetClient {
    async fn releases(&self, slug: &str) -> ResourceResult<Vec<Release>> {
        let response: ReleasesResponse =
            self.get_json(&format!("products/{}/releases", slug)).await?;
        Ok(response.releases)
    }

    async fn product_files(&self, slug: &str, release_id: u64) -> ResourceResult<Vec<ProductFile>> {
        let response: ProductFilesResponse = self
            .get_json(&format!(
                "products/{}/releases/{}/product_files",
                slug, release_id
            ))
            .await?;
        Ok(response.product_files)
    }

    async fn accept_eula(&self, slug: &str, release_id: u64) -> ResourceResult<()> {
        let authorization = self.authorization().await?;
        let agent = self.agent.clone();
        let url = self.endpoint(&format!(
            "products/{}/releases/{}/pivnet_resource_eula_acceptance",
            slug, release_id
        ));
        run_blocking(move || {
            let mut response = agent
                .post(&url)
                .header("Authorization", authorization.as_str())
                .header("Accept", "application/json")
                .header("User-Agent", USER_AGENT)
                .send_empty()
                .map_err(|e| ResourceError::Pivnet(format!("POST {}: {}", url, e)))?;
            check_status(&url, &mut response)
        })
        .await
    }

    async fn download_product_file(
        &self,
        slug: &str,
        release_id: u64,
        file: &ProductFile,
        target: &Path,
        progress: &TransferProgress,
    ) -> ResourceResult<()> {
        let authorization = self.authorization().await?;
        let agent = self.agent.clone();
        let url = self.endpoint(&format!(
            "products/{}/releases/{}/product_files/{}/download",
            slug, release_id, file.id
        ));

        // The API answers with a redirect to the storage location; the agent
        // follows it and does not forward the Authorization header.
        let request_url = url.clone();
        let send = move || {
            agent
                .post(&request_url)
                .header("Authorization", authorization.as_str())
                .header("User-Agent", USER_AGENT)
                .send_empty()
        };

        stream::download_to_path(send, &url, target, progress, &self.policy, &self.cancel)
            .await
            .map(|_| ())
    }
}
