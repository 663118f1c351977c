//! S3-compatible object store file provider

use crate::error::{ResourceError, ResourceResult};
use crate::fetcher::matcher::{select_object, ObjectEntry};
use crate::fetcher::retry::{retry_transfer, RetryPolicy};
use crate::fetcher::stream::part_path;
use crate::fetcher::{ensure_dir, DriverContext, FileProvider};
use crate::types::Source;
use crate::ui::{TransferProgress, UiContext};
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;
use aws_smithy_http_client::hyper_014::HyperClientBuilder;
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, ServerName};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

const DEFAULT_REGION: &str = "us-east-1";

/// Downloads the newest matching object from a bucket
#[derive(Debug, Clone)]
pub struct S3Provider {
    client: Client,
    bucket: String,
    ui: UiContext,
    cancel: CancellationToken,
    policy: RetryPolicy,
    part_size: u64,
}

/// Endpoint to hand the SDK, honouring `disable_ssl`
fn resolve_endpoint(endpoint: &str, region: &str, disable_ssl: bool) -> ResourceResult<Option<String>> {
    if !disable_ssl {
        return Ok((!endpoint.is_empty()).then(|| endpoint.to_string()));
    }

    if endpoint.is_empty() {
        return Ok(Some(format!("http://s3.{}.amazonaws.com", region)));
    }

    let mut url = Url::parse(endpoint)
        .map_err(|e| ResourceError::User(format!("invalid endpoint '{}': {}", endpoint, e)))?;
    url.set_scheme("http")
        .map_err(|_| ResourceError::User(format!("invalid endpoint '{}'", endpoint)))?;
    Ok(Some(url.as_str().trim_end_matches('/').to_string()))
}

/// Accepts any server certificate, for `skip_ssl_verification`
struct AcceptAnyCert;

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

/// SDK HTTP client that skips certificate verification
fn insecure_http_client() -> aws_sdk_s3::config::SharedHttpClient {
    let tls = ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
        .with_no_client_auth();
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(tls)
        .https_or_http()
        .enable_http1()
        .build();
    HyperClientBuilder::new().build(connector)
}

/// Parse `bytes <start>-<end>/<total>` into its start and end
fn parse_content_range(header: &str) -> Option<(u64, u64)> {
    let range = header.strip_prefix("bytes ")?;
    let (span, _total) = range.split_once('/')?;
    let (start, end) = span.split_once('-')?;
    Some((start.trim().parse().ok()?, end.trim().parse().ok()?))
}

/// Check a ranged response covers exactly `start..=end`
fn check_part(
    key: &str,
    start: u64,
    end: u64,
    content_range: Option<&str>,
    received: u64,
) -> ResourceResult<()> {
    match content_range {
        Some(header) => {
            if parse_content_range(header) != Some((start, end)) {
                return Err(ResourceError::ObjectStore(format!(
                    "getting {}: requested bytes {}-{}, server sent range '{}'",
                    key, start, end, header
                )));
            }
        }
        None if start != 0 => {
            return Err(ResourceError::ObjectStore(format!(
                "getting {}: server ignored range request for bytes {}-{}",
                key, start, end
            )));
        }
        None => {}
    }

    let expected = end - start + 1;
    if received > expected {
        return Err(ResourceError::ObjectStore(format!(
            "getting {}: expected {} bytes for range {}-{}, received {}",
            key, expected, start, end, received
        )));
    }
    if received < expected {
        return Err(ResourceError::transient(
            format!(
                "short read for {} bytes {}-{}: {} of {} bytes",
                key, start, end, received, expected
            ),
            0,
        ));
    }
    Ok(())
}

fn sdk_error(action: &str, err: impl std::error::Error) -> ResourceError {
    ResourceError::ObjectStore(format!("{}: {}", action, DisplayErrorContext(err)))
}

impl S3Provider {
    pub async fn new(source: &Source, ctx: &DriverContext) -> ResourceResult<Self> {
        if source.use_v2_signing {
            warn!("use_v2_signing is not supported by the object store client; signing with v4");
        }

        let region = if source.region_name.is_empty() {
            DEFAULT_REGION
        } else {
            source.region_name.as_str()
        };

        let loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .retry_config(
                RetryConfig::standard().with_max_attempts(ctx.settings.object_store.max_attempts),
            );
        let loader = if source.skip_ssl_verification {
            warn!("Skipping TLS certificate verification for the object store");
            loader.http_client(insecure_http_client())
        } else {
            loader
        };
        let loader = if source.access_key_id.is_empty() && source.secret_access_key.is_empty() {
            debug!("Using anonymous object store credentials");
            loader.no_credentials()
        } else {
            loader.credentials_provider(Credentials::new(
                &source.access_key_id,
                &source.secret_access_key,
                None,
                None,
                "artifact-resource",
            ))
        };
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(true);
        if let Some(endpoint) = resolve_endpoint(&source.endpoint, region, source.disable_ssl)? {
            debug!("Using object store endpoint {}", endpoint);
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: source.bucket.clone(),
            ui: ctx.ui.clone(),
            cancel: ctx.cancel.clone(),
            policy: RetryPolicy::from_settings(&ctx.settings.download),
            part_size: ctx.settings.object_store.part_size_bytes.max(1),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Every object under `prefix`, across all pages
    pub async fn list_objects(&self, prefix: &str) -> ResourceResult<Vec<ObjectEntry>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut objects = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| sdk_error("listing objects", e))?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    objects.push(ObjectEntry {
                        key: key.to_string(),
                        size: object.size().unwrap_or(0).max(0) as u64,
                    });
                }
            }
        }

        debug!("Listed {} objects under {}", objects.len(), prefix);
        Ok(objects)
    }

    async fn fetch_range(&self, key: &str, start: u64, end: u64) -> ResourceResult<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .range(format!("bytes={}-{}", start, end))
            .send()
            .await
            .map_err(|e| sdk_error(&format!("getting {}", key), e))?;

        let content_range = response.content_range().map(str::to_string);
        let body = response
            .body
            .collect()
            .await
            .map_err(|e| ResourceError::transient(format!("reading {}: {}", key, e), 0))?;
        let bytes = body.into_bytes().to_vec();

        check_part(key, start, end, content_range.as_deref(), bytes.len() as u64)?;
        Ok(bytes)
    }

    /// Download `object` in ranged parts into `target`
    async fn download_object(&self, object: &ObjectEntry, target: &Path) -> ResourceResult<()> {
        let part = part_path(target);
        let progress = TransferProgress::new(
            &self.ui,
            target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .as_deref()
                .unwrap_or(&object.key),
            object.size,
        );

        let result = self.write_parts(object, &part, &progress).await;
        if let Err(e) = result {
            if let Err(remove_err) = tokio::fs::remove_file(&part).await {
                if remove_err.kind() != ErrorKind::NotFound {
                    debug!("Could not remove {}: {}", part.display(), remove_err);
                }
            }
            return Err(e);
        }

        tokio::fs::rename(&part, target)
            .await
            .map_err(|e| ResourceError::io(format!("moving download to {}", target.display()), e))?;
        progress.finish();
        Ok(())
    }

    async fn write_parts(
        &self,
        object: &ObjectEntry,
        part: &Path,
        progress: &TransferProgress,
    ) -> ResourceResult<()> {
        let mut file = tokio::fs::File::create(part)
            .await
            .map_err(|e| ResourceError::io(format!("creating {}", part.display()), e))?;

        let mut start = 0;
        while start < object.size {
            let end = (start + self.part_size).min(object.size) - 1;
            let what = format!("{} bytes {}-{}", object.key, start, end);
            let bytes = retry_transfer(&self.policy, &self.cancel, progress, &what, |_| {
                self.fetch_range(&object.key, start, end)
            })
            .await?;

            file.write_all(&bytes)
                .await
                .map_err(|e| ResourceError::io(format!("writing {}", part.display()), e))?;
            progress.add(bytes.len() as u64);
            start = end + 1;
        }

        file.sync_all()
            .await
            .map_err(|e| ResourceError::io(format!("syncing {}", part.display()), e))
    }
}

#[async_trait]
impl FileProvider for S3Provider {
    async fn download_file(
        &self,
        target_dir: &Path,
        product_slug: &str,
        version: &str,
        pattern: &str,
    ) -> ResourceResult<Vec<PathBuf>> {
        ensure_dir(target_dir).await?;

        let objects = self.list_objects(product_slug).await?;
        let object = select_object(&objects, product_slug, version, pattern)?.ok_or_else(|| {
            ResourceError::NoObjectMatch {
                bucket: self.bucket.clone(),
                folder: product_slug.to_string(),
                pattern: pattern.to_string(),
            }
        })?;

        let file_name = object
            .key
            .replacen(&format!("{}/", product_slug), "", 1);
        let target = target_dir.join(file_name);
        info!("Downloading s3://{}/{}", self.bucket, object.key);

        self.download_object(object, &target).await?;
        Ok(vec![target])
    }

    fn provider_name(&self) -> &'static str {
        "s3"
    }
}
