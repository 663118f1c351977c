//! Streaming HTTP transfers into files
//!
//! `ureq` is blocking, so each attempt runs on tokio's blocking pool while
//! the retry loop, backoff and cancellation stay async. Data goes to a
//! hidden part file beside the target and is renamed into place only after
//! a complete transfer.

use crate::config::schema::DownloadSettings;
use crate::error::{ResourceError, ResourceResult};
use crate::fetcher::retry::{retry_transfer, RetryPolicy};
use crate::ui::TransferProgress;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use ureq::http::{HeaderMap, Response};
use ureq::tls::TlsConfig;
use ureq::{Agent, Body};

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("artifact-resource/", env!("CARGO_PKG_VERSION"));

/// Read buffer size; memory use per transfer is bounded by this
const CHUNK_SIZE: usize = 64 * 1024;

/// Build an agent with explicit timeouts; status codes are checked by callers
pub fn build_agent(settings: &DownloadSettings, skip_tls_verification: bool) -> Agent {
    let mut config = Agent::config_builder()
        .http_status_as_error(false)
        .timeout_connect(Some(settings.connect_timeout()))
        .timeout_recv_response(Some(settings.response_timeout()));

    if skip_tls_verification {
        config = config.tls_config(TlsConfig::builder().disable_verification(true).build());
    }

    config.build().into()
}

/// Run blocking work on the blocking pool
pub async fn run_blocking<T, F>(f: F) -> ResourceResult<T>
where
    F: FnOnce() -> ResourceResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ResourceError::Internal(format!("transfer task failed: {}", e)))?
}

/// Declared body length, if any
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Classify a request-level failure
pub fn request_error(err: ureq::Error, written: u64) -> ResourceError {
    if is_transient_request_error(&err) {
        ResourceError::transient(err.to_string(), written)
    } else {
        ResourceError::Http(err.to_string())
    }
}

fn is_transient_request_error(err: &ureq::Error) -> bool {
    match err {
        ureq::Error::Timeout(_) | ureq::Error::ConnectionFailed => true,
        ureq::Error::Io(e) => is_transient_io(e),
        _ => false,
    }
}

/// Network resets, aborts, timeouts and premature end of stream
pub fn is_transient_io(err: &std::io::Error) -> bool {
    if let Some(inner) = err.get_ref().and_then(|e| e.downcast_ref::<ureq::Error>()) {
        return is_transient_request_error(inner);
    }

    matches!(
        err.kind(),
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
            | ErrorKind::TimedOut
    )
}

/// One attempt: send the request and stream the body into `path`.
///
/// The file is truncated first, so every attempt starts from byte zero.
pub fn stream_response<S>(
    send: &S,
    url: &str,
    path: &Path,
    progress: &TransferProgress,
) -> ResourceResult<u64>
where
    S: Fn() -> Result<Response<Body>, ureq::Error>,
{
    let mut response = send().map_err(|e| request_error(e, 0))?;

    let status = response.status().as_u16();
    if matches!(status, 502..=504) {
        return Err(ResourceError::transient(
            format!("server returned {}", status),
            0,
        ));
    }
    if !response.status().is_success() {
        return Err(ResourceError::BadStatus {
            url: url.to_string(),
            status,
        });
    }

    let expected = if response.headers().contains_key("content-encoding") {
        None
    } else {
        content_length(response.headers())
    };
    if let Some(expected) = expected {
        progress.set_total(expected);
    }

    let mut file = std::fs::File::create(path)
        .map_err(|e| ResourceError::io(format!("creating {}", path.display()), e))?;
    let mut reader = response.body_mut().as_reader();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if is_transient_io(&e) => {
                return Err(ResourceError::transient(e.to_string(), written))
            }
            Err(e) => return Err(ResourceError::io("reading response body", e)),
        };

        file.write_all(&buf[..n])
            .map_err(|e| ResourceError::io(format!("writing {}", path.display()), e))?;
        written += n as u64;
        progress.add(n as u64);
    }

    if let Some(expected) = expected {
        if written < expected {
            return Err(ResourceError::transient(
                format!("unexpected EOF after {} of {} bytes", written, expected),
                written,
            ));
        }
    }

    file.sync_all()
        .map_err(|e| ResourceError::io(format!("syncing {}", path.display()), e))?;

    Ok(written)
}

/// Hidden part file next to `target`
pub fn part_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    target.with_file_name(format!(".{}.{}.part", name, uuid::Uuid::new_v4().simple()))
}

/// Download with bounded retries into `target`, leaving nothing behind on failure
pub async fn download_to_path<S>(
    send: S,
    url: &str,
    target: &Path,
    progress: &TransferProgress,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> ResourceResult<u64>
where
    S: Fn() -> Result<Response<Body>, ureq::Error> + Clone + Send + Sync + 'static,
{
    let part = part_path(target);
    debug!("Streaming {} into {}", url, part.display());

    let result = retry_transfer(policy, cancel, progress, url, |_| {
        let send = send.clone();
        let url = url.to_string();
        let part = part.clone();
        let progress = progress.clone();
        run_blocking(move || stream_response(&send, &url, &part, &progress))
    })
    .await;

    match result {
        Ok(written) => {
            tokio::fs::rename(&part, target).await.map_err(|e| {
                ResourceError::io(format!("moving download to {}", target.display()), e)
            })?;
            Ok(written)
        }
        Err(e) => {
            if let Err(remove_err) = tokio::fs::remove_file(&part).await {
                if remove_err.kind() != ErrorKind::NotFound {
                    debug!("Could not remove {}: {}", part.display(), remove_err);
                }
            }
            Err(e)
        }
    }
}
