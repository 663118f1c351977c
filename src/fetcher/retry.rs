//! Bounded retry with exponential backoff for streaming transfers

use crate::config::schema::DownloadSettings;
use crate::error::{ResourceError, ResourceResult};
use crate::ui::TransferProgress;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// How often and how patiently a transfer is retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Ceiling for any single delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &DownloadSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.retry_base_delay_ms),
            max_delay: Duration::from_millis(settings.retry_max_delay_ms),
        }
    }

    /// Policy without delays, for tests
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&DownloadSettings::default())
    }
}

/// Run `attempt` until it succeeds, fails permanently or runs out of retries.
///
/// Only errors where [`ResourceError::is_retryable`] holds are retried. The
/// bytes a failed attempt reported are taken back from `progress` before the
/// next attempt starts over.
pub async fn retry_transfer<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    progress: &TransferProgress,
    what: &str,
    mut attempt: F,
) -> ResourceResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ResourceResult<T>>,
{
    let mut retry = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(ResourceError::Cancelled);
        }

        let err = match attempt(retry).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => e,
            Err(e) => return Err(e),
        };

        progress.rewind(err.bytes_written());

        if retry >= policy.max_retries {
            return Err(ResourceError::RetriesExhausted {
                attempts: retry + 1,
                last: Box::new(err),
            });
        }

        let delay = policy.delay_for(retry);
        warn!(
            "{}: {}; retrying in {:?} ({}/{})",
            what,
            err,
            delay,
            retry + 1,
            policy.max_retries
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(ResourceError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        retry += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
        };

        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_secs(3));
        assert_eq!(policy.delay_for(40), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let progress = TransferProgress::hidden("file");

        let result = retry_transfer(
            &RetryPolicy::immediate(3),
            &CancellationToken::new(),
            &progress,
            "download",
            |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                let progress = progress.clone();
                async move {
                    progress.add(10);
                    if n < 2 {
                        Err(ResourceError::transient("connection reset", 10))
                    } else {
                        Ok(n)
                    }
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(progress.position(), 10);
    }

    #[tokio::test]
    async fn stops_after_max_retries() {
        let calls = AtomicU32::new(0);

        let err = retry_transfer(
            &RetryPolicy::immediate(2),
            &CancellationToken::new(),
            &TransferProgress::hidden("file"),
            "download",
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ResourceError::transient("unexpected EOF", 0)) }
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ResourceError::RetriesExhausted { attempts: 3, .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);

        let err = retry_transfer(
            &RetryPolicy::immediate(5),
            &CancellationToken::new(),
            &TransferProgress::hidden("file"),
            "download",
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(ResourceError::BadStatus {
                        url: "http://example.com".to_string(),
                        status: 404,
                    })
                }
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ResourceError::BadStatus { status: 404, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_retries() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = retry_transfer(
            &RetryPolicy::immediate(5),
            &cancel,
            &TransferProgress::hidden("file"),
            "download",
            |_| async { Ok::<_, ResourceError>(()) },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ResourceError::Cancelled));
    }
}
