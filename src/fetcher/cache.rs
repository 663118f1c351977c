//! Content cache for downloaded product files
//!
//! Entries live at `<cache_dir>/<file name>` and are trusted only when their
//! SHA-256 matches the digest the download API publishes. Entries are copied
//! out, never moved, so they stay available to later runs.

use crate::error::{ResourceError, ResourceResult};
use crate::fetcher::stream::run_blocking;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory of previously downloaded files
#[derive(Debug, Clone)]
pub struct ContentCache {
    dir: PathBuf,
}

impl ContentCache {
    /// Open the cache, creating its directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> ResourceResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ResourceError::io(format!("creating cache dir {}", dir.display()), e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Return the entry for `file_name` if it exists and is intact.
    ///
    /// A corrupt entry is removed. Without an expected digest nothing can be
    /// verified, so the lookup is a miss.
    pub async fn lookup(
        &self,
        file_name: &str,
        expected_sha256: Option<&str>,
    ) -> ResourceResult<Option<PathBuf>> {
        let path = self.entry_path(file_name);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }

        let Some(expected) = expected_sha256.filter(|s| !s.is_empty()) else {
            debug!("No digest for {}, ignoring cached copy", file_name);
            return Ok(None);
        };

        let actual = sha256_file(&path).await?;
        if actual.eq_ignore_ascii_case(expected) {
            debug!("Cache hit for {}", file_name);
            return Ok(Some(path));
        }

        warn!(
            "Removing corrupt cache {} (expected {}, got {})",
            path.display(),
            expected,
            actual
        );
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| ResourceError::io(format!("removing {}", path.display()), e))?;
        Ok(None)
    }

    /// Copy a cache entry to `target`
    pub async fn copy_to(&self, entry: &Path, target: &Path) -> ResourceResult<u64> {
        tokio::fs::copy(entry, target).await.map_err(|e| {
            ResourceError::io(
                format!("copying {} to {}", entry.display(), target.display()),
                e,
            )
        })
    }
}

/// Hex SHA-256 of a file's contents
pub async fn sha256_file(path: &Path) -> ResourceResult<String> {
    let path = path.to_path_buf();
    run_blocking(move || {
        let mut file = std::fs::File::open(&path)
            .map_err(|e| ResourceError::io(format!("opening {}", path.display()), e))?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = file
                .read(&mut buf)
                .map_err(|e| ResourceError::io(format!("reading {}", path.display()), e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    })
    .await
}

/// Fail unless `path` hashes to `expected`
pub async fn verify_sha256(path: &Path, name: &str, expected: &str) -> ResourceResult<()> {
    let actual = sha256_file(path).await?;
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(ResourceError::ChecksumMismatch {
            name: name.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
