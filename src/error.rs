//! Error types for artifact-resource
//!
//! All modules use `ResourceResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for resource operations
pub type ResourceResult<T> = Result<T, ResourceError>;

/// All errors that can occur while checking or fetching artifacts
#[derive(Error, Debug)]
pub enum ResourceError {
    // Driver selection errors
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("source is missing required field: {0}")]
    MissingField(&'static str),

    // Git transport and auth errors
    #[error("private keys with passphrases are not supported")]
    EncryptedKey,

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    // Not-found errors
    #[error("Release Version {version} of product {slug} not found")]
    ReleaseNotFound { slug: String, version: String },

    #[error("no match for pattern: '{0}'")]
    NoPatternMatch(String),

    #[error("No files found in bucket {bucket}, folder {folder} matching pattern {pattern}")]
    NoObjectMatch {
        bucket: String,
        folder: String,
        pattern: String,
    },

    #[error("version file not found: {0}")]
    VersionFileNotFound(PathBuf),

    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // Resource errors
    #[error("file is too big to fit on this drive ({needed} bytes needed, {available} available)")]
    InsufficientSpace { needed: u64, available: u64 },

    // Transfer errors
    #[error("bad status for url {url}: {status}")]
    BadStatus { url: String, status: u16 },

    #[error("download request failed: {0}")]
    Http(String),

    #[error("transfer interrupted after {written} bytes: {reason}")]
    Transient { reason: String, written: u64 },

    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<ResourceError>,
    },

    #[error("licensed download API error: {0}")]
    Pivnet(String),

    #[error("object store error: {0}")]
    ObjectStore(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("checksum mismatch for {name}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command failed: {command}: {source}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // Orchestration step wrapper, rendered as the final diagnostic line
    #[error("error {doing}: {source}")]
    Step {
        doing: String,
        #[source]
        source: Box<ResourceError>,
    },

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl ResourceError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a git failure carrying the captured stderr
    pub fn git(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::Git {
            command: command.into(),
            stderr: stderr.into().trim().to_string(),
        }
    }

    /// Create a transient transfer failure
    pub fn transient(reason: impl Into<String>, written: u64) -> Self {
        Self::Transient {
            reason: reason.into(),
            written,
        }
    }

    /// Wrap this error with the step that was in progress
    pub fn during(self, doing: impl Into<String>) -> Self {
        Self::Step {
            doing: doing.into(),
            source: Box::new(self),
        }
    }

    /// Check if error is retryable by a streaming download loop
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Bytes written before a transient failure, for progress rewinds
    pub fn bytes_written(&self) -> u64 {
        match self {
            Self::Transient { written, .. } => *written,
            _ => 0,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Step { source, .. } => source.hint(),
            Self::EncryptedKey => Some("Remove the passphrase: ssh-keygen -p -N '' -f <key>"),
            Self::UnknownProvider(_) => Some(
                "config_provider accepts \"git\"; file_provider accepts \"pivnet\", \"s3\" or \"http\"",
            ),
            Self::InsufficientSpace { .. } => Some("Free up space on the worker volume"),
            Self::MissingField(_) => Some("Check the resource source configuration"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ResourceError::UnknownProvider("ftp".to_string());
        assert_eq!(err.to_string(), "unknown provider: ftp");
    }

    #[test]
    fn step_display() {
        let err = ResourceError::EncryptedKey.during("fetching version");
        assert_eq!(
            err.to_string(),
            "error fetching version: private keys with passphrases are not supported"
        );
    }

    #[test]
    fn error_hint() {
        let err = ResourceError::EncryptedKey.during("getting version info");
        assert!(err.hint().unwrap().contains("ssh-keygen"));
        assert_eq!(ResourceError::Cancelled.hint(), None);
    }

    #[test]
    fn error_retryable() {
        assert!(ResourceError::transient("connection reset", 10).is_retryable());
        assert!(!ResourceError::Cancelled.is_retryable());
        assert_eq!(ResourceError::transient("eof", 42).bytes_written(), 42);
    }
}
