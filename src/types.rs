//! Request and response envelopes exchanged with the CI system
//!
//! Every entry point reads one JSON request on stdin and writes one JSON
//! response on stdout. Field names follow the resource protocol exactly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Product slug stemcells are published under
pub const STEMCELL_PRODUCT: &str = "stemcells";

/// Opaque revision identifier for the tracked source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    #[serde(rename = "ref", default)]
    pub reference: String,
}

impl Version {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
        }
    }
}

/// Resource source configuration, supplied once per invocation
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Source {
    pub config_provider: String,
    pub file_provider: String,

    // Git metadata repository
    pub version_root: String,
    pub uri: String,
    pub branch: String,
    pub path: String,
    pub depth: Option<u32>,
    pub private_key: String,
    pub username: String,
    pub password: String,

    // Licensed download API
    pub pivnet_token: String,
    pub pivnet_host: String,

    // Plain HTTP file server
    pub base_url: String,

    // Object store
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region_name: String,
    pub endpoint: String,
    pub disable_ssl: bool,
    pub skip_ssl_verification: bool,
    pub server_side_encryption: String,
    pub use_v2_signing: bool,
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("config_provider", &self.config_provider)
            .field("file_provider", &self.file_provider)
            .field("version_root", &self.version_root)
            .field("uri", &self.uri)
            .field("branch", &self.branch)
            .field("path", &self.path)
            .field("depth", &self.depth)
            .field("private_key", &redact(&self.private_key))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("pivnet_token", &redact(&self.pivnet_token))
            .field("pivnet_host", &self.pivnet_host)
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &redact(&self.secret_access_key))
            .field("region_name", &self.region_name)
            .field("endpoint", &self.endpoint)
            .field("disable_ssl", &self.disable_ssl)
            .field("skip_ssl_verification", &self.skip_ssl_verification)
            .field("use_v2_signing", &self.use_v2_signing)
            .finish_non_exhaustive()
    }
}

/// Per-product version metadata stored as YAML in the git repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionInfo {
    pub version: String,
    #[serde(rename = "product")]
    pub product_slug: String,
    pub file_pattern: String,
    pub stemcell_version: String,
    pub stemcell_file_pattern: String,
}

impl VersionInfo {
    /// Whether this product pins a stemcell
    pub fn has_stemcell(&self) -> bool {
        !self.stemcell_version.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckRequest {
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub version: Option<Version>,
}

pub type CheckResponse = Vec<Version>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InParams {
    pub product: String,
    pub stemcell: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InRequest {
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub version: Version,
    #[serde(default)]
    pub params: InParams,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutRequest {
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub version: Version,
}

/// Response shared by `in` and `out`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: Version,
    pub metadata: Vec<MetadataField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataField {
    pub name: String,
    pub value: String,
}

impl MetadataField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_uses_ref_key() {
        let json = serde_json::to_string(&Version::new("abc123")).unwrap();
        assert_eq!(json, r#"{"ref":"abc123"}"#);
    }

    #[test]
    fn in_request_defaults_missing_fields() {
        let request: InRequest = serde_json::from_str(
            r#"{"source":{"uri":"git@example.com:org/versions.git"},"version":{"ref":"abc"},"params":{"product":"cf"}}"#,
        )
        .unwrap();

        assert_eq!(request.source.uri, "git@example.com:org/versions.git");
        assert_eq!(request.source.file_provider, "");
        assert_eq!(request.version.reference, "abc");
        assert_eq!(request.params.product, "cf");
        assert!(!request.params.stemcell);
    }

    #[test]
    fn check_request_without_version() {
        let request: CheckRequest = serde_json::from_str(r#"{"source":{}}"#).unwrap();
        assert!(request.version.is_none());
    }

    #[test]
    fn version_info_from_yaml() {
        let info: VersionInfo = serde_yaml::from_str(
            "version: 2.3.3\nproduct: elastic-runtime\nfile_pattern: cf-*.pivotal\nstemcell_version: \"97.28\"\n",
        )
        .unwrap();

        assert_eq!(info.product_slug, "elastic-runtime");
        assert_eq!(info.file_pattern, "cf-*.pivotal");
        assert_eq!(info.stemcell_version, "97.28");
        assert!(info.stemcell_file_pattern.is_empty());
        assert!(info.has_stemcell());
    }

    #[test]
    fn source_debug_redacts_secrets() {
        let source = Source {
            password: "hunter2".to_string(),
            pivnet_token: "token".to_string(),
            ..Source::default()
        };
        let debug = format!("{:?}", source);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
