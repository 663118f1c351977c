//! Glob matching and file naming for remote artifacts
//!
//! Patterns use shell-style globs where `*` never crosses a `/`, so a
//! pattern only ever matches files directly inside the product folder.

use crate::error::{ResourceError, ResourceResult};
use glob::{MatchOptions, Pattern};
use tracing::warn;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

fn compile(pattern: &str) -> ResourceResult<Pattern> {
    Pattern::new(pattern).map_err(|e| ResourceError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.msg.to_string(),
    })
}

/// Whether `full_name` is `<product_slug>/<something matching pattern>`
pub fn glob_matches(full_name: &str, product_slug: &str, pattern: &str) -> ResourceResult<bool> {
    let full_pattern = format!("{}/{}", Pattern::escape(product_slug), pattern);
    Ok(compile(&full_pattern)?.matches_with(full_name, MATCH_OPTIONS))
}

/// Glob match on the slug-prefixed path that also requires the version
pub fn matches(
    full_name: &str,
    product_slug: &str,
    pattern: &str,
    version: &str,
) -> ResourceResult<bool> {
    Ok(glob_matches(full_name, product_slug, pattern)? && full_name.contains(version))
}

/// Whether a bare file name matches `pattern`
pub fn file_name_matches(file_name: &str, pattern: &str) -> ResourceResult<bool> {
    Ok(compile(pattern)?.matches_with(file_name, MATCH_OPTIONS))
}

/// Last path segment of an object key
pub fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Substitute `version` into the placeholder of `pattern`, once.
///
/// The placeholder is the first `-*`; patterns without one fall back to
/// the first bare `*`.
pub fn derive_filename(pattern: &str, version: &str) -> String {
    if pattern.contains("-*") {
        pattern.replacen("-*", &format!("-{}", version), 1)
    } else {
        pattern.replacen('*', version, 1)
    }
}

/// A listed object in a remote store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
}

/// Pick the object to download from a listing.
///
/// Candidates are keys glob-matching `<slug>/<pattern>`. When any candidate
/// also carries the version string only those are kept. The last remaining
/// candidate in listing order wins.
pub fn select_object<'a>(
    objects: &'a [ObjectEntry],
    product_slug: &str,
    version: &str,
    pattern: &str,
) -> ResourceResult<Option<&'a ObjectEntry>> {
    let mut candidates = Vec::new();
    for object in objects {
        if glob_matches(&object.key, product_slug, pattern)? {
            candidates.push(object);
        }
    }

    if !version.is_empty() {
        let mut versioned = Vec::new();
        for object in &candidates {
            if matches(&object.key, product_slug, pattern, version)? {
                versioned.push(*object);
            }
        }
        if !versioned.is_empty() {
            candidates = versioned;
        }
    }

    if candidates.len() > 1 {
        let keys: Vec<&str> = candidates.iter().map(|o| o.key.as_str()).collect();
        warn!(
            "Pattern {} matched {} objects, using the last: {}",
            pattern,
            candidates.len(),
            keys.join(", ")
        );
    }

    Ok(candidates.last().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_PATH: &str = "elastic-runtime/cf-2.3.3-build.10.pivotal";

    #[test]
    fn matches_file_path() {
        assert!(matches(FULL_PATH, "elastic-runtime", "cf*.pivotal", "2.3.3").unwrap());
    }

    #[test]
    fn rejects_other_version() {
        assert!(!matches(FULL_PATH, "elastic-runtime", "cf*.pivotal", "2.3.4").unwrap());
    }

    #[test]
    fn slug_must_match_exactly() {
        assert!(!matches(FULL_PATH, "elastic-runtimer", "cf*.pivotal", "2.3.3").unwrap());
        assert!(!matches(FULL_PATH, "elastic", "*cf*.pivotal", "2.3.3").unwrap());
    }

    #[test]
    fn star_does_not_cross_directories() {
        assert!(!glob_matches("elastic-runtime/old/cf-2.3.3.pivotal", "elastic-runtime", "cf*.pivotal").unwrap());
        assert!(!glob_matches("elastic-runtime/old/cf-2.3.3.pivotal", "elastic-runtime", "*.pivotal").unwrap());
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let err = file_name_matches("cf.pivotal", "cf[").unwrap_err();
        assert!(matches!(err, ResourceError::InvalidPattern { .. }));
    }

    #[test]
    fn derive_filename_substitutes_once() {
        assert_eq!(derive_filename("cf-*.pivotal", "2.3.0"), "cf-2.3.0.pivotal");
        assert_eq!(derive_filename("cf-*-*.pivotal", "2.3.0"), "cf-2.3.0-*.pivotal");
        assert_eq!(derive_filename("cf*.pivotal", "2.3.0"), "cf2.3.0.pivotal");
    }

    #[test]
    fn base_name_of_key() {
        assert_eq!(base_name("product-files/cf/cf-2.3.0.pivotal"), "cf-2.3.0.pivotal");
        assert_eq!(base_name("cf.pivotal"), "cf.pivotal");
    }

    fn entry(key: &str) -> ObjectEntry {
        ObjectEntry {
            key: key.to_string(),
            size: 1,
        }
    }

    #[test]
    fn last_match_wins() {
        let objects = vec![
            entry("elastic-runtime/cf-2.3.1.pivotal"),
            entry("elastic-runtime/cf-2.3.2.pivotal"),
            entry("elastic-runtime/srt-2.3.2.pivotal"),
        ];

        let selected = select_object(&objects, "elastic-runtime", "", "cf-*.pivotal")
            .unwrap()
            .unwrap();
        assert_eq!(selected.key, "elastic-runtime/cf-2.3.2.pivotal");
    }

    #[test]
    fn version_bearing_keys_are_preferred() {
        let objects = vec![
            entry("elastic-runtime/cf-2.3.1.pivotal"),
            entry("elastic-runtime/cf-2.3.2.pivotal"),
        ];

        let selected = select_object(&objects, "elastic-runtime", "2.3.1", "cf-*.pivotal")
            .unwrap()
            .unwrap();
        assert_eq!(selected.key, "elastic-runtime/cf-2.3.1.pivotal");
    }

    #[test]
    fn version_filter_falls_back_to_glob_matches() {
        let objects = vec![entry("stemcells/light-bosh-stemcell-aws.tgz")];

        let selected = select_object(&objects, "stemcells", "97.28", "light-*.tgz").unwrap();
        assert_eq!(selected, Some(&objects[0]));
    }

    #[test]
    fn no_candidates() {
        let objects = vec![entry("other/cf-2.3.1.pivotal")];
        assert!(select_object(&objects, "elastic-runtime", "2.3.1", "cf-*.pivotal")
            .unwrap()
            .is_none());
    }
}
