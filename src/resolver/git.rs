//! Git-backed version resolver
//!
//! Drives the git CLI against a single working copy. The working copy is
//! cloned lazily on first use and then fetched, hard-reset and checked out on
//! every call, so after a successful call its checkout matches the requested
//! revision. One provider instance per working directory at a time.

use crate::config::schema::GitSettings;
use crate::error::{ResourceError, ResourceResult};
use crate::resolver::auth::{self, CredentialPaths, GitCredentials};
use crate::resolver::ConfigProvider;
use crate::types::{Source, Version, VersionInfo};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

const DEFAULT_BRANCH: &str = "master";

/// Version resolver reading per-product YAML files from a git repository
#[derive(Debug, Clone)]
pub struct GitProvider {
    version_root: String,
    uri: String,
    branch: String,
    path: Option<String>,
    depth: Option<u32>,
    credentials: GitCredentials,
    work_dir: PathBuf,
    credential_paths: CredentialPaths,
}

impl GitProvider {
    /// Build a provider from the request source and worker settings
    pub fn from_source(source: &Source, settings: &GitSettings) -> ResourceResult<Self> {
        if source.uri.is_empty() {
            return Err(ResourceError::MissingField("uri"));
        }

        let branch = if source.branch.is_empty() {
            DEFAULT_BRANCH.to_string()
        } else {
            source.branch.clone()
        };

        Ok(Self {
            version_root: source.version_root.clone(),
            uri: source.uri.clone(),
            branch,
            path: Some(source.path.clone()).filter(|p| !p.is_empty()),
            depth: source.depth.filter(|d| *d > 0),
            credentials: GitCredentials {
                private_key: source.private_key.clone(),
                username: source.username.clone(),
                password: source.password.clone(),
            },
            work_dir: settings.work_dir.clone(),
            credential_paths: CredentialPaths {
                private_key: settings.private_key_path.clone(),
                netrc: settings.netrc_path.clone(),
            },
        })
    }

    /// Path of the YAML file describing `product`
    pub fn version_file(&self, product: &str) -> PathBuf {
        self.work_dir
            .join(&self.version_root)
            .join(format!("{}.yml", product))
    }

    /// Bring the working copy to `revision` on the configured branch
    async fn sync(&self, env: &[(String, String)], revision: &str) -> ResourceResult<()> {
        if self.work_dir.exists() {
            debug!("Fetching {} into {}", self.branch, self.work_dir.display());
            self.git(env, Some(&self.work_dir), &["fetch", "origin", &self.branch])
                .await?;
        } else {
            self.clone_repo(env).await?;
        }

        let remote_branch = format!("origin/{}", self.branch);
        self.git(env, Some(&self.work_dir), &["reset", "--hard", &remote_branch])
            .await?;
        self.git(env, Some(&self.work_dir), &["checkout", "-q", revision])
            .await?;

        Ok(())
    }

    async fn clone_repo(&self, env: &[(String, String)]) -> ResourceResult<()> {
        info!("Cloning {} ({})", self.uri, self.branch);

        if let Some(parent) = self.work_dir.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ResourceError::io(format!("creating {}", parent.display()), e))?;
        }

        let depth = self.depth.map(|d| d.to_string());
        let work_dir = self.work_dir.to_string_lossy().into_owned();

        let mut args = vec!["clone", self.uri.as_str(), "--branch", self.branch.as_str()];
        if let Some(ref depth) = depth {
            args.extend(["--depth", depth.as_str()]);
        }
        args.extend(["--single-branch", work_dir.as_str()]);

        self.git(env, None, &args).await.map(|_| ())
    }

    /// Run a git command and return its stdout
    async fn git(
        &self,
        env: &[(String, String)],
        dir: Option<&Path>,
        args: &[&str],
    ) -> ResourceResult<String> {
        debug!("Executing: git {:?}", args);

        let mut cmd = Command::new("git");
        cmd.args(args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| ResourceError::command_failed(format!("git {}", args.join(" ")), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResourceError::git(args.join(" "), stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn prepare_auth(&self) -> ResourceResult<Vec<(String, String)>> {
        auth::prepare(&self.credentials, &self.credential_paths).await
    }
}

/// Reject product names that would escape the version root
fn validate_product_name(product: &str) -> ResourceResult<()> {
    if product.is_empty() {
        return Err(ResourceError::User("product name cannot be empty".to_string()));
    }
    if product.contains('/') || product.contains('\\') || product.contains("..") {
        return Err(ResourceError::User(format!(
            "invalid product name '{}': must not contain path separators or '..'",
            product
        )));
    }
    Ok(())
}

#[async_trait]
impl ConfigProvider for GitProvider {
    async fn latest_version(&self) -> ResourceResult<Version> {
        let env = self.prepare_auth().await?;
        self.sync(&env, "HEAD").await?;

        let mut args = vec!["log", "--format=%H", "--first-parent", "-1"];
        if let Some(ref path) = self.path {
            args.extend(["--", path.as_str()]);
        }

        let out = self.git(&env, Some(&self.work_dir), &args).await?;
        let reference = out.trim().to_string();
        if reference.is_empty() {
            return Err(ResourceError::git(
                args.join(" "),
                "no commits found on the tracked branch",
            ));
        }

        debug!("Latest version is {}", reference);
        Ok(Version::new(reference))
    }

    async fn version_info(&self, revision: &str, product: &str) -> ResourceResult<VersionInfo> {
        validate_product_name(product)?;

        let env = self.prepare_auth().await?;
        let revision = if revision.is_empty() { "HEAD" } else { revision };
        self.sync(&env, revision).await?;

        let file = self.version_file(product);
        let content = match tokio::fs::read_to_string(&file).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ResourceError::VersionFileNotFound(file))
            }
            Err(e) => {
                return Err(ResourceError::io(format!("reading {}", file.display()), e))
            }
        };

        let info: VersionInfo = serde_yaml::from_str(&content)?;
        debug!(
            "Resolved {} at {} to version {}",
            product, revision, info.version
        );
        Ok(info)
    }

    fn provider_name(&self) -> &'static str {
        "git"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> GitSettings {
        GitSettings {
            work_dir: PathBuf::from("/tmp/work"),
            private_key_path: PathBuf::from("/tmp/key"),
            netrc_path: PathBuf::from("/tmp/.netrc"),
        }
    }

    #[test]
    fn requires_uri() {
        let err = GitProvider::from_source(&Source::default(), &settings()).unwrap_err();
        assert!(matches!(err, ResourceError::MissingField("uri")));
    }

    #[test]
    fn defaults_branch_and_drops_empty_path() {
        let source = Source {
            uri: "https://example.com/versions.git".to_string(),
            depth: Some(0),
            ..Source::default()
        };
        let provider = GitProvider::from_source(&source, &settings()).unwrap();

        assert_eq!(provider.branch, "master");
        assert!(provider.path.is_none());
        assert!(provider.depth.is_none());
    }

    #[test]
    fn version_file_under_root() {
        let source = Source {
            uri: "https://example.com/versions.git".to_string(),
            version_root: "products".to_string(),
            ..Source::default()
        };
        let provider = GitProvider::from_source(&source, &settings()).unwrap();

        assert_eq!(
            provider.version_file("cf"),
            PathBuf::from("/tmp/work/products/cf.yml")
        );
    }

    #[test]
    fn product_name_validation() {
        assert!(validate_product_name("elastic-runtime").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name("../etc/passwd").is_err());
        assert!(validate_product_name("a/b").is_err());
    }

    fn run_git(dir: &Path, args: &[&str]) -> String {
        let output = std::process::Command::new("git")
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
            .args(["-c", "commit.gpgsign=false"])
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(output.status.success(), "git {:?} failed", args);
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    fn commit(repo: &Path, file: &str, content: &str) -> String {
        std::fs::write(repo.join(file), content).unwrap();
        run_git(repo, &["add", file]);
        run_git(repo, &["commit", "-q", "-m", "update"]);
        run_git(repo, &["rev-parse", "HEAD"])
    }

    #[tokio::test]
    async fn checkout_follows_requested_revision() {
        let dir = tempfile::TempDir::new().unwrap();
        let repo = dir.path().join("versions");
        std::fs::create_dir_all(&repo).unwrap();
        run_git(&repo, &["init", "-q"]);
        run_git(&repo, &["symbolic-ref", "HEAD", "refs/heads/master"]);
        let first = commit(&repo, "cf.yml", "version: 1.0.0\nproduct: elastic-runtime\n");
        let second = commit(&repo, "cf.yml", "version: 2.0.0\nproduct: elastic-runtime\n");

        let settings = GitSettings {
            work_dir: dir.path().join("work/repo"),
            private_key_path: dir.path().join("work/key"),
            netrc_path: dir.path().join("work/netrc"),
        };
        let source = Source {
            uri: repo.to_string_lossy().into_owned(),
            ..Source::default()
        };
        let provider = GitProvider::from_source(&source, &settings).unwrap();

        let old = provider.version_info(&first, "cf").await.unwrap();
        let new = provider.version_info(&second, "cf").await.unwrap();
        let old_again = provider.version_info(&first, "cf").await.unwrap();

        assert_eq!(old.version, "1.0.0");
        assert_eq!(new.version, "2.0.0");
        assert_eq!(old, old_again);
        assert_eq!(run_git(&provider.work_dir, &["rev-parse", "HEAD"]), first);

        assert_eq!(provider.latest_version().await.unwrap(), Version::new(second));
    }
}
