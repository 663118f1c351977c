//! Integration tests for artifact-resource

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn resource() -> Command {
    cargo_bin_cmd!("artifact-resource")
}

/// Run git in `dir`, panicking on failure
fn git(dir: &Path, args: &[&str]) -> String {
    let output = std::process::Command::new("git")
        .args([
            "-c",
            "user.name=Test",
            "-c",
            "user.email=test@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git runs");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A worker sandbox: a seeded metadata repository plus isolated settings
struct Sandbox {
    root: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let repo = root.path().join("versions");
        std::fs::create_dir_all(&repo).unwrap();
        git(&repo, &["init", "-q"]);
        git(&repo, &["symbolic-ref", "HEAD", "refs/heads/master"]);

        let work = root.path().join("work");
        std::fs::write(
            root.path().join("settings.toml"),
            format!(
                "[git]\nwork_dir = {:?}\nprivate_key_path = {:?}\nnetrc_path = {:?}\n",
                work.join("repo"),
                work.join("key"),
                work.join("netrc"),
            ),
        )
        .unwrap();

        let sandbox = Self { root };
        sandbox.commit("cf.yml", "version: 2.3.0\nproduct: elastic-runtime\nfile_pattern: cf-*.pivotal\n");
        sandbox
    }

    fn repo(&self) -> PathBuf {
        self.root.path().join("versions")
    }

    fn commit(&self, file: &str, content: &str) -> String {
        std::fs::write(self.repo().join(file), content).unwrap();
        git(&self.repo(), &["add", file]);
        git(&self.repo(), &["commit", "-q", "-m", &format!("update {}", file)]);
        git(&self.repo(), &["rev-parse", "HEAD"])
    }

    fn cmd(&self) -> Command {
        let mut cmd = resource();
        cmd.env("ARTIFACT_RESOURCE_CONFIG", self.root.path().join("settings.toml"))
            .env_remove("ARTIFACT_RESOURCE_WORK_DIR")
            .env_remove("ARTIFACT_RESOURCE_CACHE_DIR");
        cmd
    }

    fn source(&self) -> serde_json::Value {
        serde_json::json!({ "uri": self.repo().to_string_lossy() })
    }

    fn check(&self) -> String {
        let request = serde_json::json!({ "source": self.source() });
        let output = self
            .cmd()
            .arg("check")
            .write_stdin(request.to_string())
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "check failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );

        let versions: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(versions.as_array().map(Vec::len), Some(1));
        versions[0]["ref"].as_str().unwrap().to_string()
    }
}

mod cli_tests {
    use super::*;
    use predicates::prelude::*;

    #[test]
    fn help_displays() {
        resource()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("check"))
            .stdout(predicate::str::contains("download"));
    }

    #[test]
    fn version_displays() {
        resource()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("artifact-resource"));
    }

    #[test]
    fn out_echoes_version() {
        let dir = TempDir::new().unwrap();
        resource()
            .args(["out", &dir.path().to_string_lossy()])
            .write_stdin(r#"{"source":{},"version":{"ref":"abc123"}}"#)
            .assert()
            .success()
            .stdout(r#"{"version":{"ref":"abc123"},"metadata":[]}"#.to_string() + "\n");
    }

    #[test]
    fn malformed_request_fails() {
        resource()
            .arg("check")
            .write_stdin("not json")
            .assert()
            .failure()
            .stdout(predicate::str::is_empty())
            .stderr(predicate::str::contains("error reading request"));
    }

    #[test]
    fn unknown_config_provider_fails() {
        resource()
            .arg("check")
            .write_stdin(r#"{"source":{"config_provider":"svn","uri":"x"}}"#)
            .assert()
            .failure()
            .stderr(predicate::str::contains(
                "error constructing driver: unknown provider: svn",
            ));
    }
}

mod git_tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn check_reports_head() {
        let sandbox = Sandbox::new();
        let head = git(&sandbox.repo(), &["rev-parse", "HEAD"]);

        assert_eq!(sandbox.check(), head);
    }

    #[test]
    #[serial]
    fn check_is_idempotent() {
        let sandbox = Sandbox::new();

        let first = sandbox.check();
        let second = sandbox.check();
        assert_eq!(first, second);
    }

    #[test]
    #[serial]
    fn check_follows_new_commits() {
        let sandbox = Sandbox::new();
        let before = sandbox.check();

        let after_commit = sandbox.commit("mysql.yml", "version: 2.4.0\nproduct: p-mysql\n");
        let after = sandbox.check();

        assert_ne!(before, after);
        assert_eq!(after, after_commit);
    }

    #[test]
    #[serial]
    fn in_with_unknown_file_provider_fails() {
        let sandbox = Sandbox::new();
        let dest = sandbox.root.path().join("dest");
        let mut source = sandbox.source();
        source["file_provider"] = "ftp".into();
        let request = serde_json::json!({
            "source": source,
            "version": { "ref": "" },
            "params": { "product": "cf" },
        });

        let output = sandbox
            .cmd()
            .args(["in", &dest.to_string_lossy()])
            .write_stdin(request.to_string())
            .output()
            .unwrap();

        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr)
            .contains("error constructing file provider: unknown provider: ftp"));
        assert!(dest.is_dir());
    }
}

mod http_tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FILE_PATH: &str = "/elastic-runtime/2.3.0/cf-2.3.0.pivotal";

    #[tokio::test(flavor = "multi_thread")]
    async fn in_downloads_from_http_server() {
        let server = MockServer::start().await;
        let body = b"pretend this is a tile".to_vec();
        Mock::given(method("HEAD"))
            .and(path(FILE_PATH))
            .respond_with(
                ResponseTemplate::new(200).insert_header("content-length", body.len().to_string()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(FILE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let sandbox = Sandbox::new();
        let head = git(&sandbox.repo(), &["rev-parse", "HEAD"]);
        let dest = sandbox.root.path().join("dest");
        let mut source = sandbox.source();
        source["file_provider"] = "http".into();
        source["base_url"] = server.uri().into();
        let request = serde_json::json!({
            "source": source,
            "version": { "ref": head },
            "params": { "product": "cf" },
        });

        let output = sandbox
            .cmd()
            .args(["in", &dest.to_string_lossy()])
            .write_stdin(request.to_string())
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "in failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );

        assert_eq!(std::fs::read(dest.join("cf-2.3.0.pivotal")).unwrap(), body);

        let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(response["version"]["ref"], head.as_str());
        let metadata: Vec<(String, String)> = response["metadata"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| {
                (
                    m["name"].as_str().unwrap().to_string(),
                    m["value"].as_str().unwrap().to_string(),
                )
            })
            .collect();
        assert_eq!(
            metadata,
            vec![
                ("resource_version".to_string(), env!("CARGO_PKG_VERSION").to_string()),
                ("ref".to_string(), head.clone()),
                ("product".to_string(), "elastic-runtime".to_string()),
                ("product_version".to_string(), "2.3.0".to_string()),
                ("file_pattern".to_string(), "cf-*.pivotal".to_string()),
            ]
        );
    }
}
