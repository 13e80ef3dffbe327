//! Common test utilities and helpers for repo-upload tests
#![allow(dead_code)]

use serde_json::{json, Value};
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const OWNER: &str = "octocat";
pub const REPO: &str = "hello-world";
pub const TOKEN: &str = "ghp_testtoken";

/// Test configuration helper
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub config_dir: PathBuf,
    pub original_env: Vec<(String, Option<String>)>,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_dir = temp_dir.path().join("repo-upload");
        std::fs::create_dir_all(&config_dir).expect("Failed to create config dir");

        // Store original environment variables
        let env_vars = vec!["GITHUB_TOKEN", "XDG_CONFIG_HOME", "HOME"];
        let original_env = env_vars
            .iter()
            .map(|var| (var.to_string(), env::var(var).ok()))
            .collect();

        Self {
            temp_dir,
            config_dir,
            original_env,
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn create_test_config(&self, content: &str) -> PathBuf {
        let config_path = self.config_dir.join("config.yml");
        std::fs::write(&config_path, content).expect("Failed to write test config");
        config_path
    }

    /// Config pointing the API at a mock server
    pub fn create_mock_config(&self, api_url: &str) -> PathBuf {
        self.create_test_config(&format!(
            r#"
github:
  api_url: "{api_url}"
  auth_method: "token"
  owner: "{OWNER}"
  repo: "{REPO}"
upload:
  branch: "main"
  commit_message: "Test upload"
"#
        ))
    }

    /// Write files (relative path, content) below `dir_name` and return the directory
    pub fn create_tree(&self, dir_name: &str, files: &[(&str, &str)]) -> PathBuf {
        let root = self.temp_dir.path().join(dir_name);
        std::fs::create_dir_all(&root).expect("Failed to create tree root");
        for (relative, content) in files {
            let full = root.join(relative);
            std::fs::create_dir_all(full.parent().unwrap()).expect("Failed to create parent");
            std::fs::write(full, content).expect("Failed to write fixture file");
        }
        root
    }
}

impl Drop for TestEnvironment {
    fn drop(&mut self) {
        // Restore original environment variables
        for (key, value) in &self.original_env {
            match value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }
}

/// Contents endpoint path for a repository file
pub fn contents_path(file: &str) -> String {
    format!("/repos/{}/{}/contents/{}", OWNER, REPO, file)
}

/// GET for `file` answers 404
pub async fn mount_missing(server: &MockServer, file: &str) {
    Mock::given(method("GET"))
        .and(path(contents_path(file)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Not Found",
            "documentation_url": "https://docs.github.com/rest/repos/contents#get-repository-content"
        })))
        .mount(server)
        .await;
}

/// GET for `file` on `branch` answers 200 with `sha`
pub async fn mount_existing(server: &MockServer, file: &str, branch: &str, sha: &str) {
    Mock::given(method("GET"))
        .and(path(contents_path(file)))
        .and(query_param("ref", branch))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "file",
            "path": file,
            "sha": sha,
            "encoding": "base64",
            "content": ""
        })))
        .mount(server)
        .await;
}

/// PUT for `file` answers `status` with a GitHub-shaped body
pub async fn mount_put(server: &MockServer, file: &str, status: u16) {
    let body = if status == 200 || status == 201 {
        json!({
            "content": { "path": file, "sha": "95b966ae1c166bd92f8ae7d1c313e738c731dfc3" },
            "commit": { "sha": "7638417db6d59f3c431d3e1f261cc637155684cd", "message": "Test upload" }
        })
    } else {
        json!({
            "message": format!("{} does not match", file),
            "documentation_url": "https://docs.github.com/rest/repos/contents#create-or-update-file-contents"
        })
    };

    Mock::given(method("PUT"))
        .and(path(contents_path(file)))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

/// JSON bodies of every PUT the server received, keyed by request path
pub async fn put_bodies(server: &MockServer) -> Vec<(String, Value)> {
    server
        .received_requests()
        .await
        .expect("Request recording is disabled")
        .into_iter()
        .filter(|request| request.method.to_string() == "PUT")
        .map(|request| {
            let body: Value =
                serde_json::from_slice(&request.body).expect("PUT body is not JSON");
            (request.url.path().to_string(), body)
        })
        .collect()
}

/// Assertion helpers for test validation
pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}
