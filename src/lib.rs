//! repo-upload - push local files to a GitHub repository
//!
//! Walks a local directory and creates or updates every file in a GitHub
//! repository through the Contents API, one file at a time, collecting a
//! per-file report instead of stopping at the first failure.
//!
//! ## Modules
//!
//! - [`scanner`]: Local directory traversal into file records
//! - [`upload`]: File records, outcomes and the sequential uploader
//! - [`contents`]: HTTP transport for the Contents API
//! - [`github`]: Token discovery and authenticated API checks
//! - [`config`]: Configuration management and parsing
//! - [`health`]: Preflight diagnostics

pub mod config;
pub mod contents;
pub mod github;
pub mod health;
pub mod scanner;
pub mod upload;

pub use config::Config;
pub use contents::ContentsClient;
pub use github::{Credentials, GitHubClient};
pub use health::HealthCheck;
pub use scanner::{scan_directory, scan_directory_with, ScanOptions};
pub use upload::{
    ContentsApi, FileRecord, UploadOutcome, UploadReport, UploadRequest, Uploader,
};

use anyhow::Result;
use std::path::Path;

/// Scan `root` and upload it to `owner/repo` with a token
///
/// Convenience entry point for library users that do not need a config
/// file: uses the public GitHub API, the default branch and commit message
/// unless given, and no exclusions.
pub async fn upload_directory(
    token: &str,
    owner: &str,
    repo: &str,
    root: &Path,
    remote_prefix: Option<&str>,
    message: Option<&str>,
    branch: Option<&str>,
) -> Result<UploadReport> {
    let mut request = UploadRequest::new(owner, repo);
    if let Some(message) = message {
        request = request.with_message(message);
    }
    if let Some(branch) = branch {
        request = request.with_branch(branch);
    }

    let client = ContentsClient::new(&Config::default().github.api_url, token)?;
    Uploader::new(client)
        .upload_directory(&request, root, remote_prefix, &ScanOptions::default())
        .await
}
