//! Create-or-update uploads through the GitHub Contents API
//!
//! Every file record goes through one check-then-write round trip:
//! look up the existing blob sha on the target branch, then PUT the new
//! content with that sha (when present) so existing files are updated
//! instead of rejected. Files are processed strictly one after another and
//! a failure on one file never stops the batch.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::scanner::{self, ScanOptions};

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_COMMIT_MESSAGE: &str = "Automated file upload";
pub const DEFAULT_ENCODING: &str = "utf-8";

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_string()
}

/// A single file destined for the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Repository-relative path, forward-slash separated
    pub path: String,
    /// Raw text, or already base64-encoded bytes when `encoding` is "base64"
    pub content: String,
    /// "utf-8" (default) or "base64"
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

impl FileRecord {
    /// A record holding plain text that still has to be encoded
    pub fn text(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            encoding: default_encoding(),
        }
    }

    /// A record whose content is already base64
    pub fn base64(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            encoding: "base64".to_string(),
        }
    }
}

/// How a record's content is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Utf8,
    Base64,
}

impl ContentEncoding {
    pub fn parse(label: &str) -> Result<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "base64" => Ok(Self::Base64),
            "utf-8" | "utf8" => Ok(Self::Utf8),
            other => Err(anyhow!("Unsupported encoding: {:?}", other)),
        }
    }
}

/// Content as the Contents API expects it: base64 of the file bytes
pub fn encode_content(record: &FileRecord) -> Result<String> {
    match ContentEncoding::parse(&record.encoding)? {
        ContentEncoding::Base64 => Ok(record.content.clone()),
        ContentEncoding::Utf8 => Ok(STANDARD.encode(record.content.as_bytes())),
    }
}

/// Result of uploading one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum UploadOutcome {
    /// GitHub answered 200 or 201
    Success { path: String, response: Value },
    /// GitHub answered with any other status
    Error {
        path: String,
        error: Value,
        status_code: u16,
    },
    /// Local fault before or while talking to GitHub
    Exception { path: String, error: String },
}

impl UploadOutcome {
    pub fn path(&self) -> &str {
        match self {
            Self::Success { path, .. } | Self::Error { path, .. } | Self::Exception { path, .. } => {
                path
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Aggregate report for a batch of uploads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReport {
    /// True only when no file failed
    pub success: bool,
    /// Successful outcomes in input order
    pub results: Vec<UploadOutcome>,
    /// Error and exception outcomes in input order
    pub errors: Vec<UploadOutcome>,
    pub uploaded_count: usize,
    pub error_count: usize,
}

impl UploadReport {
    pub fn from_outcomes(outcomes: Vec<UploadOutcome>) -> Self {
        let (results, errors): (Vec<_>, Vec<_>) =
            outcomes.into_iter().partition(UploadOutcome::is_success);

        Self {
            success: errors.is_empty(),
            uploaded_count: results.len(),
            error_count: errors.len(),
            results,
            errors,
        }
    }

    pub fn total(&self) -> usize {
        self.uploaded_count + self.error_count
    }
}

/// Target repository and commit settings shared by every file in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub message: String,
}

impl UploadRequest {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: DEFAULT_BRANCH.to_string(),
            message: DEFAULT_COMMIT_MESSAGE.to_string(),
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// JSON body of a create-or-update request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PutFileBody {
    pub message: String,
    pub content: String,
    pub branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Raw HTTP answer to a write request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

/// Transport used by the uploader
///
/// Implementations only move bytes; classifying responses into outcomes
/// is the uploader's job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentsApi: Send + Sync {
    /// Sha of the file currently stored at `path` on the request's branch,
    /// or `None` when there is nothing there
    async fn fetch_sha(&self, request: &UploadRequest, path: &str) -> Result<Option<String>>;

    /// Create or update the file at `path`
    async fn put_file(
        &self,
        request: &UploadRequest,
        path: &str,
        body: &PutFileBody,
    ) -> Result<ApiResponse>;
}

/// Sequential create-or-update uploader
pub struct Uploader<A> {
    api: A,
}

impl<A: ContentsApi> Uploader<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Upload every record, one at a time, and report per-file outcomes
    pub async fn upload_files(&self, request: &UploadRequest, files: Vec<FileRecord>) -> UploadReport {
        info!(
            "Uploading {} file(s) to {} on branch {}",
            files.len(),
            request.full_name(),
            request.branch
        );

        let mut outcomes = Vec::with_capacity(files.len());

        for record in &files {
            let outcome = self.upload_file(request, record).await;

            match &outcome {
                UploadOutcome::Success { path, .. } => info!("Uploaded {}", path),
                UploadOutcome::Error {
                    path, status_code, ..
                } => warn!("GitHub rejected {} with HTTP {}", path, status_code),
                UploadOutcome::Exception { path, error } => {
                    warn!("Failed to upload {}: {}", path, error)
                }
            }

            outcomes.push(outcome);
        }

        let report = UploadReport::from_outcomes(outcomes);

        info!(
            "Upload finished: {} uploaded, {} failed",
            report.uploaded_count, report.error_count
        );

        report
    }

    /// Scan `root` and upload everything found under it
    ///
    /// A scan failure aborts before anything is uploaded.
    pub async fn upload_directory(
        &self,
        request: &UploadRequest,
        root: &Path,
        remote_prefix: Option<&str>,
        options: &ScanOptions,
    ) -> Result<UploadReport> {
        let files = scanner::scan_directory_with(root, remote_prefix, options)
            .with_context(|| format!("Failed to scan {:?}", root))?;

        Ok(self.upload_files(request, files).await)
    }

    /// Upload one record, folding every failure into an outcome
    pub async fn upload_file(&self, request: &UploadRequest, record: &FileRecord) -> UploadOutcome {
        match self.try_upload_file(request, record).await {
            Ok(outcome) => outcome,
            Err(e) => UploadOutcome::Exception {
                path: record.path.clone(),
                error: format!("{:#}", e),
            },
        }
    }

    async fn try_upload_file(
        &self,
        request: &UploadRequest,
        record: &FileRecord,
    ) -> Result<UploadOutcome> {
        if record.path.trim().is_empty() {
            return Err(anyhow!("File record has an empty path"));
        }
        if record.path.split('/').any(|segment| segment == "." || segment == "..") {
            return Err(anyhow!("File path contains '.' or '..' segments"));
        }

        let content = encode_content(record)?;

        let sha = self
            .api
            .fetch_sha(request, &record.path)
            .await
            .with_context(|| format!("Failed to check existing file {}", record.path))?;

        debug!(
            "{} {}",
            if sha.is_some() { "Updating" } else { "Creating" },
            record.path
        );

        let body = PutFileBody {
            message: request.message.clone(),
            content,
            branch: request.branch.clone(),
            sha,
        };

        let response = self
            .api
            .put_file(request, &record.path, &body)
            .await
            .with_context(|| format!("Failed to write file {}", record.path))?;

        if matches!(response.status, 200 | 201) {
            let json: Value = serde_json::from_str(&response.body)
                .context("Failed to parse upload response as JSON")?;

            Ok(UploadOutcome::Success {
                path: record.path.clone(),
                response: json,
            })
        } else {
            let error = serde_json::from_str(&response.body)
                .unwrap_or_else(|_| Value::String(response.body.clone()));

            Ok(UploadOutcome::Error {
                path: record.path.clone(),
                error,
                status_code: response.status,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use quickcheck_macros::quickcheck;
    use serde_json::json;

    fn request() -> UploadRequest {
        UploadRequest::new("octocat", "hello-world")
    }

    fn created(path: &str) -> Result<ApiResponse> {
        Ok(ApiResponse {
            status: 201,
            body: json!({ "content": { "path": path, "sha": "new-sha" } }).to_string(),
        })
    }

    #[test]
    fn test_encoding_labels() {
        assert_eq!(ContentEncoding::parse("utf-8").unwrap(), ContentEncoding::Utf8);
        assert_eq!(ContentEncoding::parse("UTF8").unwrap(), ContentEncoding::Utf8);
        assert_eq!(ContentEncoding::parse("Base64").unwrap(), ContentEncoding::Base64);
        assert!(ContentEncoding::parse("latin-1").is_err());
    }

    #[test]
    fn test_encode_text_content() {
        let record = FileRecord::text("a.txt", "hello");
        assert_eq!(encode_content(&record).unwrap(), "aGVsbG8=");
    }

    #[test]
    fn test_record_encoding_defaults_to_utf8() {
        let record: FileRecord =
            serde_json::from_str(r#"{"path": "a.txt", "content": "hi"}"#).unwrap();
        assert_eq!(record.encoding, "utf-8");
    }

    #[quickcheck]
    fn base64_records_pass_through_unchanged(content: String) -> bool {
        encode_content(&FileRecord::base64("f", content.clone())).unwrap() == content
    }

    #[quickcheck]
    fn text_records_decode_back_to_their_bytes(content: String) -> bool {
        let encoded = encode_content(&FileRecord::text("f", content.clone())).unwrap();
        STANDARD.decode(encoded).unwrap() == content.as_bytes()
    }

    #[test]
    fn test_report_from_outcomes() {
        let report = UploadReport::from_outcomes(vec![
            UploadOutcome::Success {
                path: "a".into(),
                response: json!({}),
            },
            UploadOutcome::Exception {
                path: "b".into(),
                error: "boom".into(),
            },
            UploadOutcome::Error {
                path: "c".into(),
                error: json!({"message": "conflict"}),
                status_code: 409,
            },
        ]);

        assert!(!report.success);
        assert_eq!(report.uploaded_count, 1);
        assert_eq!(report.error_count, 2);
        assert_eq!(report.total(), 3);
        assert_eq!(report.errors[0].path(), "b");
        assert_eq!(report.errors[1].path(), "c");
    }

    #[test]
    fn test_empty_report_is_successful() {
        let report = UploadReport::from_outcomes(Vec::new());
        assert!(report.success);
        assert_eq!(report.total(), 0);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = UploadOutcome::Error {
            path: "docs/a.md".into(),
            error: json!({"message": "Conflict"}),
            status_code: 409,
        };

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["status_code"], 409);
        assert_eq!(value["path"], "docs/a.md");
    }

    #[test]
    fn test_put_body_omits_missing_sha() {
        let body = PutFileBody {
            message: "m".into(),
            content: "Yg==".into(),
            branch: "main".into(),
            sha: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("sha").is_none());
    }

    #[tokio::test]
    async fn test_new_file_is_created_without_sha() {
        let mut api = MockContentsApi::new();
        api.expect_fetch_sha()
            .with(eq(request()), eq("a.txt"))
            .times(1)
            .returning(|_, _| Ok(None));
        api.expect_put_file()
            .withf(|_, path, body| path == "a.txt" && body.sha.is_none() && body.content == "aGVsbG8=")
            .times(1)
            .returning(|_, path, _| created(path));

        let report = Uploader::new(api)
            .upload_files(&request(), vec![FileRecord::text("a.txt", "hello")])
            .await;

        assert!(report.success);
        assert_eq!(report.uploaded_count, 1);
        assert_matches!(&report.results[0], UploadOutcome::Success { path, .. } if path == "a.txt");
    }

    #[tokio::test]
    async fn test_existing_file_is_updated_with_sha() {
        let mut api = MockContentsApi::new();
        api.expect_fetch_sha()
            .returning(|_, _| Ok(Some("abc123".to_string())));
        api.expect_put_file()
            .withf(|_, _, body| body.sha.as_deref() == Some("abc123"))
            .times(1)
            .returning(|_, _, _| {
                Ok(ApiResponse {
                    status: 200,
                    body: "{}".to_string(),
                })
            });

        let report = Uploader::new(api)
            .upload_files(&request(), vec![FileRecord::text("a.txt", "v2")])
            .await;

        assert!(report.success);
    }

    #[tokio::test]
    async fn test_conflict_becomes_error_outcome() {
        let mut api = MockContentsApi::new();
        api.expect_fetch_sha().returning(|_, _| Ok(None));
        api.expect_put_file().returning(|_, _, _| {
            Ok(ApiResponse {
                status: 409,
                body: json!({ "message": "is at 1234 but expected 5678" }).to_string(),
            })
        });

        let report = Uploader::new(api)
            .upload_files(&request(), vec![FileRecord::text("a.txt", "x")])
            .await;

        assert!(!report.success);
        assert_matches!(
            &report.errors[0],
            UploadOutcome::Error { status_code: 409, error, .. } if error["message"] == "is at 1234 but expected 5678"
        );
    }

    #[tokio::test]
    async fn test_non_json_error_body_is_kept_as_text() {
        let mut api = MockContentsApi::new();
        api.expect_fetch_sha().returning(|_, _| Ok(None));
        api.expect_put_file().returning(|_, _, _| {
            Ok(ApiResponse {
                status: 502,
                body: "Bad Gateway".to_string(),
            })
        });

        let report = Uploader::new(api)
            .upload_files(&request(), vec![FileRecord::text("a.txt", "x")])
            .await;

        assert_matches!(
            &report.errors[0],
            UploadOutcome::Error { status_code: 502, error: Value::String(body), .. } if body == "Bad Gateway"
        );
    }

    #[tokio::test]
    async fn test_transport_failure_becomes_exception_and_batch_continues() {
        let mut api = MockContentsApi::new();
        let mut seq = Sequence::new();
        api.expect_fetch_sha()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(anyhow!("connection reset")));
        api.expect_fetch_sha()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(None));
        api.expect_put_file()
            .times(1)
            .returning(|_, path, _| created(path));

        let report = Uploader::new(api)
            .upload_files(
                &request(),
                vec![FileRecord::text("a.txt", "1"), FileRecord::text("b.txt", "2")],
            )
            .await;

        assert_eq!(report.total(), 2);
        assert_eq!(report.uploaded_count, 1);
        assert_matches!(
            &report.errors[0],
            UploadOutcome::Exception { path, error } if path == "a.txt" && error.contains("connection reset")
        );
        assert_eq!(report.results[0].path(), "b.txt");
    }

    #[tokio::test]
    async fn test_invalid_records_never_reach_the_api() {
        let mut api = MockContentsApi::new();
        api.expect_fetch_sha().never();
        api.expect_put_file().never();

        let mut unsupported = FileRecord::text("c.txt", "x");
        unsupported.encoding = "utf-16".to_string();

        let report = Uploader::new(api)
            .upload_files(&request(), vec![FileRecord::text("", "x"), unsupported])
            .await;

        assert_eq!(report.error_count, 2);
        assert!(report
            .errors
            .iter()
            .all(|outcome| matches!(outcome, UploadOutcome::Exception { .. })));
    }

    #[tokio::test]
    async fn test_dot_segments_are_rejected() {
        let mut api = MockContentsApi::new();
        api.expect_fetch_sha().never();
        api.expect_put_file().never();

        let files = vec![
            FileRecord::text("../../x.txt", "x"),
            FileRecord::text("docs/./a.md", "a"),
            FileRecord::text("docs/..", "b"),
        ];

        let report = Uploader::new(api).upload_files(&request(), files).await;

        assert_eq!(report.error_count, 3);
        assert_matches!(
            &report.errors[0],
            UploadOutcome::Exception { path, error } if path == "../../x.txt" && error.contains("..")
        );
    }

    #[tokio::test]
    async fn test_unparseable_success_body_is_exception() {
        let mut api = MockContentsApi::new();
        api.expect_fetch_sha().returning(|_, _| Ok(None));
        api.expect_put_file().returning(|_, _, _| {
            Ok(ApiResponse {
                status: 201,
                body: "<html>".to_string(),
            })
        });

        let report = Uploader::new(api)
            .upload_files(&request(), vec![FileRecord::text("a.txt", "x")])
            .await;

        assert_matches!(&report.errors[0], UploadOutcome::Exception { .. });
    }
}
