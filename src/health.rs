//! Preflight checks for repo-upload
//!
//! Verifies credentials, API access, the target repository and branch, and
//! the local source directory before anything is uploaded.

use crate::github::{Credentials, GitHubClient};
use crate::scanner::ScanOptions;
use crate::Config;
use std::path::Path;

/// What the checks should look at
#[derive(Debug, Clone, Default)]
pub struct CheckTarget<'a> {
    pub owner: Option<&'a str>,
    pub repo: Option<&'a str>,
    pub branch: Option<&'a str>,
    pub local_dir: Option<&'a Path>,
}

/// Result of system health checks
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// A token could be found
    pub token: CheckResult,
    /// The token is accepted by the API
    pub github_auth: CheckResult,
    /// The target repository is reachable
    pub repository: CheckResult,
    /// The target branch exists
    pub branch: CheckResult,
    /// The local directory is scannable (warning only when not given)
    pub local_dir: CheckResult,
}

/// Result of an individual health check
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
    pub is_warning: bool,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: None,
            is_warning: false,
        }
    }

    fn ok_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn warning_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: true,
        }
    }

    fn skipped(reason: impl Into<String>) -> Self {
        Self::warning_with_details("Skipped", reason)
    }
}

impl HealthCheck {
    /// Run all health checks
    pub async fn run(config: &Config, target: &CheckTarget<'_>) -> Self {
        let credentials = Credentials::detect(config);
        let token = Self::check_token(&credentials);
        let local_dir = Self::check_local_dir(target.local_dir, config);

        let client = match credentials {
            Ok(credentials) => GitHubClient::with_credentials(&config.github.api_url, credentials),
            Err(e) => Err(e),
        };

        let client = match client {
            Ok(client) => client,
            Err(e) => {
                let skipped = || CheckResult::skipped("No usable GitHub client");
                return Self {
                    token,
                    github_auth: CheckResult::error_with_details(
                        "GitHub client could not be created",
                        format!("{:#}", e),
                    ),
                    repository: skipped(),
                    branch: skipped(),
                    local_dir,
                };
            }
        };

        let github_auth = match client.authenticated_user().await {
            Ok(login) => CheckResult::ok_with_details(
                "GitHub authentication successful",
                format!("Username: {}", login),
            ),
            Err(e) => CheckResult::error_with_details(
                "GitHub authentication failed",
                format!("{:#}\nRun: repo-upload auth setup", e),
            ),
        };

        let (repository, branch) = match (target.owner, target.repo) {
            (Some(owner), Some(repo)) => {
                let repository = match client.repository(owner, repo).await {
                    Ok(info) => CheckResult::ok_with_details(
                        "Repository reachable",
                        format!(
                            "{} ({}, default branch: {})",
                            info.full_name,
                            if info.private { "private" } else { "public" },
                            info.default_branch.as_deref().unwrap_or("unknown")
                        ),
                    ),
                    Err(e) => CheckResult::error_with_details(
                        "Repository not reachable",
                        format!("{:#}", e),
                    ),
                };

                let branch_name = target.branch.unwrap_or(&config.upload.branch);
                let branch = if repository.passed {
                    match client.ensure_branch(owner, repo, branch_name).await {
                        Ok(()) => CheckResult::ok_with_details("Branch exists", branch_name),
                        Err(e) => CheckResult::error_with_details(
                            "Branch not found",
                            format!("{:#}", e),
                        ),
                    }
                } else {
                    CheckResult::skipped("Repository not reachable")
                };

                (repository, branch)
            }
            _ => (
                CheckResult::skipped("No repository given (use --owner and --repo)"),
                CheckResult::skipped("No repository given"),
            ),
        };

        Self {
            token,
            github_auth,
            repository,
            branch,
            local_dir,
        }
    }

    /// Check if all required checks passed (excludes warnings)
    pub fn all_passed(&self) -> bool {
        self.all_checks().iter().all(|(_, result)| result.passed)
    }

    /// Get list of failed checks (errors only, not warnings)
    pub fn errors(&self) -> Vec<&CheckResult> {
        self.all_checks()
            .into_iter()
            .map(|(_, result)| result)
            .filter(|r| !r.passed && !r.is_warning)
            .collect()
    }

    /// Get list of warnings
    pub fn warnings(&self) -> Vec<&CheckResult> {
        self.all_checks()
            .into_iter()
            .map(|(_, result)| result)
            .filter(|r| r.is_warning)
            .collect()
    }

    fn check_token(credentials: &anyhow::Result<Credentials>) -> CheckResult {
        match credentials {
            Ok(credentials) => CheckResult::ok_with_details(
                "GitHub token found",
                format!("Source: {:?}", credentials.strategy),
            ),
            Err(e) => CheckResult::error_with_details("No GitHub token", format!("{:#}", e)),
        }
    }

    /// Check the local directory can be scanned
    fn check_local_dir(local_dir: Option<&Path>, config: &Config) -> CheckResult {
        let Some(dir) = local_dir else {
            return CheckResult::skipped("No local directory given");
        };

        let options = ScanOptions::with_excludes(config.upload.exclude_patterns.iter().cloned())
            .follow_symlinks(config.upload.follow_symlinks);
        match crate::scanner::scan_directory_with(dir, None, &options) {
            Ok(records) if records.is_empty() => CheckResult::warning_with_details(
                "Local directory has no files",
                dir.display().to_string(),
            ),
            Ok(records) => CheckResult::ok_with_details(
                "Local directory readable",
                format!("{} file(s) in {}", records.len(), dir.display()),
            ),
            Err(e) => CheckResult::error_with_details(
                "Local directory cannot be uploaded",
                format!("{:#}", e),
            ),
        }
    }

    /// Get all checks as a slice for iteration
    pub fn all_checks(&self) -> [(&'static str, &CheckResult); 5] {
        [
            ("GitHub Token", &self.token),
            ("GitHub Authentication", &self.github_auth),
            ("Repository", &self.repository),
            ("Branch", &self.branch),
            ("Local Directory", &self.local_dir),
        ]
    }
}
