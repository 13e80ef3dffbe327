use anyhow::{anyhow, Context, Result};
use octocrab::params::repos::Reference;
use octocrab::Octocrab;
use std::env;
use std::process::Command;
use tracing::{debug, info, warn};

use crate::config::Config;

/// Token sources recognized by `github.auth_method`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Use GitHub CLI authentication
    GitHubCLI,
    /// Use environment variable token
    EnvironmentToken,
}

/// A token together with where it came from
#[derive(Clone)]
pub struct Credentials {
    pub strategy: AuthStrategy,
    pub token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("strategy", &self.strategy)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Resolve credentials according to the configured auth method
    pub fn detect(config: &Config) -> Result<Self> {
        let (strategy, token) = match config.github.auth_method.as_str() {
            "auto" => {
                // Environment first so a .env file always wins over gh
                if let Ok(token) = try_environment_token() {
                    (AuthStrategy::EnvironmentToken, token)
                } else if let Ok(token) = try_github_cli() {
                    (AuthStrategy::GitHubCLI, token)
                } else {
                    return Err(anyhow!(
                        "No GitHub authentication found. Please either:\n\
                         1. Set GITHUB_TOKEN in the environment or in a .env file\n\
                         2. Install and authenticate GitHub CLI: gh auth login"
                    ));
                }
            }
            "gh_cli" => {
                let token = try_github_cli()
                    .context("GitHub CLI authentication failed. Run: gh auth login")?;
                (AuthStrategy::GitHubCLI, token)
            }
            "token" => {
                let token = try_environment_token()
                    .context("GITHUB_TOKEN environment variable not found or invalid")?;
                (AuthStrategy::EnvironmentToken, token)
            }
            other => return Err(anyhow!("Unknown auth method: {}", other)),
        };

        info!("Using authentication strategy: {:?}", strategy);
        Ok(Self { strategy, token })
    }
}

/// Try to get token from environment variable
pub fn try_environment_token() -> Result<String> {
    debug!("Attempting environment variable authentication");

    let token = env::var("GITHUB_TOKEN").context("GITHUB_TOKEN environment variable not set")?;
    let token = token.trim().to_string();

    if token.is_empty() {
        return Err(anyhow!("GITHUB_TOKEN is empty"));
    }

    if !looks_like_github_token(&token) {
        warn!("GITHUB_TOKEN doesn't look like a GitHub token (expected a ghp_, gho_, ghs_ or github_pat_ prefix)");
    }

    debug!("Successfully found GITHUB_TOKEN environment variable");
    Ok(token)
}

/// Try to get token from GitHub CLI
pub fn try_github_cli() -> Result<String> {
    debug!("Attempting GitHub CLI authentication");

    let token_output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .context("Failed to run GitHub CLI (is gh installed?)")?;

    if !token_output.status.success() {
        return Err(anyhow!(
            "Failed to retrieve token from GitHub CLI: {}",
            String::from_utf8_lossy(&token_output.stderr).trim()
        ));
    }

    let token = String::from_utf8(token_output.stdout)
        .context("GitHub CLI token is not valid UTF-8")?
        .trim()
        .to_string();

    if token.is_empty() {
        return Err(anyhow!("GitHub CLI returned empty token"));
    }

    debug!("Successfully obtained token from GitHub CLI");
    Ok(token)
}

fn looks_like_github_token(token: &str) -> bool {
    ["ghp_", "gho_", "ghs_", "ghu_", "github_pat_"]
        .iter()
        .any(|prefix| token.starts_with(prefix))
}

/// Summary of the target repository as seen by the API
#[derive(Debug, Clone)]
pub struct RepositoryInfo {
    pub full_name: String,
    pub default_branch: Option<String>,
    pub private: bool,
}

/// Authenticated GitHub API client used for account and repository checks
pub struct GitHubClient {
    client: Octocrab,
    credentials: Credentials,
}

impl GitHubClient {
    /// Create a client from configuration, resolving credentials on the way
    pub fn new(config: &Config) -> Result<Self> {
        let credentials = Credentials::detect(config)?;
        Self::with_credentials(&config.github.api_url, credentials)
    }

    /// Create a client for an explicit API URL and token
    pub fn with_credentials(api_url: &str, credentials: Credentials) -> Result<Self> {
        let client = Octocrab::builder()
            .base_uri(api_url)
            .with_context(|| format!("Invalid GitHub API URL: {}", api_url))?
            .personal_token(credentials.token.clone())
            .build()
            .context("Failed to create GitHub client")?;

        Ok(Self {
            client,
            credentials,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Login of the token's owner
    pub async fn authenticated_user(&self) -> Result<String> {
        let user = self
            .client
            .current()
            .user()
            .await
            .context("Failed to get current user information. Check your authentication.")?;

        info!("Authenticated as GitHub user: {}", user.login);
        Ok(user.login)
    }

    /// Fetch the target repository
    pub async fn repository(&self, owner: &str, repo: &str) -> Result<RepositoryInfo> {
        debug!("Fetching repository {}/{}", owner, repo);

        let repository = self
            .client
            .repos(owner, repo)
            .get()
            .await
            .with_context(|| format!("Repository {}/{} is not accessible", owner, repo))?;

        Ok(RepositoryInfo {
            full_name: repository
                .full_name
                .unwrap_or_else(|| format!("{}/{}", owner, repo)),
            default_branch: repository.default_branch,
            private: repository.private.unwrap_or(false),
        })
    }

    /// Fail unless `branch` exists in the repository
    pub async fn ensure_branch(&self, owner: &str, repo: &str, branch: &str) -> Result<()> {
        debug!("Checking branch {} of {}/{}", branch, owner, repo);

        self.client
            .repos(owner, repo)
            .get_ref(&Reference::Branch(branch.to_string()))
            .await
            .with_context(|| format!("Branch {} not found in {}/{}", branch, owner, repo))?;

        Ok(())
    }
}

/// Utility functions for GitHub authentication setup
pub mod auth_setup {
    use super::*;

    /// Print how to provide a token
    pub fn setup_authentication() -> Result<()> {
        println!("🔧 repo-upload Authentication Setup");
        println!();

        if try_environment_token().is_ok() {
            println!("✅ GITHUB_TOKEN is set");
            return Ok(());
        }

        if try_github_cli().is_ok() {
            println!("✅ GitHub CLI (gh) is authenticated");
            return Ok(());
        }

        println!("❌ No GitHub token found");
        println!();
        println!("Recommended setup:");
        println!("1. Create a token with the 'contents: write' permission:");
        println!("   https://github.com/settings/tokens");
        println!();
        println!("2. Put it in a .env file next to where you run repo-upload:");
        println!("   GITHUB_TOKEN=your_token_here");
        println!();
        println!("Alternative: authenticate the GitHub CLI");
        println!("   gh auth login");

        Ok(())
    }

    /// Verify the configured token against the API
    pub async fn test_authentication(config: &Config) -> Result<()> {
        println!("🔍 Testing GitHub authentication...");

        let result = match GitHubClient::new(config) {
            Ok(client) => client
                .authenticated_user()
                .await
                .map(|login| (client.credentials().strategy, login)),
            Err(e) => Err(e),
        };

        match result {
            Ok((strategy, login)) => {
                println!("✅ Authentication successful");
                println!("   Username: {}", login);
                println!("   Token source: {:?}", strategy);
            }
            Err(e) => {
                println!("❌ Authentication failed: {:#}", e);
                println!();
                println!("To fix this, run: repo-upload auth setup");
            }
        }

        Ok(())
    }
}
