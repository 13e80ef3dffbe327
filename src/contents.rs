//! HTTP transport for the GitHub Contents API

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::upload::{ApiResponse, ContentsApi, PutFileBody, UploadRequest};

const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Contents API client authenticated with a bearer token
#[derive(Clone)]
pub struct ContentsClient {
    http: Client,
    api_url: Url,
    token: String,
}

impl ContentsClient {
    /// Create a client for `api_url` (e.g. `https://api.github.com`)
    pub fn new(api_url: &str, token: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_url, token, None)
    }

    /// Create a client whose requests give up after `timeout`
    pub fn with_timeout(
        api_url: &str,
        token: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_url =
            Url::parse(api_url).with_context(|| format!("Invalid GitHub API URL: {}", api_url))?;

        if api_url.cannot_be_a_base() {
            return Err(anyhow!("GitHub API URL cannot be used as a base: {}", api_url));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_MEDIA_TYPE));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );

        let mut builder = Client::builder()
            .user_agent(concat!("repo-upload/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers);

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder.build().context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            api_url,
            token: token.into(),
        })
    }

    /// `{api_url}/repos/{owner}/{repo}/contents/{path}` with every segment escaped
    pub fn contents_url(&self, owner: &str, repo: &str, path: &str) -> Result<Url> {
        let mut url = self.api_url.clone();

        url.path_segments_mut()
            .map_err(|_| anyhow!("GitHub API URL cannot be used as a base: {}", self.api_url))?
            .pop_if_empty()
            .extend(["repos", owner, repo, "contents"])
            .extend(path.split('/').filter(|segment| !segment.is_empty()));

        Ok(url)
    }
}

#[async_trait]
impl ContentsApi for ContentsClient {
    async fn fetch_sha(&self, request: &UploadRequest, path: &str) -> Result<Option<String>> {
        let url = self.contents_url(&request.owner, &request.repo, path)?;

        let response = self
            .http
            .get(url)
            .query(&[("ref", request.branch.as_str())])
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("GET request for {} failed", path))?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!("No existing file at {} (HTTP {})", path, status.as_u16());
            return Ok(None);
        }

        let body: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse existing content for {}", path))?;

        match body.get("sha").and_then(Value::as_str) {
            Some(sha) => Ok(Some(sha.to_string())),
            None => Err(anyhow!(
                "Existing content at {} has no sha (is it a directory?)",
                path
            )),
        }
    }

    async fn put_file(
        &self,
        request: &UploadRequest,
        path: &str,
        body: &PutFileBody,
    ) -> Result<ApiResponse> {
        let url = self.contents_url(&request.owner, &request.repo, path)?;

        let response = self
            .http
            .put(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("PUT request for {} failed", path))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body for {}", path))?;

        Ok(ApiResponse { status, body })
    }
}
