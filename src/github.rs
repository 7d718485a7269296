//! GitHub runner environment and pull request API.

use std::env;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::ReleaseError;

const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_SERVER_URL: &str = "https://github.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// GitHub Actions runner environment, read once and passed explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerEnv {
    /// Checked-out workspace.
    pub workspace: PathBuf,
    /// Repository owner.
    pub owner: String,
    /// Repository name without owner.
    pub repo: String,
    /// REST API base URL.
    pub api_url: String,
    /// Web site base URL.
    pub server_url: String,
}

impl Default for RunnerEnv {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            owner: String::new(),
            repo: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            server_url: DEFAULT_SERVER_URL.to_string(),
        }
    }
}

impl RunnerEnv {
    /// Reads `GITHUB_WORKSPACE`, `GITHUB_REPOSITORY`, `GITHUB_REPOSITORY_OWNER`,
    /// `GITHUB_API_URL` and `GITHUB_SERVER_URL`.
    pub fn from_env() -> Self {
        let read = |key: &str| env::var(key).ok().filter(|v| !v.is_empty());
        let repository = read("GITHUB_REPOSITORY").unwrap_or_default();
        let (owner, repo) = match repository.split_once('/') {
            Some((owner, repo)) => (owner.to_string(), repo.to_string()),
            None => (String::new(), repository.clone()),
        };
        let defaults = Self::default();

        Self {
            workspace: read("GITHUB_WORKSPACE").map_or(defaults.workspace, PathBuf::from),
            owner: read("GITHUB_REPOSITORY_OWNER").unwrap_or(owner),
            repo,
            api_url: read("GITHUB_API_URL").unwrap_or(defaults.api_url),
            server_url: read("GITHUB_SERVER_URL").unwrap_or(defaults.server_url),
        }
    }
}

/// Pull request operations.
pub trait PullRequestApi: Send + Sync {
    /// Whether an open pull request from `head` into `base` exists.
    fn is_open<'a>(
        &'a self,
        base: &'a str,
        head: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;

    /// Opens a pull request from `head` into `base`, returning its web URL.
    fn open<'a>(
        &'a self,
        base: &'a str,
        head: &'a str,
        title: &'a str,
        body: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

#[derive(Serialize)]
struct CreatePullRequest<'a> {
    title: &'a str,
    head: String,
    base: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
}

#[derive(Deserialize)]
struct PullRequestResponse {
    html_url: String,
}

/// GitHub REST client for pull requests.
pub struct GitHubClient {
    client: Client,
    api_url: Url,
    owner: String,
    repo: String,
    token: String,
}

impl GitHubClient {
    /// Creates a client for the repository described by `runner`.
    pub fn new(runner: &RunnerEnv, token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        let api_url = Url::parse(&runner.api_url)
            .with_context(|| format!("Invalid GitHub API URL: {}", runner.api_url))?;

        Ok(Self {
            client,
            api_url,
            owner: runner.owner.clone(),
            repo: runner.repo.clone(),
            token,
        })
    }

    fn pulls_url(&self) -> Url {
        let path = format!(
            "{}/repos/{}/{}/pulls",
            self.api_url.path().trim_end_matches('/'),
            self.owner,
            self.repo
        );
        let mut url = self.api_url.clone();
        url.set_path(&path);
        url
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("accept", "application/vnd.github+json")
            .header("authorization", format!("token {}", self.token))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let error_text = response.text().await.unwrap_or_else(|e| {
            debug!("Failed to read error response body: {e}");
            String::new()
        });
        Err(ReleaseError::GitHubApi(format!("HTTP {status}: {error_text}")).into())
    }
}

impl PullRequestApi for GitHubClient {
    fn is_open<'a>(
        &'a self,
        base: &'a str,
        head: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(async move {
            let mut url = self.pulls_url();
            url.query_pairs_mut()
                .append_pair("head", &format!("{}:{head}", self.owner))
                .append_pair("base", base)
                .append_pair("state", "open")
                .append_pair("sort", "created")
                .append_pair("direction", "desc")
                .append_pair("per_page", "1");

            debug!(%url, "Listing pull requests");
            let response = self
                .request(reqwest::Method::GET, url)
                .send()
                .await
                .map_err(|e| ReleaseError::GitHubApi(e.to_string()))?;
            let pulls: Vec<serde_json::Value> = Self::check(response)
                .await?
                .json()
                .await
                .map_err(|e| ReleaseError::GitHubApi(e.to_string()))?;

            Ok(!pulls.is_empty())
        })
    }

    fn open<'a>(
        &'a self,
        base: &'a str,
        head: &'a str,
        title: &'a str,
        body: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let request = CreatePullRequest {
                title,
                head: format!("{}:{head}", self.owner),
                base,
                body,
            };

            let response = self
                .request(reqwest::Method::POST, self.pulls_url())
                .json(&request)
                .send()
                .await
                .map_err(|e| ReleaseError::GitHubApi(e.to_string()))?;
            let created: PullRequestResponse = Self::check(response)
                .await?
                .json()
                .await
                .map_err(|e| ReleaseError::GitHubApi(e.to_string()))?;

            info!(url = %created.html_url, head, base, "Opened pull request");
            Ok(created.html_url)
        })
    }
}
