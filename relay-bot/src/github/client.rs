//! GitHub REST client for issue and project-card creation.

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Client
// ============================================================================

/// GitHub API client.
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
}

impl GitHubClient {
    /// Create a client against `base_url` (api.github.com, GitHub Enterprise, or a test server).
    pub fn with_base_url(token: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("Relay-Bot/1.0"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create an issue in `owner/repo`.
    pub async fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        issue: &CreateIssueRequest,
    ) -> Result<Issue> {
        let url = format!("{}/repos/{}/{}/issues", self.base_url, owner, repo);

        let response = self
            .client
            .post(&url)
            .json(issue)
            .send()
            .await
            .context("Failed to create issue")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("GitHub API error {}: {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse issue response")
    }

    /// Add an existing issue to a classic project column as a card.
    pub async fn add_issue_to_project(&self, column_id: &str, issue_id: i64) -> Result<ProjectCard> {
        let url = format!("{}/projects/columns/{}/cards", self.base_url, column_id);
        let body = CreateCardRequest {
            content_id: issue_id,
            content_type: "Issue",
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to create project card")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("GitHub API error {}: {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse project card response")
    }
}

// ============================================================================
// Types
// ============================================================================

/// Request body for issue creation.
#[derive(Debug, Clone, Serialize)]
pub struct CreateIssueRequest {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
}

/// Issue as returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub id: i64,
    pub number: i64,
    pub html_url: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Serialize)]
struct CreateCardRequest {
    content_id: i64,
    content_type: &'static str,
}

/// Project card as returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectCard {
    pub id: i64,
}
