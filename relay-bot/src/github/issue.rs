//! Issue drafts built from approved suggestions, and the tracker seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_common::GitHubConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::client::{CreateIssueRequest, GitHubClient};
use crate::error::{BotError, BotResult};
use crate::hitl::PendingDecision;

const TITLE_PREFIX: &str = "[Slack Bot] ";
const TITLE_CHARS: usize = 50;

/// Issue content ready to submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueDraft {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
}

impl IssueDraft {
    /// Draft for a suggestion approved by `approver_id` at `approved_at`.
    pub fn from_decision(
        decision: &PendingDecision,
        approver_id: &str,
        approved_at: DateTime<Utc>,
        labels: &[String],
    ) -> Self {
        Self {
            title: issue_title(&decision.original_message),
            body: issue_body(decision, approver_id, approved_at),
            labels: labels.to_vec(),
            assignees: Vec::new(),
        }
    }
}

fn issue_title(message: &str) -> String {
    let mut chars = message.chars();
    let head: String = chars.by_ref().take(TITLE_CHARS).collect();
    let ellipsis = if chars.next().is_some() { "..." } else { "" };
    format!("{TITLE_PREFIX}{head}{ellipsis}")
}

fn issue_body(decision: &PendingDecision, approver_id: &str, approved_at: DateTime<Utc>) -> String {
    format!(
        "## Overview\n\
         This issue was generated automatically from a Gemini suggestion approved in Slack.\n\n\
         ## Original message\n\
         ```\n{original}\n```\n\n\
         ## Gemini's proposal\n\
         {proposal}\n\n\
         ## Metadata\n\
         - **Approved by**: <@{approver_id}>\n\
         - **Channel**: <#{channel}>\n\
         - **Approved at**: {approved_at}\n\
         - **Requested by**: <@{requester}>\n\n\
         ---\n\
         *Created by the Slack bot approval flow.*",
        original = decision.original_message,
        proposal = decision.proposed_response,
        channel = decision.channel_id,
        requester = decision.user_id,
        approved_at = approved_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

/// A created issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    pub number: i64,
    pub url: String,
}

/// Destination for approved suggestions.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn create_issue(&self, draft: &IssueDraft) -> BotResult<IssueRef>;
}

/// [`IssueTracker`] backed by a GitHub repository.
pub struct GitHubIssueTracker {
    client: GitHubClient,
    owner: String,
    repo: String,
    project_column_id: Option<String>,
}

impl GitHubIssueTracker {
    pub fn new(
        client: GitHubClient,
        owner: impl Into<String>,
        repo: impl Into<String>,
        project_column_id: Option<String>,
    ) -> Self {
        Self {
            client,
            owner: owner.into(),
            repo: repo.into(),
            project_column_id: project_column_id.filter(|c| !c.is_empty()),
        }
    }

    /// Build from config. `None` when token, owner, or repo is missing.
    pub fn from_config(config: &GitHubConfig) -> anyhow::Result<Option<Self>> {
        if !config.is_configured() {
            return Ok(None);
        }
        let (Some(token), Some(owner), Some(repo)) = (&config.token, &config.owner, &config.repo)
        else {
            return Ok(None);
        };

        let client = GitHubClient::with_base_url(
            token,
            &config.api_base,
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Some(Self::new(
            client,
            owner.as_str(),
            repo.as_str(),
            config.project_column_id.clone(),
        )))
    }
}

#[async_trait]
impl IssueTracker for GitHubIssueTracker {
    async fn create_issue(&self, draft: &IssueDraft) -> BotResult<IssueRef> {
        let request = CreateIssueRequest {
            title: draft.title.clone(),
            body: draft.body.clone(),
            labels: draft.labels.clone(),
            assignees: draft.assignees.clone(),
        };

        let issue = self
            .client
            .create_issue(&self.owner, &self.repo, &request)
            .await
            .map_err(|e| BotError::IssueCreationFailed(format!("{e:#}")))?;

        tracing::info!(
            repo = %format!("{}/{}", self.owner, self.repo),
            number = issue.number,
            "Created GitHub issue"
        );

        if let Some(column) = &self.project_column_id {
            if let Err(e) = self.client.add_issue_to_project(column, issue.id).await {
                tracing::warn!(number = issue.number, error = %e, "Failed to add issue to project");
                return Err(BotError::IssueCreationFailed(format!(
                    "issue #{} was created ({}) but adding it to the project failed: {e:#}",
                    issue.number, issue.html_url
                )));
            }
        }

        Ok(IssueRef {
            number: issue.number,
            url: issue.html_url,
        })
    }
}
