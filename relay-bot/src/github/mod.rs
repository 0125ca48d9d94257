//! GitHub integration for approved suggestions.

mod client;
mod issue;

pub use client::{CreateIssueRequest, GitHubClient, Issue, ProjectCard};
pub use issue::{GitHubIssueTracker, IssueDraft, IssueRef, IssueTracker};
