//! Configuration management for the relay bot.
//!
//! The bot reads a single JSON file, `$RELAY_CONFIG` or `~/.relay/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `PORT` → server.port
//! - `RELAY_BIND_ADDRESS` → server.host
//! - `SLACK_BOT_TOKEN` → slack.bot_token
//! - `SLACK_SIGNING_SECRET` → slack.signing_secret
//! - `GEMINI_API_KEY` / `GOOGLE_API_KEY` → gemini.api_key
//! - `GEMINI_MODEL` → gemini.model
//! - `GITHUB_PAT` → github.token
//! - `GITHUB_ORG` → github.owner
//! - `GITHUB_REPO` → github.repo
//! - `GITHUB_PROJECT_ID` → github.project_column_id
//! - `SYSTEM_INSTRUCTION_PATH` → conversation.instruction_path
//! - `RELAY_LOG_LEVEL` → observability.log_level
//! - `RELAY_LOG_FORMAT` → observability.log_format

use crate::error::{Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".relay"),
        |dirs| dirs.home_dir().join(".relay"),
    )
}

/// Get the configuration file path, honoring `RELAY_CONFIG`.
pub fn config_path() -> PathBuf {
    std::env::var("RELAY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_dir().join("config.json"))
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Server
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-request timeout for the HTTP layer in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    10
}

// ============================================================================
// Slack
// ============================================================================

/// Slack app credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token (xoxb-...)
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Signing secret for request verification.
    /// When unset, inbound requests are not verified.
    #[serde(default)]
    pub signing_secret: Option<String>,

    /// Web API base URL
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            signing_secret: None,
            api_base: default_slack_api_base(),
        }
    }
}

fn default_slack_api_base() -> String {
    "https://slack.com/api".into()
}

// ============================================================================
// Gemini
// ============================================================================

/// Generative AI backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model name
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// API base URL
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Upper bound for a single generation call in seconds
    #[serde(default = "default_gemini_timeout")]
    pub timeout_secs: u64,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f64>,

    /// Maximum output tokens
    #[serde(default)]
    pub max_output_tokens: Option<i64>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
            timeout_secs: default_gemini_timeout(),
            temperature: None,
            max_output_tokens: None,
        }
    }
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".into()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}

fn default_gemini_timeout() -> u64 {
    60
}

// ============================================================================
// GitHub
// ============================================================================

/// Issue tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Personal access token
    #[serde(default)]
    pub token: Option<String>,

    /// Organization or user owning the repository
    #[serde(default)]
    pub owner: Option<String>,

    /// Repository name
    #[serde(default)]
    pub repo: Option<String>,

    /// Project column that created issues are added to (optional)
    #[serde(default)]
    pub project_column_id: Option<String>,

    /// API base URL (GitHub Enterprise or tests)
    #[serde(default = "default_github_api_base")]
    pub api_base: String,

    /// Labels applied to every created issue
    #[serde(default = "default_issue_labels")]
    pub labels: Vec<String>,

    /// Request timeout in seconds
    #[serde(default = "default_github_timeout")]
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            owner: None,
            repo: None,
            project_column_id: None,
            api_base: default_github_api_base(),
            labels: default_issue_labels(),
            timeout_secs: default_github_timeout(),
        }
    }
}

impl GitHubConfig {
    /// Whether enough is configured to create issues.
    pub fn is_configured(&self) -> bool {
        [&self.token, &self.owner, &self.repo]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

fn default_github_api_base() -> String {
    "https://api.github.com".into()
}

fn default_issue_labels() -> Vec<String> {
    vec![
        "slack-bot".into(),
        "gemini-approved".into(),
        "auto-generated".into(),
    ]
}

fn default_github_timeout() -> u64 {
    30
}

// ============================================================================
// Conversation
// ============================================================================

/// Conversation context limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Maximum number of live channel sessions
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Turns retained per channel
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Turns of history sent with each request
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Path of the system instruction file
    #[serde(default = "default_instruction_path")]
    pub instruction_path: PathBuf,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            history_capacity: default_history_capacity(),
            history_window: default_history_window(),
            instruction_path: default_instruction_path(),
        }
    }
}

fn default_max_sessions() -> usize {
    100
}

fn default_history_capacity() -> usize {
    50
}

fn default_history_window() -> usize {
    10
}

fn default_instruction_path() -> PathBuf {
    PathBuf::from("config/system-instructions.md")
}

// ============================================================================
// Review
// ============================================================================

/// Approve/reject review flow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Attach approve/reject buttons to replies (requires GitHub)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds a staged suggestion waits for a decision
    #[serde(default = "default_decision_ttl")]
    pub decision_ttl_secs: u64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            decision_ttl_secs: default_decision_ttl(),
        }
    }
}

fn default_decision_ttl() -> u64 {
    300
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub slack: SlackConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub conversation: ConversationConfig,

    #[serde(default)]
    pub review: ReviewConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .context(format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(host) = lookup("RELAY_BIND_ADDRESS") {
            self.server.host = host;
        }

        if let Some(token) = lookup("SLACK_BOT_TOKEN") {
            self.slack.bot_token = Some(token);
        }
        if let Some(secret) = lookup("SLACK_SIGNING_SECRET") {
            self.slack.signing_secret = Some(secret);
        }

        if let Some(key) = lookup("GEMINI_API_KEY").or_else(|| lookup("GOOGLE_API_KEY")) {
            self.gemini.api_key = Some(key);
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.gemini.model = model;
        }

        if let Some(token) = lookup("GITHUB_PAT") {
            self.github.token = Some(token);
        }
        if let Some(owner) = lookup("GITHUB_ORG") {
            self.github.owner = Some(owner);
        }
        if let Some(repo) = lookup("GITHUB_REPO") {
            self.github.repo = Some(repo);
        }
        if let Some(column) = lookup("GITHUB_PROJECT_ID") {
            self.github.project_column_id = Some(column);
        }

        if let Some(path) = lookup("SYSTEM_INSTRUCTION_PATH") {
            self.conversation.instruction_path = PathBuf::from(path);
        }

        if let Some(level) = lookup("RELAY_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("RELAY_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Socket address string for the HTTP server.
    pub fn bind_address(&self) -> String {
        if self.server.host.contains(':') {
            format!("[{}]:{}", self.server.host, self.server.port)
        } else {
            format!("{}:{}", self.server.host, self.server.port)
        }
    }
}
