//! Configuration validation for the relay bot.
//!
//! Collects every problem in one pass so a misconfigured deployment
//! reports all missing fields at once.

use thiserror::Error;

use crate::config::{
    Config, ConversationConfig, GeminiConfig, GitHubConfig, ObservabilityConfig, ReviewConfig,
    ServerConfig, SlackConfig,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port}: must be between 1 and 65535")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn require(value: &Option<String>, field: &str, errors: &mut Vec<ValidationError>) {
    if is_blank(value) {
        errors.push(ValidationError::MissingField {
            field: field.into(),
        });
    }
}

fn collect(errors: Vec<ValidationError>) -> ValidationResult<()> {
    let mut errors = errors;
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        let sections: [&dyn Validate; 6] = [
            &self.server,
            &self.slack,
            &self.gemini,
            &self.conversation,
            &self.review,
            &self.observability,
        ];
        for section in sections {
            if let Err(e) = section.validate() {
                errors.push(e);
            }
        }

        // An untouched GitHub section means plain replies; a partial one is a mistake.
        let github_started = [&self.github.token, &self.github.owner, &self.github.repo]
            .iter()
            .any(|v| !is_blank(v));
        if self.review.enabled && github_started {
            if let Err(e) = self.github.validate() {
                errors.push(e);
            }
        }

        collect(errors)
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort {
                port: self.port,
                field: "server.port".into(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "server.request_timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

impl Validate for SlackConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();
        require(&self.bot_token, "slack.bot_token", &mut errors);
        collect(errors)
    }
}

impl Validate for GeminiConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();
        require(&self.api_key, "gemini.api_key", &mut errors);
        if self.model.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "gemini.model".into(),
            });
        }
        if self.timeout_secs == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "gemini.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                errors.push(ValidationError::InvalidValue {
                    field: "gemini.temperature".into(),
                    reason: format!("{t} is outside 0.0..=2.0"),
                });
            }
        }
        collect(errors)
    }
}

impl Validate for GitHubConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();
        require(&self.token, "github.token", &mut errors);
        require(&self.owner, "github.owner", &mut errors);
        require(&self.repo, "github.repo", &mut errors);
        if url::Url::parse(&self.api_base).is_err() {
            errors.push(ValidationError::InvalidValue {
                field: "github.api_base".into(),
                reason: "not a valid URL".into(),
            });
        }
        collect(errors)
    }
}

impl Validate for ConversationConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();
        for (value, field) in [
            (self.max_sessions, "conversation.max_sessions"),
            (self.history_capacity, "conversation.history_capacity"),
        ] {
            if value == 0 {
                errors.push(ValidationError::InvalidValue {
                    field: field.into(),
                    reason: "must be greater than 0".into(),
                });
            }
        }
        if self.history_window > self.history_capacity {
            errors.push(ValidationError::InvalidValue {
                field: "conversation.history_window".into(),
                reason: format!(
                    "{} exceeds history_capacity {}",
                    self.history_window, self.history_capacity
                ),
            });
        }
        collect(errors)
    }
}

impl Validate for ReviewConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.enabled && self.decision_ttl_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "review.decision_ttl_secs".into(),
                reason: "must be greater than 0 when review is enabled".into(),
            });
        }
        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of {}", LEVELS.join(", ")),
            });
        }
        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: "must be 'json' or 'pretty'".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.slack.bot_token = Some("xoxb-1".into());
        config.gemini.api_key = Some("key".into());
        config.github.token = Some("ghp".into());
        config.github.owner = Some("acme".into());
        config.github.repo = Some("widgets".into());
        config
    }

    #[test]
    fn test_complete_config_is_valid() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_defaults_report_every_missing_credential() {
        let err = Config::default().validate().unwrap_err();
        let ValidationError::Multiple(errors) = err else {
            panic!("expected multiple errors, got {err:?}");
        };
        let text = format!("{errors:?}");
        assert!(text.contains("slack.bot_token"));
        assert!(text.contains("gemini.api_key"));
        assert!(!text.contains("github"));
    }

    #[test]
    fn test_unconfigured_github_is_valid_with_review_enabled() {
        let mut config = valid_config();
        config.github = GitHubConfig::default();
        assert!(config.review.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_github_reports_missing_fields() {
        let mut config = valid_config();
        config.github.repo = None;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("github.repo"));
    }

    #[test]
    fn test_github_optional_when_review_disabled() {
        let mut config = valid_config();
        config.review.enabled = false;
        config.github = GitHubConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_port_rejected() {
        let mut config = valid_config();
        config.server.port = 0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidPort { port: 0, .. })
        ));
    }

    #[test]
    fn test_window_larger_than_capacity_rejected() {
        let mut config = valid_config();
        config.conversation.history_capacity = 5;
        config.conversation.history_window = 10;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("conversation.history_window"));
    }

    #[test_case("info", "pretty", true ; "defaults")]
    #[test_case("DEBUG", "json", true ; "uppercase level")]
    #[test_case("verbose", "pretty", false ; "unknown level")]
    #[test_case("info", "xml", false ; "unknown format")]
    fn test_observability_values(level: &str, format: &str, ok: bool) {
        let section = ObservabilityConfig {
            log_level: level.into(),
            log_format: format.into(),
        };
        assert_eq!(section.validate().is_ok(), ok);
    }
}
