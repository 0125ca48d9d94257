//! Slash commands for inspecting and resetting conversation state.

use serde::{Deserialize, Serialize};

use crate::instruction::InstructionStore;
use crate::session::{Role, SessionRegistry};

/// What to do with the system instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "text", rename_all = "snake_case")]
pub enum InstructionAction {
    Show,
    Info,
    Set(String),
    Reset,
}

/// A recognized slash command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum AdminCommand {
    /// `/clear-context`
    ClearContext,
    /// `/context-stats`
    ContextStats,
    /// `/session-stats`
    SessionStats,
    /// `/system-instruction [show|info|set <text>|reset]`
    SystemInstruction { action: InstructionAction },
}

/// Why a slash command could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Usage: /system-instruction [show|info|set <text>|reset]")]
    Usage,
}

impl AdminCommand {
    /// Parse a slash command name and its argument text.
    pub fn parse(command: &str, text: &str) -> Result<Self, CommandError> {
        match command.trim() {
            "/clear-context" => Ok(Self::ClearContext),
            "/context-stats" => Ok(Self::ContextStats),
            "/session-stats" => Ok(Self::SessionStats),
            "/system-instruction" => {
                let text = text.trim();
                let (sub, rest) = text
                    .split_once(char::is_whitespace)
                    .map_or((text, ""), |(s, r)| (s, r.trim()));
                let action = match sub.to_lowercase().as_str() {
                    "" | "show" => InstructionAction::Show,
                    "info" => InstructionAction::Info,
                    "reset" => InstructionAction::Reset,
                    "set" if !rest.is_empty() => InstructionAction::Set(rest.to_string()),
                    _ => return Err(CommandError::Usage),
                };
                Ok(Self::SystemInstruction { action })
            }
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    /// Run the command for `channel_id` and return the reply text.
    pub async fn execute(
        &self,
        channel_id: &str,
        registry: &SessionRegistry,
        instructions: &InstructionStore,
    ) -> String {
        match self {
            Self::ClearContext => {
                registry.remove(channel_id).await;
                tracing::info!(channel = %channel_id, "Cleared conversation history");
                "Cleared the conversation history for this channel.".into()
            }
            Self::ContextStats => match registry.stats_for(channel_id).await {
                None => "No conversation history for this channel yet.".into(),
                Some(stats) => {
                    let h = &stats.history;
                    let mut out = format!(
                        "📊 *Conversation stats*\n\
                         • Total messages: {} (user {}, model {})\n\
                         • Recent messages:",
                        h.total, h.user_turns, h.model_turns
                    );
                    for turn in &h.recent {
                        let icon = if turn.role == Role::User { "👤" } else { "🤖" };
                        out.push_str(&format!(
                            "\n  {icon} {} ({})",
                            turn.preview,
                            turn.created_at.format("%Y-%m-%d %H:%M:%S UTC")
                        ));
                    }
                    out
                }
            },
            Self::SessionStats => {
                let all = registry.stats_all().await;
                let mut out = format!(
                    "📊 *Sessions*: {} of {} in use",
                    all.count, all.max_sessions
                );
                for session in &all.sessions {
                    out.push_str(&format!(
                        "\n• <#{}>: {} messages",
                        session.key, session.history.total
                    ));
                }
                out
            }
            Self::SystemInstruction { action } => instruction_reply(action, instructions).await,
        }
    }
}

async fn instruction_reply(action: &InstructionAction, instructions: &InstructionStore) -> String {
    match action {
        InstructionAction::Show => {
            let text = instructions.load(false).await;
            format!("Current system instruction:\n```\n{text}\n```")
        }
        InstructionAction::Info => {
            let info = instructions.info().await;
            let modified = info
                .last_modified
                .map_or_else(|| "unknown".to_string(), |t| t.to_rfc3339());
            format!(
                "System instruction file: `{}`\n• Cached: {}\n• Last modified: {modified}",
                info.path.display(),
                if info.cached { "yes" } else { "no" },
            )
        }
        InstructionAction::Set(text) => {
            if instructions.update(text).await {
                "System instruction updated.".into()
            } else {
                "Failed to update the system instruction.".into()
            }
        }
        InstructionAction::Reset => {
            if instructions.reset().await {
                "System instruction reset to the default.".into()
            } else {
                "Failed to reset the system instruction.".into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::DEFAULT_INSTRUCTION;

    #[test]
    fn test_parses_known_commands() {
        assert_eq!(
            AdminCommand::parse("/clear-context", ""),
            Ok(AdminCommand::ClearContext)
        );
        assert_eq!(
            AdminCommand::parse("/context-stats", "ignored"),
            Ok(AdminCommand::ContextStats)
        );
        assert_eq!(
            AdminCommand::parse("/session-stats", ""),
            Ok(AdminCommand::SessionStats)
        );
        assert_eq!(
            AdminCommand::parse("/system-instruction", ""),
            Ok(AdminCommand::SystemInstruction {
                action: InstructionAction::Show
            })
        );
        assert_eq!(
            AdminCommand::parse("/system-instruction", "set  Be terse.\nAlways."),
            Ok(AdminCommand::SystemInstruction {
                action: InstructionAction::Set("Be terse.\nAlways.".into())
            })
        );
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(
            AdminCommand::parse("/deploy", ""),
            Err(CommandError::Unknown("/deploy".into()))
        );
        assert_eq!(
            AdminCommand::parse("/system-instruction", "set"),
            Err(CommandError::Usage)
        );
        assert_eq!(
            AdminCommand::parse("/system-instruction", "delete"),
            Err(CommandError::Usage)
        );
    }

    #[tokio::test]
    async fn test_clear_and_stats_operate_on_channel() {
        let dir = tempfile::tempdir().unwrap();
        let instructions = InstructionStore::new(dir.path().join("i.md"));
        let registry = SessionRegistry::default();
        let session = registry.get_or_create("C1").await;
        session.lock().await.append(Role::User, "hello");
        session.lock().await.append(Role::Model, "hi!");

        let stats = AdminCommand::ContextStats
            .execute("C1", &registry, &instructions)
            .await;
        assert!(stats.contains("Total messages: 2 (user 1, model 1)"));
        assert!(stats.contains("👤 hello"));
        assert!(stats.contains("🤖 hi!"));

        let all = AdminCommand::SessionStats
            .execute("C1", &registry, &instructions)
            .await;
        assert!(all.contains("1 of 100"));
        assert!(all.contains("<#C1>: 2 messages"));

        AdminCommand::ClearContext
            .execute("C1", &registry, &instructions)
            .await;
        assert!(!registry.contains("C1").await);
        let empty = AdminCommand::ContextStats
            .execute("C1", &registry, &instructions)
            .await;
        assert!(empty.contains("No conversation history"));
    }

    #[tokio::test]
    async fn test_instruction_subcommands() {
        let dir = tempfile::tempdir().unwrap();
        let instructions = InstructionStore::new(dir.path().join("cfg").join("i.md"));
        let registry = SessionRegistry::default();
        let run = |action| AdminCommand::SystemInstruction { action };

        let reply = run(InstructionAction::Set("Answer in haiku.".into()))
            .execute("C1", &registry, &instructions)
            .await;
        assert_eq!(reply, "System instruction updated.");

        let shown = run(InstructionAction::Show)
            .execute("C1", &registry, &instructions)
            .await;
        assert!(shown.contains("Answer in haiku."));

        let info = run(InstructionAction::Info)
            .execute("C1", &registry, &instructions)
            .await;
        assert!(info.contains("Cached: yes"));

        run(InstructionAction::Reset)
            .execute("C1", &registry, &instructions)
            .await;
        assert_eq!(instructions.load(false).await, DEFAULT_INSTRUCTION);
    }
}
