//! Conversation state: per-channel history and the session registry.

mod history;
mod registry;

pub use history::{HistoryBuffer, HistoryStats, Role, Turn, TurnPreview, DEFAULT_CAPACITY};
pub use registry::{
    RegistryStats, SessionHandle, SessionRegistry, SessionStats, DEFAULT_MAX_SESSIONS,
};
