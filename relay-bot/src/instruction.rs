//! System instruction backed by an editable file.
//!
//! The text is cached together with the file's modification time and
//! re-read only when that time changes or a reload is forced. A missing or
//! unreadable file yields [`DEFAULT_INSTRUCTION`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;
use tokio::sync::Mutex;

use crate::error::{BotError, BotResult};
use crate::provider::Message;

/// Instruction used when the file is absent or unreadable.
pub const DEFAULT_INSTRUCTION: &str = "You are an AI assistant running as a Slack bot. \
Give helpful and accurate answers to the user's questions and requests. \
Use code blocks and lists where they make the answer easier to read.";

/// Prefix of the synthetic leading turn carrying the instruction.
const INSTRUCTION_PREFIX: &str = "System instruction:\n";

struct Cached {
    text: String,
    modified: SystemTime,
}

/// Introspection snapshot, see [`InstructionStore::info`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstructionInfo {
    pub path: PathBuf,
    pub cached: bool,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Loads, caches, and rewrites the global system instruction.
pub struct InstructionStore {
    path: PathBuf,
    cache: Mutex<Option<Cached>>,
    reads: AtomicUsize,
}

impl InstructionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of times the file has actually been read.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Current instruction text. Never fails.
    pub async fn load(&self, force_reload: bool) -> String {
        let mut cache = self.cache.lock().await;

        let modified = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.modified().ok(),
            Err(e) => {
                tracing::debug!(
                    path = %self.path.display(),
                    error = %e,
                    "System instruction file unavailable, using default"
                );
                return DEFAULT_INSTRUCTION.to_string();
            }
        };

        if let (false, Some(cached), Some(modified)) = (force_reload, cache.as_ref(), modified) {
            if cached.modified == modified {
                tracing::trace!("System instruction served from cache");
                return cached.text.clone();
            }
        }

        match self.read_file().await {
            Ok(text) => {
                if let Some(modified) = modified {
                    *cache = Some(Cached {
                        text: text.clone(),
                        modified,
                    });
                }
                tracing::debug!(path = %self.path.display(), "System instruction loaded from file");
                text
            }
            Err(e) => {
                tracing::warn!(error = %e, "Using default system instruction");
                DEFAULT_INSTRUCTION.to_string()
            }
        }
    }

    async fn read_file(&self) -> BotResult<String> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| BotError::InstructionLoadFailed(format!("{}: {e}", self.path.display())))
    }

    /// Persist new instruction text and invalidate the cache.
    pub async fn update(&self, text: &str) -> bool {
        let mut cache = self.cache.lock().await;

        if let Err(e) = self.write_file(text).await {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to update system instruction");
            return false;
        }

        *cache = None;
        tracing::info!(path = %self.path.display(), "System instruction updated");
        true
    }

    async fn write_file(&self, text: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, text).await
    }

    /// Restore the built-in default text.
    pub async fn reset(&self) -> bool {
        self.update(DEFAULT_INSTRUCTION).await
    }

    pub async fn info(&self) -> InstructionInfo {
        let cache = self.cache.lock().await;
        InstructionInfo {
            path: self.path.clone(),
            cached: cache.is_some(),
            last_modified: cache.as_ref().map(|c| DateTime::<Utc>::from(c.modified)),
        }
    }

    /// Render the instruction as the leading user turn of a request.
    pub fn format_for_model(text: &str) -> Message {
        Message::user(format!("{INSTRUCTION_PREFIX}{text}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use std::time::Duration;

    fn store_in(dir: &tempfile::TempDir) -> InstructionStore {
        InstructionStore::new(dir.path().join("config").join("system-instructions.md"))
    }

    fn bump_mtime(path: &Path, secs: u64) {
        let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(secs))
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.load(false).await, DEFAULT_INSTRUCTION);
        assert!(!store.info().await.cached);
    }

    #[tokio::test]
    async fn test_unchanged_file_is_read_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.update("Be terse.").await);

        assert_eq!(store.load(false).await, "Be terse.");
        assert_eq!(store.load(false).await, "Be terse.");
        assert_eq!(store.read_count(), 1);

        let info = store.info().await;
        assert!(info.cached);
        assert!(info.last_modified.is_some());
    }

    #[tokio::test]
    async fn test_modified_file_is_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.update("first").await;
        assert_eq!(store.load(false).await, "first");

        std::fs::write(store.path(), "second").unwrap();
        bump_mtime(store.path(), 5);

        assert_eq!(store.load(false).await, "second");
        assert_eq!(store.read_count(), 2);
    }

    #[tokio::test]
    async fn test_force_reload_rereads() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.update("text").await;
        store.load(false).await;
        store.load(true).await;
        assert_eq!(store.read_count(), 2);
    }

    #[tokio::test]
    async fn test_update_creates_directories_and_invalidates_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.update("one").await;
        store.load(false).await;
        assert!(store.info().await.cached);

        assert!(store.update("two").await);
        assert!(!store.info().await.cached);
        assert_eq!(store.load(false).await, "two");
    }

    #[tokio::test]
    async fn test_reset_restores_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.update("custom").await;
        assert!(store.reset().await);
        assert_eq!(store.load(false).await, DEFAULT_INSTRUCTION);
    }

    #[tokio::test]
    async fn test_update_fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let store = InstructionStore::new(blocker.join("instructions.md"));
        assert!(!store.update("text").await);
    }

    #[tokio::test]
    async fn test_unreadable_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        // A directory at the instruction path has metadata but cannot be read as text.
        let path = dir.path().join("instructions.md");
        std::fs::create_dir(&path).unwrap();
        let store = InstructionStore::new(path);
        assert_eq!(store.load(false).await, DEFAULT_INSTRUCTION);
        assert!(!store.info().await.cached);
    }

    #[test]
    fn test_format_prefixes_instruction_as_user_turn() {
        let message = InstructionStore::format_for_model("Be kind.");
        assert_eq!(message.role, Role::User);
        assert_eq!(message.content, "System instruction:\nBe kind.");
    }
}
