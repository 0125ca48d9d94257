//! Short-lived store of staged suggestions.
//!
//! Every entry owns one expiry task. Consuming and expiring both remove
//! through `take_entry` under the store lock. A firing task takes the entry
//! only if its generation still matches, so it can never remove a newer entry
//! staged under the same key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::PendingDecision;
use crate::error::{BotError, BotResult};

/// How long a suggestion waits for a decision.
pub const DEFAULT_DECISION_TTL: Duration = Duration::from_secs(300);

struct Staged {
    decision: PendingDecision,
    generation: u64,
    expiry: JoinHandle<()>,
}

type Entries = Arc<Mutex<HashMap<String, Staged>>>;

/// Keyed store whose entries are consumed once or expire.
pub struct PendingDecisionStore {
    entries: Entries,
    ttl: Duration,
    generations: AtomicU64,
}

impl PendingDecisionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            generations: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stage `decision` under its key, replacing and cancelling any entry
    /// already staged there.
    pub async fn stage(&self, decision: PendingDecision) {
        let key = decision.decision_key.clone();
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);

        let mut entries = self.entries.lock().await;
        let expiry = spawn_expiry(Arc::clone(&self.entries), key.clone(), generation, self.ttl);

        if let Some(previous) = entries.insert(
            key.clone(),
            Staged {
                decision,
                generation,
                expiry,
            },
        ) {
            previous.expiry.abort();
            tracing::debug!(key = %key, "Replaced staged decision");
        }

        tracing::debug!(key = %key, ttl_secs = self.ttl.as_secs(), "Staged decision");
    }

    /// Remove and return the entry, or `DecisionNotFound` if it was already
    /// consumed, expired, or never staged.
    pub async fn consume(&self, key: &str) -> BotResult<PendingDecision> {
        let mut entries = self.entries.lock().await;
        let staged = take_entry(&mut entries, key, None)
            .ok_or_else(|| BotError::DecisionNotFound(key.to_string()))?;

        staged.expiry.abort();
        Ok(staged.decision)
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.lock().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Cancel every timer and drop every entry.
    pub async fn shutdown(&self) {
        let mut entries = self.entries.lock().await;
        let dropped = entries.len();
        for (_, staged) in entries.drain() {
            staged.expiry.abort();
        }
        tracing::info!(dropped, "Pending decision store shut down");
    }
}

impl Default for PendingDecisionStore {
    fn default() -> Self {
        Self::new(DEFAULT_DECISION_TTL)
    }
}

/// Remove the entry under `key`. With `generation` set, only an entry staged
/// by that generation is removed.
fn take_entry(
    entries: &mut HashMap<String, Staged>,
    key: &str,
    generation: Option<u64>,
) -> Option<Staged> {
    match (entries.get(key), generation) {
        (Some(staged), Some(generation)) if staged.generation != generation => None,
        (Some(_), _) => entries.remove(key),
        (None, _) => None,
    }
}

fn spawn_expiry(entries: Entries, key: String, generation: u64, ttl: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(ttl).await;

        let mut entries = entries.lock().await;
        if take_entry(&mut entries, &key, Some(generation)).is_some() {
            tracing::info!(key = %key, "Pending decision expired");
        }
    })
}
