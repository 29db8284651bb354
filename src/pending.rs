//! In-memory hints about started events and the weekly fallback counters.
//!
//! Nothing here is authoritative: the remote folder listing always wins. A
//! pending entry only remembers which number a user's last "start" received,
//! so the matching "end" can reuse it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::categories::TwoStageKind;
use crate::stage_files::EventNumber;
use crate::store::{InMemoryStore, KeyValueStore};

pub type UserId = u64;

/// A started event waiting for its end screenshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub event_number: EventNumber,
    pub category: TwoStageKind,
    /// Folder the start screenshot was assigned to
    pub folder: String,
    pub created_at: DateTime<Utc>,
}

impl PendingEntry {
    /// Age in whole minutes at `now`
    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_minutes().max(0)
    }
}

fn pending_key(user_id: UserId, category: TwoStageKind) -> String {
    format!("{user_id}_{}", category.key())
}

fn user_prefix(user_id: UserId) -> String {
    format!("{user_id}_")
}

/// At most one pending entry per `(user, category)`
#[derive(Clone)]
pub struct PendingTable {
    store: Arc<dyn KeyValueStore<PendingEntry>>,
}

impl PendingTable {
    pub fn new(store: Arc<dyn KeyValueStore<PendingEntry>>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    /// Record a start, silently replacing any earlier entry for the key
    pub fn insert(
        &self,
        user_id: UserId,
        category: TwoStageKind,
        event_number: EventNumber,
        folder: &str,
        now: DateTime<Utc>,
    ) -> Option<PendingEntry> {
        let entry = PendingEntry {
            event_number,
            category,
            folder: folder.to_string(),
            created_at: now,
        };
        let previous = self.store.set(&pending_key(user_id, category), entry);
        if let Some(previous) = &previous {
            debug!(
                user_id,
                category = %category,
                replaced = previous.event_number,
                event_number,
                "Pending entry replaced"
            );
        }
        previous
    }

    pub fn get(&self, user_id: UserId, category: TwoStageKind) -> Option<PendingEntry> {
        self.store.get(&pending_key(user_id, category))
    }

    /// Remove and return the entry (the end stage consumes it)
    pub fn take(&self, user_id: UserId, category: TwoStageKind) -> Option<PendingEntry> {
        self.store.delete(&pending_key(user_id, category))
    }

    pub fn for_user(&self, user_id: UserId) -> Vec<PendingEntry> {
        self.store
            .scan_prefix(&user_prefix(user_id))
            .into_iter()
            .map(|(_, entry)| entry)
            .collect()
    }

    /// Drop every entry of a user, returning how many were removed
    pub fn clear_user(&self, user_id: UserId) -> usize {
        self.store
            .scan_prefix(&user_prefix(user_id))
            .into_iter()
            .filter(|(key, _)| self.store.delete(key).is_some())
            .count()
    }

    /// Remove entries older than `ttl` at `now`
    pub fn sweep_expired(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        self.store
            .scan_prefix("")
            .into_iter()
            .filter(|(_, entry)| now - entry.created_at > ttl)
            .filter(|(key, _)| self.store.delete(key).is_some())
            .count()
    }
}

/// Weekly counters used when the remote folder cannot be listed
///
/// They only ever increase and are never checked against the remote folder.
#[derive(Clone)]
pub struct FallbackCounters {
    store: Arc<dyn KeyValueStore<EventNumber>>,
}

impl FallbackCounters {
    pub fn new(store: Arc<dyn KeyValueStore<EventNumber>>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    /// Next value for `category` in `bucket` (a week bucket key)
    pub fn next(&self, category: TwoStageKind, bucket: &str) -> EventNumber {
        let key = format!("{bucket}_{}", category.key());
        self.store
            .upsert(&key, &mut |current| current.copied().unwrap_or(0).saturating_add(1))
    }
}
