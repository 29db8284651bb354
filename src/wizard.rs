//! # Wizard Session Module
//!
//! Per-user state of the photo placement dialog, from receiving a photo until
//! it is saved or cancelled.
//!
//! ## Step Flow
//!
//! ```text
//! ChooseCategory ──(events)──> ChooseEventKind ──> ChooseStage(raids|supplies)
//!        └────────(mp)───────────────────────────> ChooseStage(mp)
//! ```
//!
//! Single-screenshot categories save directly from `ChooseCategory`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::categories::TwoStageKind;
use crate::pending::UserId;
use crate::store::{InMemoryStore, KeyValueStore};

/// Photo waiting to be placed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRef {
    /// Telegram file id the photo was downloaded from
    pub file_id: String,
    pub local_path: PathBuf,
    /// Normalized extension without the dot
    pub extension: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", content = "kind", rename_all = "snake_case")]
pub enum WizardStep {
    ChooseCategory,
    ChooseEventKind,
    ChooseStage(TwoStageKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardState {
    pub photo: PhotoRef,
    pub chat_id: i64,
    /// Message carrying the wizard keyboard, edited on every step
    pub message_id: Option<i32>,
    /// Base path override for this dialog only
    pub base_path: Option<String>,
    pub step: WizardStep,
    /// Folders are resolved against this instant for the whole dialog
    pub started_at: DateTime<Utc>,
}

impl WizardState {
    pub fn new(photo: PhotoRef, chat_id: i64, started_at: DateTime<Utc>) -> Self {
        Self {
            photo,
            chat_id,
            message_id: None,
            base_path: None,
            step: WizardStep::ChooseCategory,
            started_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.started_at > ttl
    }
}

fn session_key(user_id: UserId) -> String {
    user_id.to_string()
}

/// Store of active dialogs, one per user
#[derive(Clone)]
pub struct WizardSessions {
    store: Arc<dyn KeyValueStore<WizardState>>,
}

impl WizardSessions {
    pub fn new(store: Arc<dyn KeyValueStore<WizardState>>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    /// Begin a dialog, returning the dialog it replaced
    ///
    /// The caller owns cleanup of the replaced dialog's local photo.
    pub fn start(&self, user_id: UserId, state: WizardState) -> Option<WizardState> {
        let previous = self.store.set(&session_key(user_id), state);
        if previous.is_some() {
            debug!(user_id, "Wizard restarted over an active dialog");
        }
        previous
    }

    pub fn get(&self, user_id: UserId) -> Option<WizardState> {
        self.store.get(&session_key(user_id))
    }

    /// Remove and return the dialog
    pub fn finish(&self, user_id: UserId) -> Option<WizardState> {
        self.store.delete(&session_key(user_id))
    }

    /// Remove the dialog only if it is waiting for a stage choice, returning
    /// the chosen category with it
    ///
    /// The step check and the removal happen under one store lock.
    pub fn finish_stage(&self, user_id: UserId) -> Option<(TwoStageKind, WizardState)> {
        let state = self.store.delete_if(&session_key(user_id), &mut |state| {
            matches!(state.step, WizardStep::ChooseStage(_))
        })?;
        match state.step {
            WizardStep::ChooseStage(kind) => Some((kind, state)),
            _ => None,
        }
    }

    /// Apply `f` to an active dialog and return the updated state
    ///
    /// Returns `None` without creating anything when no dialog is active.
    pub fn update<F>(&self, user_id: UserId, f: F) -> Option<WizardState>
    where
        F: FnOnce(&mut WizardState),
    {
        let key = session_key(user_id);
        let mut state = self.store.get(&key)?;
        f(&mut state);
        self.store.set(&key, state.clone());
        Some(state)
    }

    pub fn set_step(&self, user_id: UserId, step: WizardStep) -> Option<WizardState> {
        self.update(user_id, |state| state.step = step)
    }

    pub fn set_base_path(&self, user_id: UserId, base_path: &str) -> Option<WizardState> {
        self.update(user_id, |state| state.base_path = Some(base_path.to_string()))
    }

    pub fn set_message_id(&self, user_id: UserId, message_id: i32) -> Option<WizardState> {
        self.update(user_id, |state| state.message_id = Some(message_id))
    }

    /// Local photos referenced by open dialogs
    pub fn photo_paths(&self) -> Vec<PathBuf> {
        self.store
            .scan_prefix("")
            .into_iter()
            .map(|(_, state)| state.photo.local_path)
            .collect()
    }

    /// Remove dialogs older than `ttl`, returning them so their photos can be
    /// deleted
    pub fn sweep_expired(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<WizardState> {
        self.store
            .scan_prefix("")
            .into_iter()
            .filter(|(_, state)| state.is_expired(now, ttl))
            .filter_map(|(key, _)| self.store.delete(&key))
            .collect()
    }
}
