//! Per-user settings persisted in a single JSON file keyed by Telegram user id.
//!
//! The file layout (`yandexToken`, `yandexPath`, `lastActivity`) is shared
//! with existing deployments and must stay readable by them.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::pending::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(default)]
    pub yandex_token: Option<String>,
    pub yandex_path: String,
    pub last_activity: DateTime<Utc>,
}

impl UserSettings {
    fn new(default_base_path: &str) -> Self {
        Self {
            yandex_token: None,
            yandex_path: default_base_path.to_string(),
            last_activity: Utc::now(),
        }
    }

    /// Token if one is configured
    pub fn token(&self) -> Option<&str> {
        self.yandex_token.as_deref().filter(|token| !token.is_empty())
    }

    /// First characters of the token for display
    pub fn token_preview(&self) -> Option<String> {
        self.token()
            .map(|token| format!("{}...", token.chars().take(10).collect::<String>()))
    }
}

pub struct SettingsStore {
    path: PathBuf,
    default_base_path: String,
    users: Mutex<BTreeMap<String, UserSettings>>,
}

impl SettingsStore {
    /// Load settings from `path`
    ///
    /// A missing file starts empty. A file that cannot be parsed is logged and
    /// replaced on the next write.
    pub fn load(path: impl Into<PathBuf>, default_base_path: &str) -> Result<Self> {
        let path = path.into();
        let users = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Settings file is malformed, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        debug!(path = %path.display(), users = users.len(), "Settings loaded");
        Ok(Self {
            path,
            default_base_path: default_base_path.to_string(),
            users: Mutex::new(users),
        })
    }

    fn users(&self) -> MutexGuard<'_, BTreeMap<String, UserSettings>> {
        self.users.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Settings of a user, defaults if the user is unknown
    pub fn get(&self, user_id: UserId) -> UserSettings {
        self.users()
            .get(&user_id.to_string())
            .cloned()
            .unwrap_or_else(|| UserSettings::new(&self.default_base_path))
    }

    /// Modify a user's settings, bump their activity time and persist the file
    pub fn update<F>(&self, user_id: UserId, f: F) -> Result<UserSettings>
    where
        F: FnOnce(&mut UserSettings),
    {
        let mut users = self.users();
        let settings = users
            .entry(user_id.to_string())
            .or_insert_with(|| UserSettings::new(&self.default_base_path));
        f(settings);
        settings.last_activity = Utc::now();
        let updated = settings.clone();
        write_atomically(&self.path, &users)?;
        Ok(updated)
    }

    pub fn set_token(&self, user_id: UserId, token: Option<String>) -> Result<UserSettings> {
        self.update(user_id, |settings| settings.yandex_token = token)
    }

    pub fn set_base_path(&self, user_id: UserId, base_path: &str) -> Result<UserSettings> {
        self.update(user_id, |settings| settings.yandex_path = base_path.to_string())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write pretty JSON next to `path` and rename it into place
fn write_atomically(path: &Path, users: &BTreeMap<String, UserSettings>) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let json = serde_json::to_vec_pretty(users).context("Failed to serialize settings")?;
    let mut file = NamedTempFile::new_in(dir).context("Failed to create temporary settings file")?;
    file.write_all(&json).context("Failed to write settings")?;
    file.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_unknown_user_gets_defaults() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::load(dir.path().join("settings.json"), "/RMRPreport").unwrap();
        let settings = store.get(5);
        assert_eq!(settings.yandex_path, "/RMRPreport");
        assert!(settings.token().is_none());
    }

    #[test]
    fn test_update_persists_camel_case_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::load(&path, "/RMRPreport").unwrap();
        store.set_token(5, Some("abcdefghijklmnop".to_string())).unwrap();
        store.set_base_path(5, "/Reports").unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"yandexToken\": \"abcdefghijklmnop\""));
        assert!(raw.contains("\"yandexPath\": \"/Reports\""));
        assert!(raw.contains("\"lastActivity\""));

        let reloaded = SettingsStore::load(&path, "/RMRPreport").unwrap();
        let settings = reloaded.get(5);
        assert_eq!(settings.yandex_path, "/Reports");
        assert_eq!(settings.token_preview().as_deref(), Some("abcdefghij..."));
    }

    #[test]
    fn test_legacy_null_token_is_accepted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"7":{"yandexToken":null,"yandexPath":"/X","lastActivity":"2025-03-12T10:00:00.000Z"}}"#,
        )
        .unwrap();
        let store = SettingsStore::load(&path, "/RMRPreport").unwrap();
        assert_eq!(store.get(7).yandex_path, "/X");
        assert!(store.get(7).token().is_none());
    }

    #[test]
    fn test_malformed_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        let store = SettingsStore::load(&path, "/RMRPreport").unwrap();
        assert_eq!(store.get(1).yandex_path, "/RMRPreport");
    }
}
