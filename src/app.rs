//! Shared state injected into every handler.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::circuit_breaker::CircuitBreaker;
use crate::config::AppConfig;
use crate::errors::{DiskError, DiskResult};
use crate::events::EventEngine;
use crate::local_files::PhotoCache;
use crate::pending::UserId;
use crate::settings::SettingsStore;
use crate::wizard::{WizardSessions, WizardState};
use crate::yandex_disk::YandexDisk;

pub struct App {
    pub config: AppConfig,
    pub settings: SettingsStore,
    pub photos: PhotoCache,
    pub wizards: WizardSessions,
    pub events: EventEngine,
    /// One breaker for every user's disk client
    pub breaker: Arc<CircuitBreaker>,
    /// Client for Telegram file downloads and OAuth
    pub http: reqwest::Client,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let settings = SettingsStore::load(&config.settings_file, &config.default_base_path)?;
        let photos = PhotoCache::new(&config.photos_dir)?;
        let breaker = Arc::new(CircuitBreaker::new(config.recovery.clone()));
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.recovery.request_timeout_secs.max(1)))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            config,
            settings,
            photos,
            wizards: WizardSessions::in_memory(),
            events: EventEngine::in_memory(),
            breaker,
            http,
        })
    }

    /// Disk client for the user's stored token
    pub fn disk_for(&self, user_id: UserId) -> DiskResult<YandexDisk> {
        let settings = self.settings.get(user_id);
        let token = settings.token().ok_or(DiskError::NotAuthorized)?;
        YandexDisk::new(
            token,
            &self.config.yandex.api_base,
            self.config.recovery.clone(),
            Arc::clone(&self.breaker),
        )
    }

    /// Base path for a dialog: its override, else the user's saved path
    pub fn base_path_for(&self, user_id: UserId, wizard: Option<&WizardState>) -> String {
        wizard
            .and_then(|state| state.base_path.clone())
            .unwrap_or_else(|| self.settings.get(user_id).yandex_path)
    }

    /// Delete the local photo of a dialog that will not be uploaded
    pub fn discard_photo(&self, state: &WizardState) {
        self.photos.discard(&state.photo.local_path);
    }

    /// Remove local photos past the retention period that no open dialog
    /// still needs
    pub fn cleanup_photos(&self) -> Result<usize> {
        self.photos
            .cleanup_older_than(self.config.file_retention(), &self.wizards.photo_paths())
    }
}
