//! Shared test helpers: an in-memory remote disk and an `App` rooted in a
//! temporary directory.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

use photo_reports::app::App;
use photo_reports::config::AppConfig;
use photo_reports::errors::{DiskError, DiskResult};
use photo_reports::remote::{parent_folder, PathStatus, RemoteDisk};

/// Remote disk kept in memory
#[derive(Default)]
pub struct FakeDisk {
    folders: Mutex<BTreeSet<String>>,
    files: Mutex<BTreeMap<String, Vec<String>>>,
    uploads: Mutex<Vec<String>>,
    fail_listing: AtomicBool,
    fail_upload: AtomicBool,
    list_calls: AtomicUsize,
    /// Files that appear in a folder right after its first listing
    race_files: Mutex<Vec<(String, String)>>,
}

impl FakeDisk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files(folder: &str, names: &[&str]) -> Self {
        let disk = Self::new();
        for name in names {
            disk.add_file(folder, name);
        }
        disk
    }

    pub fn add_file(&self, folder: &str, name: &str) {
        self.folders.lock().unwrap().insert(folder.to_string());
        self.files
            .lock()
            .unwrap()
            .entry(folder.to_string())
            .or_default()
            .push(name.to_string());
    }

    /// Make `name` appear in `folder` once the folder has been listed once
    pub fn add_file_after_first_listing(&self, folder: &str, name: &str) {
        self.race_files
            .lock()
            .unwrap()
            .push((folder.to_string(), name.to_string()));
    }

    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_upload(&self, fail: bool) {
        self.fail_upload.store(fail, Ordering::SeqCst);
    }

    pub fn files_in(&self, folder: &str) -> Vec<String> {
        let mut names = self
            .files
            .lock()
            .unwrap()
            .get(folder)
            .cloned()
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn has_folder(&self, folder: &str) -> bool {
        self.folders.lock().unwrap().contains(folder)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteDisk for FakeDisk {
    async fn list_files(&self, folder: &str) -> DiskResult<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(DiskError::Network("connection reset".to_string()));
        }
        let names = self.files_in(folder);

        let arrivals: Vec<(String, String)> = {
            let mut race = self.race_files.lock().unwrap();
            let (matching, rest): (Vec<_>, Vec<_>) = race.drain(..).partition(|(f, _)| f == folder);
            *race = rest;
            matching
        };
        for (folder, name) in arrivals {
            self.add_file(&folder, &name);
        }
        Ok(names)
    }

    async fn ensure_path(&self, folder: &str) -> DiskResult<PathStatus> {
        let created = self.folders.lock().unwrap().insert(folder.to_string());
        Ok(if created {
            PathStatus::Created
        } else {
            PathStatus::AlreadyExisted
        })
    }

    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> DiskResult<()> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(DiskError::Api {
                status: 507,
                body: "insufficient storage".to_string(),
            });
        }
        if !local_path.exists() {
            return Err(DiskError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "local photo missing",
            )));
        }
        let folder = parent_folder(remote_path);
        let name = remote_path.rsplit('/').next().unwrap_or(remote_path);
        self.add_file(folder, name);
        self.uploads.lock().unwrap().push(remote_path.to_string());
        Ok(())
    }
}

/// App whose settings file and photo cache live in `dir`
pub fn test_app(dir: &TempDir) -> App {
    let config = AppConfig {
        bot_token: "123:test".to_string(),
        photos_dir: dir.path().join("photos"),
        settings_file: dir.path().join("settings.json"),
        ..AppConfig::default()
    };
    App::new(config).expect("Failed to build test app")
}

pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];
