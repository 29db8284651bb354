//! # Yandex Disk Client Module
//!
//! REST client for the Yandex Disk API implementing [`RemoteDisk`].
//!
//! ## Request Policy
//!
//! - Every request carries `Authorization: OAuth <token>` and a fixed timeout
//! - A request that times out is retried `max_retries` times
//! - Transient failures feed a process-wide [`CircuitBreaker`]; while it is
//!   open every call fails fast with [`DiskError::Unavailable`]

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::RecoveryConfig;
use crate::errors::{DiskError, DiskResult};
use crate::remote::{parent_folder, path_prefixes, PathStatus, RemoteDisk};

/// Maximum number of entries requested per folder listing
pub const LIST_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize)]
struct ResourceList {
    #[serde(rename = "_embedded")]
    embedded: Option<EmbeddedItems>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedItems {
    #[serde(default)]
    items: Vec<ResourceItem>,
}

#[derive(Debug, Deserialize)]
struct ResourceItem {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct UploadLink {
    href: String,
}

/// Space usage of the disk, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DiskInfo {
    pub total_space: u64,
    pub used_space: u64,
}

impl DiskInfo {
    pub fn free_space(&self) -> u64 {
        self.total_space.saturating_sub(self.used_space)
    }

    /// Free space in gigabytes, for display
    pub fn free_gb(&self) -> f64 {
        self.free_space() as f64 / 1024_f64.powi(3)
    }
}

/// Client bound to one user's OAuth token
pub struct YandexDisk {
    client: Client,
    token: String,
    api_base: String,
    recovery: RecoveryConfig,
    breaker: Arc<CircuitBreaker>,
}

impl YandexDisk {
    /// Create a client for `token`
    ///
    /// An empty token is rejected with [`DiskError::NotAuthorized`].
    pub fn new(
        token: &str,
        api_base: &str,
        recovery: RecoveryConfig,
        breaker: Arc<CircuitBreaker>,
    ) -> DiskResult<Self> {
        if token.trim().is_empty() {
            return Err(DiskError::NotAuthorized);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(recovery.request_timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            token: token.trim().to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            recovery,
            breaker,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/v1/disk{}", self.api_base, endpoint)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("Authorization", format!("OAuth {}", self.token))
    }

    /// Send a request built by `build`, retrying on timeout
    ///
    /// Any HTTP response is returned as-is; only 5xx responses and transport
    /// failures count against the breaker.
    async fn send<F>(&self, operation: &str, build: F) -> DiskResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        if self.breaker.is_open() {
            warn!(operation, "Circuit breaker open, skipping disk request");
            return Err(DiskError::Unavailable(format!(
                "{operation}: too many recent failures"
            )));
        }

        let mut attempt = 0;
        let result = loop {
            match build().send().await {
                Err(e) if e.is_timeout() && attempt < self.recovery.max_retries => {
                    attempt += 1;
                    warn!(operation, attempt, "Disk request timed out, retrying");
                }
                Err(e) => break Err(DiskError::from(e)),
                Ok(response) => break Ok(response),
            }
        };

        match &result {
            Ok(response) if response.status().is_server_error() => self.breaker.record_failure(),
            Ok(_) => self.breaker.record_success(),
            Err(e) if e.is_transient() => self.breaker.record_failure(),
            Err(_) => {}
        }
        result
    }

    async fn error_from(response: Response) -> DiskError {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return DiskError::NotAuthorized;
        }
        let body = response.text().await.unwrap_or_default();
        DiskError::Api {
            status: status.as_u16(),
            body,
        }
    }

    async fn create_folder(&self, path: &str) -> DiskResult<PathStatus> {
        let url = self.url("/resources");
        let response = self
            .send("create_folder", || {
                self.authorized(self.client.put(&url).query(&[("path", path)]))
            })
            .await?;

        match response.status() {
            StatusCode::CREATED => Ok(PathStatus::Created),
            StatusCode::CONFLICT => Ok(PathStatus::AlreadyExisted),
            _ => Err(Self::error_from(response).await),
        }
    }

    /// Total and used space of the disk
    pub async fn disk_info(&self) -> DiskResult<DiskInfo> {
        let url = self.url("");
        let response = self
            .send("disk_info", || self.authorized(self.client.get(&url)))
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(response.json::<DiskInfo>().await?)
    }

    /// Permanently delete a file or folder
    pub async fn delete(&self, path: &str) -> DiskResult<()> {
        let url = self.url("/resources");
        let response = self
            .send("delete", || {
                self.authorized(
                    self.client
                        .delete(&url)
                        .query(&[("path", path), ("permanently", "true")]),
                )
            })
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::ACCEPTED => Ok(()),
            StatusCode::NOT_FOUND => Err(DiskError::NotFound(path.to_string())),
            _ => Err(Self::error_from(response).await),
        }
    }
}

#[async_trait]
impl RemoteDisk for YandexDisk {
    async fn list_files(&self, folder: &str) -> DiskResult<Vec<String>> {
        let url = self.url("/resources");
        let limit = LIST_LIMIT.to_string();
        let response = self
            .send("list_files", || {
                self.authorized(
                    self.client
                        .get(&url)
                        .query(&[("path", folder), ("limit", limit.as_str())]),
                )
            })
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(folder, "Folder does not exist yet, empty listing");
                Ok(Vec::new())
            }
            status if status.is_success() => {
                let listing = response.json::<ResourceList>().await?;
                let names: Vec<String> = listing
                    .embedded
                    .map(|embedded| embedded.items)
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|item| item.kind == "file")
                    .map(|item| item.name)
                    .collect();
                debug!(folder, count = names.len(), "Listed folder");
                Ok(names)
            }
            _ => Err(Self::error_from(response).await),
        }
    }

    async fn ensure_path(&self, folder: &str) -> DiskResult<PathStatus> {
        let mut status = PathStatus::AlreadyExisted;
        for prefix in path_prefixes(folder) {
            status = self.create_folder(&prefix).await?;
            if status == PathStatus::Created {
                debug!(path = %prefix, "Created folder");
            }
        }
        Ok(status)
    }

    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> DiskResult<()> {
        let bytes = tokio::fs::read(local_path).await?;

        self.ensure_path(parent_folder(remote_path)).await?;

        let url = self.url("/resources/upload");
        let response = self
            .send("upload_link", || {
                self.authorized(
                    self.client
                        .get(&url)
                        .query(&[("path", remote_path), ("overwrite", "true")]),
                )
            })
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        let link = response.json::<UploadLink>().await?;

        let response = self
            .send("upload", || self.client.put(&link.href).body(bytes.clone()))
            .await?;

        match response.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => {
                info!(remote_path, size = bytes.len(), "Uploaded file");
                Ok(())
            }
            _ => Err(Self::error_from(response).await),
        }
    }
}
