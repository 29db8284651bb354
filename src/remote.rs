//! Capability consumed from the remote storage: list a folder, create a
//! folder path, upload a file.

use async_trait::async_trait;
use std::path::Path;

use crate::errors::DiskResult;

/// Outcome of [`RemoteDisk::ensure_path`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStatus {
    Created,
    AlreadyExisted,
}

#[async_trait]
pub trait RemoteDisk: Send + Sync {
    /// Names of the files (not subfolders) directly inside `folder`
    ///
    /// A missing folder is an empty listing, not an error. An `Err` means the
    /// folder could not be enumerated.
    async fn list_files(&self, folder: &str) -> DiskResult<Vec<String>>;

    /// Create `folder` and any missing parents; an existing folder is success
    async fn ensure_path(&self, folder: &str) -> DiskResult<PathStatus>;

    /// Upload a local file to `remote_path`, overwriting an existing file
    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> DiskResult<()>;
}

/// Parent folder of a remote file path (`/a/b/c.jpg` -> `/a/b`)
pub fn parent_folder(remote_path: &str) -> &str {
    match remote_path.rfind('/') {
        Some(0) | None => "/",
        Some(index) => &remote_path[..index],
    }
}

/// Every prefix of a folder path, shortest first (`/a/b` -> `/a`, `/a/b`)
pub fn path_prefixes(folder: &str) -> Vec<String> {
    let mut current = String::new();
    folder
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            current.push('/');
            current.push_str(segment);
            current.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_folder() {
        assert_eq!(parent_folder("/a/b/c.jpg"), "/a/b");
        assert_eq!(parent_folder("/c.jpg"), "/");
        assert_eq!(parent_folder("c.jpg"), "/");
    }

    #[test]
    fn test_path_prefixes() {
        assert_eq!(
            path_prefixes("/RMRPreport/10.03.25 – 16.03.25/МП"),
            vec![
                "/RMRPreport".to_string(),
                "/RMRPreport/10.03.25 – 16.03.25".to_string(),
                "/RMRPreport/10.03.25 – 16.03.25/МП".to_string(),
            ]
        );
        assert!(path_prefixes("/").is_empty());
    }
}
