// src/storage.rs
//
// Media storage collaborator. Upload plumbing lives outside this service;
// the only operation the content store needs is deletion, when a post or
// message that references a stored object is removed.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::AppError;

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Remove the stored object with the given storage id.
    async fn delete(&self, storage_id: &str) -> Result<(), AppError>;
}

/// Stores media as files under a configured root directory.
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn delete(&self, storage_id: &str) -> Result<(), AppError> {
        // Storage ids are flat names; reject anything that could escape
        // the upload root.
        if storage_id.is_empty() || storage_id.contains('/') || storage_id.contains("..") {
            return Err(AppError::BadRequest(format!(
                "invalid storage id '{}'",
                storage_id
            )));
        }

        let path = self.root.join(storage_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Already gone counts as deleted.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::InternalServerError(format!(
                "failed to delete media {}: {}",
                storage_id, e
            ))),
        }
    }
}
