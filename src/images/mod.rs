//! Filesystem-backed storage for uploaded book cover images.
//!
//! Blobs live under `<media root>/books/`; the database stores the relative
//! reference. One image per book; replacement removes the prior blob
//! best-effort.

use std::path::PathBuf;

use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Store an image blob for a book and return its relative reference.
    /// The uuid component keeps replaced uploads from colliding.
    pub async fn save(
        &self,
        book_id: i64,
        extension: &str,
        data: &[u8],
    ) -> Result<String, AppError> {
        let dir = self.root.join("books");
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create media directory: {}", e)))?;

        let file_name = format!("{}-{}.{}", book_id, uuid::Uuid::new_v4(), extension);
        let path = dir.join(&file_name);
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write image blob: {}", e)))?;

        Ok(format!("books/{}", file_name))
    }

    /// Remove a stored blob. Failures are logged, not surfaced; the database
    /// reference is already gone or replaced at this point.
    pub async fn remove(&self, reference: &str) {
        let path = self.root.join(reference);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!("Failed to remove image blob {}: {}", reference, e);
        }
    }
}
