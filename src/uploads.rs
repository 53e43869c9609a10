//! Files handed over by the multipart layer: a declared name and the bytes.

use bytes::Bytes;

use crate::backend::Backend;
use crate::error::{AppError, AppResult};

pub const AVATARS: &str = "avatars";
pub const THUMBNAILS: &str = "thumbnails";

/// Folders the asset sweep reconciles.
pub const MANAGED_FOLDERS: &[&str] = &[AVATARS, THUMBNAILS];

#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Path inside the store, kept on the owning row for the sweep.
    pub path: String,
    pub url: String,
}

impl Upload {
    /// Only non-empty images are accepted; the type is judged by extension.
    pub fn validate_image(&self, field: &'static str) -> AppResult<()> {
        if self.bytes.is_empty() {
            return Err(AppError::validation(field, "file is empty"));
        }
        let is_image = mime_guess::from_path(&self.file_name)
            .first()
            .map(|mime| mime.type_() == mime_guess::mime::IMAGE)
            .unwrap_or(false);
        if !is_image {
            return Err(AppError::validation(field, "file must be an image"));
        }
        Ok(())
    }

    pub fn object_path(&self, folder: &str) -> String {
        format!(
            "{}/{}-{}",
            folder,
            uuid::Uuid::now_v7(),
            sanitize_file_name(&self.file_name)
        )
    }

    pub async fn store(self, backend: &dyn Backend, folder: &str) -> AppResult<StoredObject> {
        let path = self.object_path(folder);
        let url = backend.upload(&path, self.bytes).await?;
        Ok(StoredObject { path, url })
    }
}

/// Keeps `[A-Za-z0-9._-]`, replaces everything else, and drops any
/// directory part of the declared name.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
