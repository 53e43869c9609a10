//! Filesystem-backed object store. Object paths are `folder/name` relative
//! to the store root.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use url::Url;

use chrono::{DateTime, Utc};

use super::{BackendError, BackendResult, ObjectInfo, Page};

#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
    public_base: Url,
}

impl ObjectStore {
    /// `public_base` is the URL the root is served under, e.g.
    /// `http://localhost:3000/storage/`.
    pub fn new(root: impl Into<PathBuf>, public_base: Url) -> Self {
        Self {
            root: root.into(),
            public_base,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn public_url(&self, path: &str) -> BackendResult<String> {
        let url = self
            .public_base
            .join(path)
            .map_err(|e| BackendError::InvalidQuery(format!("bad object path {path}: {e}")))?;
        Ok(url.to_string())
    }

    pub async fn put(&self, path: &str, bytes: Bytes) -> BackendResult<String> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &bytes).await?;
        tracing::debug!(path, size = bytes.len(), "stored object");
        self.public_url(path)
    }

    /// Deleting an absent object is not an error.
    pub async fn remove(&self, paths: &[String]) -> BackendResult<()> {
        for path in paths {
            let target = self.resolve(path)?;
            match tokio::fs::remove_file(&target).await {
                Ok(()) => tracing::debug!(path = %path, "removed object"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub async fn list(&self, folder: &str, page: Page) -> BackendResult<Vec<ObjectInfo>> {
        let dir = self.resolve(folder)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let folder = folder.trim_end_matches('/');
        let mut objects = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if metadata.is_file() {
                objects.push(ObjectInfo {
                    path: format!("{folder}/{}", entry.file_name().to_string_lossy()),
                    modified: DateTime::<Utc>::from(metadata.modified()?),
                });
            }
        }
        objects.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(objects
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect())
    }

    /// Maps an object path onto the filesystem, rejecting anything that
    /// could escape the root.
    fn resolve(&self, path: &str) -> BackendResult<PathBuf> {
        let relative = Path::new(path);
        if path.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(BackendError::InvalidQuery(format!(
                "invalid object path: {path:?}"
            )));
        }
        Ok(self.root.join(relative))
    }
}
