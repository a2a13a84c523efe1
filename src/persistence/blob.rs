//! Blob storage for uploaded file bytes.

use std::path::{Component, Path, PathBuf};

use crate::core::errors::{PersistenceError, PersistenceResult};
use crate::persistence::StoreFuture;

/// Key/value store for file bytes.
pub trait BlobStore: Send + Sync {
    /// Write `bytes` under `path`, replacing any previous blob.
    fn put(&self, path: &str, bytes: Vec<u8>) -> StoreFuture<'_, PersistenceResult<()>>;

    /// Read the blob under `path`.
    fn get(&self, path: &str) -> StoreFuture<'_, PersistenceResult<Vec<u8>>>;

    /// Remove the blob under `path`. Missing blobs are not an error.
    fn delete(&self, path: &str) -> StoreFuture<'_, PersistenceResult<()>>;

    /// Public retrieval URL for `path`.
    fn public_url(&self, path: &str) -> String;
}

/// Filesystem-backed blob store.
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    /// Create a store rooted at `root`, served under `public_base_url`.
    ///
    /// # Errors
    /// Returns an error if the root directory cannot be created.
    pub async fn new(
        root: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> PersistenceResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PersistenceResult<PathBuf> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !safe || path.is_empty() {
            return Err(PersistenceError::InvalidRow(format!(
                "blob path escapes the store: {path}"
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, path: &str, bytes: Vec<u8>) -> StoreFuture<'_, PersistenceResult<()>> {
        let target = self.resolve(path);
        Box::pin(async move {
            let target = target?;
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, bytes).await?;
            Ok(())
        })
    }

    fn get(&self, path: &str) -> StoreFuture<'_, PersistenceResult<Vec<u8>>> {
        let target = self.resolve(path);
        let key = path.to_string();
        Box::pin(async move {
            let target = target?;
            match tokio::fs::read(&target).await {
                Ok(bytes) => Ok(bytes),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    Err(PersistenceError::not_found("blob", key))
                }
                Err(err) => Err(err.into()),
            }
        })
    }

    fn delete(&self, path: &str) -> StoreFuture<'_, PersistenceResult<()>> {
        let target = self.resolve(path);
        Box::pin(async move {
            let target = target?;
            match tokio::fs::remove_file(&target).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err.into()),
            }
        })
    }

    fn public_url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.public_base_url, encoded.join("/"))
    }
}
