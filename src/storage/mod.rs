//! Object storage abstraction for sheet documents and run locks
//! Uses Apache Arrow object_store crate

use object_store::{ObjectStore, PutMode, PutOptions, path::Path as StoragePath};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Metadata returned after upload
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub key: String,
    pub etag: Option<String>,
    pub size: usize,
}

/// Storage client wrapping object_store
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    pub location: String,
}

impl StorageClient {
    /// Create new storage client with any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, location: String) -> Self {
        Self { store, location }
    }

    /// Create in-memory storage for testing/development
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(object_store::memory::InMemory::new()),
            location: "memory".to_string(),
        }
    }

    /// Create storage rooted at a local directory, creating it if needed
    pub fn local<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        let store = object_store::local::LocalFileSystem::new_with_prefix(root)?;

        tracing::info!(root = %root.display(), "Opened local storage");

        Ok(Self {
            store: Arc::new(store),
            location: root.display().to_string(),
        })
    }

    /// Upload bytes to storage, replacing any existing object
    pub async fn upload(&self, key: &str, data: Vec<u8>) -> Result<UploadMetadata> {
        let path = StoragePath::from(key);
        let size = data.len();

        let put_result = self.store.put(&path, data.into()).await?;

        tracing::debug!(key, size, "Uploaded to storage");

        Ok(UploadMetadata {
            key: key.to_string(),
            etag: put_result.e_tag.clone(),
            size,
        })
    }

    /// Upload bytes only if no object exists under `key`
    pub async fn create_new(&self, key: &str, data: Vec<u8>) -> Result<UploadMetadata> {
        let path = StoragePath::from(key);
        let size = data.len();
        let opts = PutOptions {
            mode: PutMode::Create,
            ..Default::default()
        };

        let put_result = match self.store.put_opts(&path, data.into(), opts).await {
            Ok(result) => result,
            Err(object_store::Error::AlreadyExists { .. }) => {
                return Err(StorageError::AlreadyExists(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(key, size, "Created object in storage");

        Ok(UploadMetadata {
            key: key.to_string(),
            etag: put_result.e_tag.clone(),
            size,
        })
    }

    /// Download from storage
    pub async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let path = StoragePath::from(key);

        let result = match self.store.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let bytes = result.bytes().await?;

        tracing::debug!(key, size = bytes.len(), "Downloaded from storage");

        Ok(bytes.to_vec())
    }

    /// Download from storage, mapping a missing object to `None`
    pub async fn download_optional(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.download(key).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete an object. Returns false if nothing was stored under `key`.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let path = StoragePath::from(key);

        match self.store.delete(&path).await {
            Ok(()) => {
                tracing::debug!(key, "Deleted from storage");
                Ok(true)
            }
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Check if key exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = StoragePath::from(key);

        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
