use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Result, Row, SheetDocument, SheetError, TabularStore};
use crate::humanize::ByteSize;
use crate::storage::StorageClient;

/// Named group of sheets sharing one storage location
///
/// Layout: `{workbook}/{sheet}.json`, one pretty-printed [`SheetDocument`]
/// per sheet. A sheet with no object yet reads as empty.
#[derive(Clone)]
pub struct Workbook {
    storage: StorageClient,
    name: String,
    max_region_bytes: ByteSize,
}

impl Workbook {
    pub fn new(storage: StorageClient, name: impl Into<String>, max_region_bytes: ByteSize) -> Self {
        let name = name.into();
        info!(workbook = %name, location = %storage.location, "Using workbook");
        Self {
            storage,
            name,
            max_region_bytes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage(&self) -> &StorageClient {
        &self.storage
    }

    /// Storage key for an auxiliary object stored beside the sheets
    pub fn object_key(&self, object: &str) -> String {
        format!("{}/{}", self.name, object)
    }

    /// Open (or lazily create) a sheet by name
    pub fn sheet(&self, name: &str) -> ObjectSheet {
        ObjectSheet {
            storage: self.storage.clone(),
            name: name.to_string(),
            key: self.object_key(&format!("{}.json", name)),
            max_region_bytes: self.max_region_bytes,
            write_guard: Arc::new(Mutex::new(())),
        }
    }
}

/// Sheet persisted as a single object; every write rewrites the region
pub struct ObjectSheet {
    storage: StorageClient,
    name: String,
    key: String,
    max_region_bytes: ByteSize,
    write_guard: Arc<Mutex<()>>,
}

impl ObjectSheet {
    pub fn key(&self) -> &str {
        &self.key
    }

    async fn load(&self) -> Result<SheetDocument> {
        let Some(bytes) = self.storage.download_optional(&self.key).await? else {
            return Ok(SheetDocument::default());
        };

        let size = bytes.len() as u64;
        if size > self.max_region_bytes.as_u64() {
            return Err(SheetError::RegionTooLarge {
                sheet: self.name.clone(),
                size,
                limit: self.max_region_bytes.as_u64(),
            });
        }

        serde_json::from_slice(&bytes).map_err(|source| SheetError::Decode {
            sheet: self.name.clone(),
            source,
        })
    }

    async fn save(&self, doc: &SheetDocument) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(doc).map_err(|source| SheetError::Encode {
            sheet: self.name.clone(),
            source,
        })?;
        self.storage.upload(&self.key, bytes).await?;
        debug!(sheet = %self.name, rows = doc.rows.len(), "Sheet written");
        Ok(())
    }

    /// Read-modify-write of the whole region
    async fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut SheetDocument) -> bool + Send,
    {
        let _guard = self.write_guard.lock().await;
        let mut doc = self.load().await?;
        if mutate(&mut doc) {
            self.save(&doc).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl TabularStore for ObjectSheet {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_all(&self) -> Result<Vec<Row>> {
        Ok(self.load().await?.rows)
    }

    async fn append(&self, row: Row) -> Result<()> {
        self.update(|doc| {
            doc.append(row);
            true
        })
        .await
    }

    async fn append_rows(&self, rows: Vec<Row>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        self.update(|doc| {
            doc.append_rows(rows);
            true
        })
        .await
    }

    async fn overwrite(&self, row_index: usize, row: Row) -> Result<()> {
        let name = self.name.clone();
        self.update(move |doc| {
            let written = doc.overwrite(row_index, row);
            if !written {
                debug!(sheet = %name, row_index, "Overwrite past extent ignored");
            }
            written
        })
        .await
    }

    async fn delete(&self, row_index: usize, count: usize) -> Result<()> {
        self.update(|doc| doc.delete(row_index, count) > 0).await
    }

    async fn clear(&self) -> Result<()> {
        self.update(|doc| {
            doc.clear();
            true
        })
        .await
    }

    async fn frozen_rows(&self) -> Result<usize> {
        Ok(self.load().await?.frozen_rows)
    }

    async fn set_frozen_rows(&self, count: usize) -> Result<()> {
        self.update(|doc| {
            let changed = doc.frozen_rows != count;
            doc.frozen_rows = count;
            changed
        })
        .await
    }
}
