use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Result, Row, SheetDocument, TabularStore};

/// Process-local sheet
#[derive(Debug, Default)]
pub struct MemorySheet {
    name: String,
    doc: RwLock<SheetDocument>,
}

impl MemorySheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: RwLock::new(SheetDocument::default()),
        }
    }

    pub fn with_rows(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            doc: RwLock::new(SheetDocument::with_rows(rows)),
        }
    }

    /// Copy of the current rows
    pub async fn rows(&self) -> Vec<Row> {
        self.doc.read().await.rows.clone()
    }
}

#[async_trait]
impl TabularStore for MemorySheet {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_all(&self) -> Result<Vec<Row>> {
        Ok(self.doc.read().await.rows.clone())
    }

    async fn append(&self, row: Row) -> Result<()> {
        self.doc.write().await.append(row);
        Ok(())
    }

    async fn append_rows(&self, rows: Vec<Row>) -> Result<()> {
        self.doc.write().await.append_rows(rows);
        Ok(())
    }

    async fn overwrite(&self, row_index: usize, row: Row) -> Result<()> {
        if !self.doc.write().await.overwrite(row_index, row) {
            debug!(sheet = %self.name, row_index, "Overwrite past extent ignored");
        }
        Ok(())
    }

    async fn delete(&self, row_index: usize, count: usize) -> Result<()> {
        self.doc.write().await.delete(row_index, count);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.doc.write().await.clear();
        Ok(())
    }

    async fn frozen_rows(&self) -> Result<usize> {
        Ok(self.doc.read().await.frozen_rows)
    }

    async fn set_frozen_rows(&self, count: usize) -> Result<()> {
        self.doc.write().await.frozen_rows = count;
        Ok(())
    }
}
