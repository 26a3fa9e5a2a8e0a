//! Tabular storage: rectangular regions of rows and cells
//!
//! A sheet is the only persistence primitive the run state and the report
//! are built on. It offers bulk reads of the whole region and row-level
//! writes addressed by 1-based row position, the way a spreadsheet does.
//! There is no point-key access; anything keyed (see [`crate::ledger`]) is
//! a linear scan over [`TabularStore::read_all`].
//!
//! ## Backends
//!
//! - [`MemorySheet`] - process-local, used by tests and `provider = "memory"`
//! - [`ObjectSheet`] - one JSON document per sheet in object storage,
//!   grouped under a [`Workbook`]
//!
//! Access is single-writer: no locking happens at this layer.

mod memory;
mod object;

pub use memory::MemorySheet;
pub use object::{ObjectSheet, Workbook};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::storage::StorageError;

/// A single cell. Cells are JSON scalars; `Null` is an empty cell.
pub type Cell = serde_json::Value;

/// One row of cells, left to right
pub type Row = Vec<Cell>;

/// Shared handle to any sheet backend
pub type SheetHandle = Arc<dyn TabularStore>;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("Storage fault: {0}")]
    Storage(#[from] StorageError),

    #[error("Sheet '{sheet}' is not a valid sheet document: {source}")]
    Decode {
        sheet: String,
        source: serde_json::Error,
    },

    #[error("Failed to encode sheet '{sheet}': {source}")]
    Encode {
        sheet: String,
        source: serde_json::Error,
    },

    #[error("Sheet '{sheet}' region is {size} bytes, limit is {limit}")]
    RegionTooLarge { sheet: String, size: u64, limit: u64 },
}

pub type Result<T> = std::result::Result<T, SheetError>;

/// Read/write access to one rectangular region of persistent rows
///
/// Row positions are 1-based. Deleting rows shifts every later row up, so
/// callers removing several rows must delete from the highest position
/// down.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Sheet name, for logging
    fn name(&self) -> &str;

    /// Every row in the region, top to bottom
    async fn read_all(&self) -> Result<Vec<Row>>;

    /// Add one row after the last occupied row
    async fn append(&self, row: Row) -> Result<()>;

    /// Add several rows after the last occupied row in one region write
    async fn append_rows(&self, rows: Vec<Row>) -> Result<()> {
        for row in rows {
            self.append(row).await?;
        }
        Ok(())
    }

    /// Replace the row at `row_index`. Positions past the extent are ignored.
    async fn overwrite(&self, row_index: usize, row: Row) -> Result<()>;

    /// Remove `count` rows starting at `row_index`
    async fn delete(&self, row_index: usize, count: usize) -> Result<()>;

    /// Remove every row
    async fn clear(&self) -> Result<()>;

    /// Number of leading rows pinned as a header
    async fn frozen_rows(&self) -> Result<usize>;

    /// Pin the first `count` rows as a header
    async fn set_frozen_rows(&self, count: usize) -> Result<()>;
}

/// Persistent shape of a sheet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetDocument {
    #[serde(default)]
    pub frozen_rows: usize,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl SheetDocument {
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            frozen_rows: 0,
            rows,
        }
    }

    pub fn append(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn append_rows(&mut self, rows: Vec<Row>) {
        self.rows.extend(rows);
    }

    /// Returns false when `row_index` is outside the region
    pub fn overwrite(&mut self, row_index: usize, row: Row) -> bool {
        match row_index.checked_sub(1).and_then(|i| self.rows.get_mut(i)) {
            Some(slot) => {
                *slot = row;
                true
            }
            None => false,
        }
    }

    /// Returns the number of rows actually removed
    pub fn delete(&mut self, row_index: usize, count: usize) -> usize {
        if row_index == 0 || row_index > self.rows.len() {
            return 0;
        }
        let start = row_index - 1;
        let end = start.saturating_add(count).min(self.rows.len());
        self.rows.drain(start..end).count()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.frozen_rows = 0;
    }
}

/// String form of a cell, as used for key comparison
pub fn cell_text(cell: &Cell) -> String {
    match cell {
        Cell::Null => String::new(),
        Cell::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// True for missing cells and empty strings
pub fn is_blank(cell: Option<&Cell>) -> bool {
    match cell {
        None | Some(Cell::Null) => true,
        Some(Cell::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}
