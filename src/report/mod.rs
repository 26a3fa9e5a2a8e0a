//! Report sheet: header upkeep, appends, and retention
//!
//! Layout: row 1 is the frozen header (projected fields, then
//! `Timestamp`); every later row is one projected result line stamped with
//! the day it was fetched. Rows older than the retention window are
//! deleted at the start of each persist step.

mod retention;

pub use retention::{RowRange, deletion_buckets, expired_rows};

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, info};

use crate::fetch::TIMESTAMP_COLUMN;
use crate::sheet::{Result, Row, SheetHandle};

pub struct ReportWriter {
    sheet: SheetHandle,
    header: Vec<String>,
    retention_days: u32,
}

impl ReportWriter {
    pub fn new(sheet: SheetHandle, header: Vec<String>, retention_days: u32) -> Self {
        Self {
            sheet,
            header,
            retention_days,
        }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Write and freeze the header row while the sheet holds no data rows
    ///
    /// Returns true if the header was written.
    pub async fn ensure_header(&self) -> Result<bool> {
        let rows = self.sheet.read_all().await?;
        if rows.len() >= 2 {
            return Ok(false);
        }

        let header: Row = self.header.iter().cloned().map(Value::String).collect();
        if rows.is_empty() {
            self.sheet.append(header).await?;
        } else {
            self.sheet.overwrite(1, header).await?;
        }
        self.sheet.set_frozen_rows(1).await?;
        debug!(sheet = self.sheet.name(), "Report header written");
        Ok(true)
    }

    /// Delete rows stamped at least the retention window before `today`
    ///
    /// Returns the number of rows deleted.
    pub async fn purge_expired(&self, today: NaiveDate) -> Result<usize> {
        let Some(column) = self.header.iter().position(|h| h == TIMESTAMP_COLUMN) else {
            return Ok(0);
        };

        let rows = self.sheet.read_all().await?;
        let frozen = self.sheet.frozen_rows().await?;
        let expired = expired_rows(&rows, column, frozen, today, i64::from(self.retention_days));

        for bucket in deletion_buckets(&expired) {
            info!(
                sheet = self.sheet.name(),
                "Deleting old rows from {}–{}",
                bucket.start,
                bucket.end()
            );
            self.sheet.delete(bucket.start, bucket.count).await?;
        }

        Ok(expired.len())
    }

    /// Append result rows below the existing data in one write
    pub async fn append(&self, rows: Vec<Row>) -> Result<usize> {
        let count = rows.len();
        if count == 0 {
            return Ok(0);
        }
        self.sheet.append_rows(rows).await?;
        info!(sheet = self.sheet.name(), rows = count, "Appended report rows");
        Ok(count)
    }
}
