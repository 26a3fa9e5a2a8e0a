use chrono::NaiveDate;

use crate::ledger::parse_day;
use crate::sheet::{Row, cell_text};

/// Contiguous run of rows, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub start: usize,
    pub count: usize,
}

impl RowRange {
    /// Last row in the range, inclusive
    pub fn end(&self) -> usize {
        self.start + self.count - 1
    }
}

/// 1-based positions of rows whose stamp in `column` is `ttl_days` or more before `today`
///
/// The first `skip` rows (the header) are never selected. Rows without a
/// readable stamp are kept.
pub fn expired_rows(
    rows: &[Row],
    column: usize,
    skip: usize,
    today: NaiveDate,
    ttl_days: i64,
) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .skip(skip)
        .filter_map(|(i, row)| {
            let stamp = parse_day(&cell_text(row.get(column)?))?;
            ((today - stamp).num_days() >= ttl_days).then_some(i + 1)
        })
        .collect()
}

/// Group ascending row positions into contiguous ranges, highest range first
///
/// Deleting the ranges in the returned order never shifts a range that is
/// still to be deleted.
pub fn deletion_buckets(positions: &[usize]) -> Vec<RowRange> {
    let mut buckets: Vec<RowRange> = Vec::new();
    for &position in positions {
        match buckets.last_mut() {
            Some(bucket) if bucket.end() + 1 == position => bucket.count += 1,
            _ => buckets.push(RowRange {
                start: position,
                count: 1,
            }),
        }
    }
    buckets.reverse();
    buckets
}
