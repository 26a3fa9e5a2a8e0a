use chrono::{NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use super::error::Result;
use super::store::KeyValueLedger;

const DAY_FORMAT: &str = "%Y%m%d";

/// Logical day of a run, rendered `YYYYMMDD`
///
/// Scopes the completion state: only the entry keyed by the current day
/// survives the start of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Current UTC date
    pub fn today() -> Self {
        Self(Utc::now().date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_FORMAT))
    }
}

impl FromStr for DayKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), DAY_FORMAT).map(Self)
    }
}

/// Parse a `YYYYMMDD` stamp as written into ledger keys and report rows
pub fn parse_day(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.len() != 8 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(text, DAY_FORMAT).ok()
}

/// Remove every ledger entry not keyed by `today`
///
/// Returns the number of entries removed. Running it again right away
/// removes nothing.
pub async fn purge_stale(ledger: &mut KeyValueLedger, today: &DayKey) -> Result<usize> {
    let today = today.to_string();
    let mut index = 0;
    let mut removed = 0;

    while index < ledger.len() {
        match ledger.key_at(index).await? {
            Some(key) if key == today => {
                debug!(key, "Keeping current ledger entry");
                index += 1;
            }
            Some(key) => {
                info!(key, "Purging stale ledger entry");
                if ledger.remove(&key).await? {
                    removed += 1;
                } else {
                    index += 1;
                }
            }
            None => {
                if !ledger.remove_at(index).await? {
                    break;
                }
                info!(index, "Purged ledger row with blank key");
                removed += 1;
            }
        }
    }

    Ok(removed)
}
