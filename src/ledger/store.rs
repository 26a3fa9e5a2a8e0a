use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::sheet::{Row, SheetHandle, cell_text, is_blank};

use super::error::Result;

/// Key-value store over a two-column sheet: `[key, serialized value]`
///
/// Lookups are linear scans of the whole region. Values are stored as JSON
/// text so the sheet stays readable by hand.
pub struct KeyValueLedger {
    sheet: SheetHandle,
    length: usize,
}

/// Raw ledger row, as shown by `fleetreport ledger show`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub key: String,
    pub value: String,
}

impl KeyValueLedger {
    /// Open a ledger, counting its entries from storage
    pub async fn open(sheet: SheetHandle) -> Result<Self> {
        let length = sheet.read_all().await?.len();
        info!(sheet = sheet.name(), entries = length, "Opened ledger");
        Ok(Self { sheet, length })
    }

    /// Number of entries, as tracked by this instance
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Decoded value stored under `key`
    ///
    /// A missing, blank, or undecodable value cell reads as `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        if key.is_empty() {
            return Ok(None);
        }

        let rows = self.sheet.read_all().await?;
        for row in &rows {
            if !row_has_key(row, key) || is_blank(row.get(1)) {
                continue;
            }
            let text = cell_text(&row[1]);
            return match serde_json::from_str(&text) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    warn!(key, error = %e, "Malformed ledger value, treating as absent");
                    Ok(None)
                }
            };
        }
        Ok(None)
    }

    /// Store `value` under `key`, overwriting an existing row in place
    ///
    /// Empty keys and absent values (null, `false`, `0`, `""`) are ignored.
    /// Empty objects and arrays are stored.
    pub async fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        if key.is_empty() || is_absent(&value) {
            debug!(key, "Ignoring ledger write with empty key or value");
            return Ok(());
        }

        let row = vec![
            Value::String(key.to_string()),
            Value::String(serde_json::to_string(&value)?),
        ];

        let rows = self.sheet.read_all().await?;
        match position(&rows, key) {
            Some(index) => {
                self.sheet.overwrite(index + 1, row).await?;
                debug!(key, row = index + 1, "Ledger entry overwritten");
            }
            None => {
                self.sheet.append(row).await?;
                self.length += 1;
                debug!(key, "Ledger entry appended");
            }
        }
        Ok(())
    }

    /// Remove the entry stored under `key`. Returns false if there was none.
    pub async fn remove(&mut self, key: &str) -> Result<bool> {
        if key.is_empty() {
            return Ok(false);
        }

        let rows = self.sheet.read_all().await?;
        let Some(index) = position(&rows, key) else {
            return Ok(false);
        };
        self.sheet.delete(index + 1, 1).await?;
        self.length = self.length.saturating_sub(1);
        debug!(key, "Ledger entry removed");
        Ok(true)
    }

    /// Remove the entry at 0-based `index`, whatever its key
    pub async fn remove_at(&mut self, index: usize) -> Result<bool> {
        let rows = self.sheet.read_all().await?;
        if index >= rows.len() {
            return Ok(false);
        }
        self.sheet.delete(index + 1, 1).await?;
        self.length = self.length.saturating_sub(1);
        Ok(true)
    }

    /// Key of the entry at 0-based `index`; `None` past the end or for a blank key
    pub async fn key_at(&self, index: usize) -> Result<Option<String>> {
        let rows = self.sheet.read_all().await?;
        Ok(rows
            .get(index)
            .and_then(|row| row.first())
            .filter(|cell| !is_blank(Some(*cell)))
            .map(cell_text))
    }

    /// Every entry in storage order, values left undecoded
    pub async fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let rows = self.sheet.read_all().await?;
        Ok(rows
            .iter()
            .map(|row| LedgerEntry {
                key: row.first().map(cell_text).unwrap_or_default(),
                value: row.get(1).map(cell_text).unwrap_or_default(),
            })
            .collect())
    }

    /// Remove every entry
    pub async fn clear(&mut self) -> Result<()> {
        self.sheet.clear().await?;
        self.length = 0;
        info!(sheet = self.sheet.name(), "Ledger cleared");
        Ok(())
    }
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn row_has_key(row: &Row, key: &str) -> bool {
    row.first().is_some_and(|cell| cell_text(cell) == key)
}

fn position(rows: &[Row], key: &str) -> Option<usize> {
    rows.iter().position(|row| row_has_key(row, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::{MemorySheet, TabularStore};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    async fn create_test_ledger() -> (KeyValueLedger, Arc<MemorySheet>) {
        let sheet = Arc::new(MemorySheet::new("_ledger"));
        let ledger = KeyValueLedger::open(sheet.clone()).await.unwrap();
        (ledger, sheet)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (mut ledger, _sheet) = create_test_ledger().await;
        ledger.set("myKey", &json!({"value": "my_value"})).await.unwrap();

        let value: Option<Value> = ledger.get("myKey").await.unwrap();
        assert_eq!(value, Some(json!({"value": "my_value"})));
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let (ledger, _sheet) = create_test_ledger().await;
        let value: Option<Value> = ledger.get("nope").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_keeps_single_row() {
        let (mut ledger, sheet) = create_test_ledger().await;
        ledger.set("k", &json!({"v": 1})).await.unwrap();
        ledger.set("other", &json!([1, 2])).await.unwrap();
        ledger.set("k", &json!({"v": 2})).await.unwrap();

        let value: Option<Value> = ledger.get("k").await.unwrap();
        assert_eq!(value, Some(json!({"v": 2})));

        let rows = sheet.rows().await;
        let k_rows = rows.iter().filter(|r| r[0] == json!("k")).count();
        assert_eq!(k_rows, 1);
        assert_eq!(rows.len(), 2);
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test]
    async fn test_set_ignores_empty_key_and_absent_values() {
        let (mut ledger, sheet) = create_test_ledger().await;
        ledger.set("", &json!({"a": 1})).await.unwrap();
        ledger.set("k", &Value::Null).await.unwrap();
        ledger.set("k", &Option::<u32>::None).await.unwrap();
        ledger.set("k", "").await.unwrap();
        ledger.set("f", &false).await.unwrap();
        ledger.set("z", &0).await.unwrap();

        assert!(sheet.rows().await.is_empty());
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_absent_value_keeps_existing_entry() {
        let (mut ledger, sheet) = create_test_ledger().await;
        ledger.set("k", &true).await.unwrap();
        ledger.set("k", &false).await.unwrap();

        assert_eq!(sheet.rows().await, vec![vec![json!("k"), json!("true")]]);
        assert_eq!(ledger.get::<bool>("k").await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_empty_collections_are_stored() {
        let (mut ledger, sheet) = create_test_ledger().await;
        ledger.set("a", &Vec::<u32>::new()).await.unwrap();
        ledger.set("o", &json!({})).await.unwrap();

        assert_eq!(ledger.len(), 2);
        assert_eq!(
            sheet.rows().await,
            vec![vec![json!("a"), json!("[]")], vec![json!("o"), json!("{}")]]
        );
    }

    #[tokio::test]
    async fn test_empty_map_is_stored() {
        let (mut ledger, _sheet) = create_test_ledger().await;
        ledger.set("20240101", &BTreeMap::<String, bool>::new()).await.unwrap();

        let value: Option<BTreeMap<String, bool>> = ledger.get("20240101").await.unwrap();
        assert_eq!(value, Some(BTreeMap::new()));
    }

    #[tokio::test]
    async fn test_remove() {
        let (mut ledger, sheet) = create_test_ledger().await;
        ledger.set("a", &json!(1)).await.unwrap();
        ledger.set("b", &json!(2)).await.unwrap();

        assert!(ledger.remove("a").await.unwrap());
        assert!(!ledger.remove("a").await.unwrap());
        assert_eq!(ledger.len(), 1);
        assert_eq!(sheet.rows().await, vec![vec![json!("b"), json!("2")]]);
    }

    #[tokio::test]
    async fn test_key_at() {
        let sheet = Arc::new(MemorySheet::with_rows(
            "_ledger",
            vec![
                vec![json!("20240101"), json!("{}")],
                vec![json!(""), json!("{}")],
                vec![json!(20240102), json!("{}")],
            ],
        ));
        let ledger = KeyValueLedger::open(sheet).await.unwrap();

        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.key_at(0).await.unwrap().as_deref(), Some("20240101"));
        assert_eq!(ledger.key_at(1).await.unwrap(), None);
        assert_eq!(ledger.key_at(2).await.unwrap().as_deref(), Some("20240102"));
        assert_eq!(ledger.key_at(3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_numeric_key_cells_match_string_keys() {
        let sheet = Arc::new(MemorySheet::with_rows(
            "_ledger",
            vec![vec![json!(20240101), json!(r#"{"A":true}"#)]],
        ));
        let ledger = KeyValueLedger::open(sheet).await.unwrap();

        let value: Option<Value> = ledger.get("20240101").await.unwrap();
        assert_eq!(value, Some(json!({"A": true})));
    }

    #[tokio::test]
    async fn test_malformed_value_reads_as_absent() {
        let sheet = Arc::new(MemorySheet::with_rows(
            "_ledger",
            vec![
                vec![json!("bad"), json!("{not json")],
                vec![json!("blank")],
            ],
        ));
        let ledger = KeyValueLedger::open(sheet).await.unwrap();

        let bad: Option<Value> = ledger.get("bad").await.unwrap();
        let blank: Option<Value> = ledger.get("blank").await.unwrap();
        assert!(bad.is_none());
        assert!(blank.is_none());
    }

    #[tokio::test]
    async fn test_length_recounted_on_open() {
        let sheet = Arc::new(MemorySheet::new("_ledger"));
        let mut first = KeyValueLedger::open(sheet.clone()).await.unwrap();
        first.set("a", &json!(1)).await.unwrap();

        // A second instance writes behind the first one's back
        let mut second = KeyValueLedger::open(sheet.clone()).await.unwrap();
        second.set("b", &json!(2)).await.unwrap();
        assert_eq!(first.len(), 1);

        let third = KeyValueLedger::open(sheet.clone()).await.unwrap();
        assert_eq!(third.len(), 2);
    }

    #[tokio::test]
    async fn test_clear() {
        let (mut ledger, sheet) = create_test_ledger().await;
        ledger.set("a", &json!(1)).await.unwrap();
        ledger.clear().await.unwrap();

        assert!(ledger.is_empty());
        assert!(sheet.read_all().await.unwrap().is_empty());
    }
}
