/// Durable run state kept in a sheet
///
/// The ledger is a small key-value store laid over a two-column sheet
/// (`[key, JSON value]`). It holds one [`CompletionMap`] per [`DayKey`]:
/// which accounts have had their report rows stored today.
///
/// ## Lifecycle
///
/// - At the start of a run, [`purge_stale`] drops every entry whose key is
///   not today's key. After a purge at most one entry is live.
/// - The run loads today's map (absent reads as empty), adds the accounts
///   it stored, and writes the map back once, at the end.
///
/// ## Usage
///
/// ```rust,ignore
/// use fleetreport::ledger::{DayKey, KeyValueLedger, CompletionMap, purge_stale};
///
/// let mut ledger = KeyValueLedger::open(sheet).await?;
/// let today = DayKey::today();
/// purge_stale(&mut ledger, &today).await?;
/// let done: CompletionMap = ledger.get(&today.to_string()).await?.unwrap_or_default();
/// ```

pub mod completion;
pub mod day;
pub mod error;
pub mod store;

pub use completion::CompletionMap;
pub use day::{DayKey, parse_day, purge_stale};
pub use error::{LedgerError, Result};
pub use store::{KeyValueLedger, LedgerEntry};
