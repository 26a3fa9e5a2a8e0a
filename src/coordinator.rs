//! One invocation of the resumable batch job
//!
//! ```text
//! lock → purge stale ledger entries → load today's completion map
//!      → select batch → dispatch (wait for all) → persist report rows
//!      → save completion map → unlock
//! ```
//!
//! Steps run strictly in order. Per-account fetch failures are recorded and
//! left for the next run; any storage fault aborts the run before the
//! completion map is saved.

use bon::Builder;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::account::AccountId;
use crate::batch::{AccountBatch, BatchSelector};
use crate::directory::{AccountDirectory, DirectoryError};
use crate::fetch::{AccountResult, DispatchConfig, ReportFetcher, ReportQuery, dispatch};
use crate::ledger::{CompletionMap, DayKey, KeyValueLedger, LedgerError, purge_stale};
use crate::lock::{LockError, RunLock};
use crate::observability::{MetricsSnapshot, RunMetrics};
use crate::report::ReportWriter;
use crate::sheet::{SheetError, SheetHandle};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Report storage fault: {0}")]
    Report(#[from] SheetError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

/// What one invocation did
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub day_key: DayKey,
    pub batch: AccountBatch,
    /// Accounts marked complete by this run (rows stored or nothing to store)
    pub succeeded: Vec<AccountId>,
    /// Accounts left unmarked for a later run
    pub failed: Vec<AccountId>,
    pub already_processed: usize,
    pub deferred: usize,
    pub metrics: MetricsSnapshot,
}

impl RunSummary {
    /// True when every account was already done for the day
    pub fn is_noop(&self) -> bool {
        self.batch.is_empty()
    }
}

#[derive(Builder)]
pub struct RunCoordinator {
    ledger_sheet: SheetHandle,
    report: ReportWriter,
    directory: Arc<dyn AccountDirectory>,
    fetcher: Arc<dyn ReportFetcher>,
    #[builder(default = Arc::new(ReportQuery::default()))]
    query: Arc<ReportQuery>,
    /// `max_in_flight` doubles as the batch ceiling
    #[builder(default)]
    dispatch: DispatchConfig,
    lock: Option<RunLock>,
}

impl RunCoordinator {
    /// Process the next batch for `today`
    pub async fn run(&self, today: DayKey) -> Result<RunSummary, RunError> {
        let guard = match &self.lock {
            Some(lock) => Some(lock.acquire().await?),
            None => None,
        };

        let result = self.run_unlocked(today).await;

        if let Some(guard) = guard {
            if let Err(e) = guard.release().await {
                warn!(error = %e, "Failed to release run lock");
            }
        }
        result
    }

    async fn run_unlocked(&self, today: DayKey) -> Result<RunSummary, RunError> {
        let metrics = RunMetrics::new();
        let day_key = today.to_string();
        info!(day_key = %day_key, "Starting run");

        // Purge
        let mut ledger = KeyValueLedger::open(self.ledger_sheet.clone()).await?;
        let purged = purge_stale(&mut ledger, &today).await?;
        metrics.ledger_entries_purged(purged);

        // Load
        let mut completed: CompletionMap = ledger.get(&day_key).await?.unwrap_or_default();
        info!(day_key = %day_key, processed = completed.processed_count(), "Loaded completion map");

        // Select
        let accounts = self.directory.list_all().await?;
        let selector = BatchSelector::new(self.dispatch.max_in_flight);
        let selection = selector.select(&accounts, &completed);

        if selection.is_empty() {
            info!(day_key = %day_key, accounts = accounts.len(), "All accounts processed for today");
            return Ok(RunSummary {
                day_key: today,
                batch: Vec::new(),
                succeeded: Vec::new(),
                failed: Vec::new(),
                already_processed: selection.already_processed,
                deferred: 0,
                metrics: metrics.snapshot(),
            });
        }

        // Dispatch
        let dispatchable = self.directory.filter_by_ids(&selection.batch).await?;
        if dispatchable.len() < selection.batch.len() {
            warn!(
                selected = selection.batch.len(),
                present = dispatchable.len(),
                "Some selected accounts left the directory"
            );
        }
        let outcomes = dispatch(
            &dispatchable,
            self.fetcher.clone(),
            self.query.clone(),
            today,
            &self.dispatch,
            &metrics,
        )
        .await;

        // Persist
        self.report.ensure_header().await?;
        let rows_purged = self.report.purge_expired(today.date()).await?;
        metrics.rows_purged(rows_purged);

        let mut rows = Vec::new();
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                AccountResult::Rows(lines) => {
                    info!(account = %outcome.account, rows = lines.len(), "Storing results");
                    rows.extend(lines);
                    succeeded.push(outcome.account);
                }
                AccountResult::Empty => {
                    info!(account = %outcome.account, "No results");
                    succeeded.push(outcome.account);
                }
                AccountResult::Failed(_) => failed.push(outcome.account),
            }
        }

        let appended = self.report.append(rows).await?;
        metrics.rows_appended(appended);

        for account in &succeeded {
            completed.mark_processed(account);
        }

        // Save
        ledger.set(&day_key, &completed).await?;

        let summary = RunSummary {
            day_key: today,
            batch: selection.batch,
            succeeded,
            failed,
            already_processed: selection.already_processed,
            deferred: selection.deferred,
            metrics: metrics.snapshot(),
        };
        info!(
            day_key = %day_key,
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            deferred = summary.deferred,
            rows = appended,
            "Done"
        );
        Ok(summary)
    }
}
