use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::{
    AccountOutcome, AccountResult, FailureStatus, FetchFailure, ReportFetcher, ReportQuery,
    project_rows,
};
use crate::account::AccountId;
use crate::ledger::DayKey;
use crate::observability::RunMetrics;

/// Fan-out limits for one batch
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub max_in_flight: usize,
    pub account_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 50,
            account_timeout: Duration::from_secs(1800),
        }
    }
}

/// Fetch every account in `batch` concurrently and wait for all of them
///
/// Outcomes come back in batch order. A failing, hanging, or panicking
/// fetch only affects its own account.
pub async fn dispatch(
    batch: &[AccountId],
    fetcher: Arc<dyn ReportFetcher>,
    query: Arc<ReportQuery>,
    day: DayKey,
    config: &DispatchConfig,
    metrics: &RunMetrics,
) -> Vec<AccountOutcome> {
    info!(accounts = batch.len(), max_in_flight = config.max_in_flight, "Dispatching batch");

    let permits = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
    let mut handles = Vec::with_capacity(batch.len());

    for account in batch {
        let permits = permits.clone();
        let fetcher = fetcher.clone();
        let query = query.clone();
        let task_account = account.clone();
        let timeout = config.account_timeout;

        metrics.account_dispatched();
        let handle = tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return failed(FailureStatus::Aborted, "dispatch closed".to_string()),
            };
            fetch_one(fetcher.as_ref(), &task_account, &query, &day, timeout).await
        });
        handles.push((account.clone(), handle));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (account, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => failed(FailureStatus::Aborted, e.to_string()),
        };

        match &result {
            AccountResult::Rows(_) => metrics.account_completed(),
            AccountResult::Empty => metrics.account_empty(),
            AccountResult::Failed(failure) => {
                metrics.account_failed();
                warn!(
                    account = %account,
                    status = ?failure.status,
                    error = failure.message.as_deref().unwrap_or("unknown"),
                    "Error for account"
                );
            }
        }
        outcomes.push(AccountOutcome { account, result });
    }

    outcomes
}

async fn fetch_one(
    fetcher: &dyn ReportFetcher,
    account: &AccountId,
    query: &ReportQuery,
    day: &DayKey,
    timeout: Duration,
) -> AccountResult {
    match tokio::time::timeout(timeout, fetcher.fetch(account, query)).await {
        Err(_) => failed(
            FailureStatus::Timeout,
            format!("timed out after {}s", timeout.as_secs_f64()),
        ),
        Ok(Err(e)) => failed(FailureStatus::Error, e.to_string()),
        Ok(Ok(rows)) if rows.is_empty() => AccountResult::Empty,
        Ok(Ok(rows)) => AccountResult::Rows(project_rows(&rows, &query.fields, day)),
    }
}

fn failed(status: FailureStatus, message: String) -> AccountResult {
    AccountResult::Failed(FetchFailure {
        status,
        message: Some(message),
    })
}
