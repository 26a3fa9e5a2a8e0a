//! Per-account report fetching
//!
//! A [`ReportFetcher`] runs the fixed [`ReportQuery`] for one account and
//! returns raw source rows. [`dispatch`] fans a batch out over fetchers with
//! bounded concurrency and waits for every account; failures come back as
//! [`AccountResult::Failed`] values, never as errors.

mod dispatch;
mod http;
mod projection;
mod query;

pub use dispatch::{DispatchConfig, dispatch};
pub use http::HttpReportFetcher;
pub use projection::project_rows;
pub use query::{ReportQuery, TIMESTAMP_COLUMN};

use async_trait::async_trait;
use thiserror::Error;

use crate::account::AccountId;
use crate::client::ClientError;
use crate::sheet::Row;

/// One row returned by a report query: field name to value
pub type SourceRow = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("report unavailable: {0}")]
    Unavailable(String),
}

/// Runs the report query for a single account
#[async_trait]
pub trait ReportFetcher: Send + Sync {
    /// Source rows for `account`. An empty vector means nothing to report.
    async fn fetch(&self, account: &AccountId, query: &ReportQuery)
    -> Result<Vec<SourceRow>, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStatus {
    /// Query error or non-OK response
    Error,
    /// Exceeded the per-account time limit
    Timeout,
    /// Task died before reporting back
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub status: FailureStatus,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccountResult {
    /// Projected report rows, ready to append
    Rows(Vec<Row>),
    /// The account had nothing to report
    Empty,
    Failed(FetchFailure),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountOutcome {
    pub account: AccountId,
    pub result: AccountResult,
}

impl AccountOutcome {
    /// Rows and empty results both count as done for the day
    pub fn is_success(&self) -> bool {
        !matches!(self.result, AccountResult::Failed(_))
    }
}
