//! Wires configuration into storage, adapters and the coordinator

use std::sync::Arc;
use thiserror::Error;

use crate::client::{ApiClient, ClientError};
use crate::config::{AccountSource, Config, StorageProvider};
use crate::coordinator::RunCoordinator;
use crate::directory::{AccountDirectory, HttpDirectory, StaticDirectory};
use crate::fetch::HttpReportFetcher;
use crate::ledger::{KeyValueLedger, LedgerError};
use crate::lock::RunLock;
use crate::report::ReportWriter;
use crate::sheet::{SheetHandle, Workbook};
use crate::storage::{StorageClient, StorageError};

const LOCK_OBJECT: &str = "run.lock";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Storage setup failed: {0}")]
    Storage(#[from] StorageError),

    #[error("API client setup failed: {0}")]
    Client(#[from] ClientError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("api.base_url is required to fetch reports")]
    MissingApiBaseUrl,
}

#[derive(Clone)]
pub struct App {
    pub config: Arc<Config>,
    pub workbook: Workbook,
}

impl App {
    /// Open the configured workbook
    pub fn open(config: Config) -> Result<Self, AppError> {
        let storage = match config.storage.provider {
            StorageProvider::Local => StorageClient::local(&config.storage.root)?,
            StorageProvider::Memory => StorageClient::in_memory(),
        };
        let workbook = Workbook::new(
            storage,
            config.storage.workbook.clone(),
            config.storage.max_region_bytes,
        );
        Ok(Self {
            config: Arc::new(config),
            workbook,
        })
    }

    pub fn ledger_sheet(&self) -> SheetHandle {
        Arc::new(self.workbook.sheet(&self.config.sheets.ledger))
    }

    pub fn report_sheet(&self) -> SheetHandle {
        Arc::new(self.workbook.sheet(&self.config.sheets.report))
    }

    pub async fn ledger(&self) -> Result<KeyValueLedger, AppError> {
        Ok(KeyValueLedger::open(self.ledger_sheet()).await?)
    }

    pub fn run_lock(&self) -> Option<RunLock> {
        self.config.lock.enabled.then(|| {
            RunLock::new(
                self.workbook.storage().clone(),
                self.workbook.object_key(LOCK_OBJECT),
                self.config.lock.stale_after(),
            )
        })
    }

    fn api_client(&self) -> Result<ApiClient, AppError> {
        let http = self
            .config
            .api
            .http_config()
            .ok_or(AppError::MissingApiBaseUrl)?;
        Ok(ApiClient::new(http)?)
    }

    pub fn directory(&self) -> Result<Arc<dyn AccountDirectory>, AppError> {
        Ok(match self.config.accounts.source {
            AccountSource::Static => Arc::new(StaticDirectory::new(self.config.accounts.ids.clone())),
            AccountSource::Http => Arc::new(HttpDirectory::new(self.api_client()?)),
        })
    }

    pub fn coordinator(&self) -> Result<RunCoordinator, AppError> {
        let query = Arc::new(self.config.query.clone());
        let report = ReportWriter::new(
            self.report_sheet(),
            query.header(),
            self.config.retention.report_ttl_days,
        );

        Ok(RunCoordinator::builder()
            .ledger_sheet(self.ledger_sheet())
            .report(report)
            .directory(self.directory()?)
            .fetcher(Arc::new(HttpReportFetcher::new(self.api_client()?)))
            .query(query)
            .dispatch(self.config.run.dispatch_config())
            .maybe_lock(self.run_lock())
            .build())
    }
}
