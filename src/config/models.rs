use crate::client::HttpConfig;
use crate::fetch::{DispatchConfig, ReportQuery};
use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub query: ReportQuery,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub lock: LockConfig,
}

/// Storage provider type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    #[default]
    Local,
    /// Process-local, lost on exit. Useful for dry runs.
    Memory,
}

/// Where the workbook lives
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    /// Root directory for the `local` provider
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Workbook name; sheets live under `<root>/<workbook>/`
    #[serde(default = "default_workbook")]
    pub workbook: String,
    /// Largest sheet document accepted on read
    #[serde(default = "default_max_region_bytes")]
    pub max_region_bytes: ByteSize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::Local,
            root: default_root(),
            workbook: default_workbook(),
            max_region_bytes: default_max_region_bytes(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_workbook() -> String {
    "fleet-report".to_string()
}

fn default_max_region_bytes() -> ByteSize {
    ByteSize::mib(16)
}

/// Sheet names inside the workbook
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SheetsConfig {
    #[serde(default = "default_ledger_sheet")]
    pub ledger: String,
    #[serde(default = "default_report_sheet")]
    pub report: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            ledger: default_ledger_sheet(),
            report: default_report_sheet(),
        }
    }
}

fn default_ledger_sheet() -> String {
    "_remoteStorage".to_string()
}

fn default_report_sheet() -> String {
    "Report".to_string()
}

/// Per-invocation limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// Batch ceiling and fan-out width
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    #[serde(default = "default_account_timeout_secs")]
    pub account_timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            account_timeout_secs: default_account_timeout_secs(),
        }
    }
}

impl RunConfig {
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            max_in_flight: self.parallelism,
            account_timeout: Duration::from_secs(self.account_timeout_secs),
        }
    }
}

/// Platform cap on accounts processed in parallel
pub const MAX_PARALLELISM: usize = 50;

fn default_parallelism() -> usize {
    MAX_PARALLELISM
}

fn default_account_timeout_secs() -> u64 {
    1800
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    /// Report rows older than this many days are deleted
    #[serde(default = "default_report_ttl_days")]
    pub report_ttl_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            report_ttl_days: default_report_ttl_days(),
        }
    }
}

fn default_report_ttl_days() -> u32 {
    30
}

/// Where the account list comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountSource {
    #[default]
    Static,
    Http,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AccountsConfig {
    #[serde(default)]
    pub source: AccountSource,
    /// Account ids for the `static` source, in processing order
    #[serde(default)]
    pub ids: Vec<String>,
}

/// Reporting API endpoint shared by the fetcher and the HTTP directory
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Bearer token (loaded from environment, not from config file)
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            user_agent: default_user_agent(),
            token: None,
        }
    }
}

impl ApiConfig {
    /// Client settings, or `None` when no endpoint is configured
    pub fn http_config(&self) -> Option<HttpConfig> {
        let base_url = self.base_url.clone()?;
        Some(HttpConfig {
            base_url,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            user_agent: self.user_agent.clone(),
            token: self.token.clone(),
        })
    }
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_user_agent() -> String {
    concat!("fleetreport/", env!("CARGO_PKG_VERSION")).to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_enabled")]
    pub enabled: bool,
    /// Age after which a held lock is considered abandoned
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            enabled: default_lock_enabled(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl LockConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

fn default_lock_enabled() -> bool {
    true
}

fn default_stale_after_secs() -> u64 {
    7200
}
