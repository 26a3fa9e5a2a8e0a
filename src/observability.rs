//! Logging setup and run counters

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default level.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,hyper=warn,reqwest=warn".into()),
        )
        .init();
}

/// Counters for one invocation
#[derive(Debug, Default)]
pub struct RunMetrics {
    accounts_dispatched: AtomicU64,
    accounts_completed: AtomicU64,
    accounts_empty: AtomicU64,
    accounts_failed: AtomicU64,
    rows_appended: AtomicU64,
    rows_purged: AtomicU64,
    ledger_entries_purged: AtomicU64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account_dispatched(&self) {
        self.accounts_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn account_completed(&self) {
        self.accounts_completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "accounts_completed", "Metric incremented");
    }

    pub fn account_empty(&self) {
        self.accounts_empty.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "accounts_empty", "Metric incremented");
    }

    pub fn account_failed(&self) {
        self.accounts_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "accounts_failed", "Metric incremented");
    }

    pub fn rows_appended(&self, count: usize) {
        self.rows_appended.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn rows_purged(&self, count: usize) {
        self.rows_purged.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn ledger_entries_purged(&self, count: usize) {
        self.ledger_entries_purged.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            accounts_dispatched: self.accounts_dispatched.load(Ordering::Relaxed),
            accounts_completed: self.accounts_completed.load(Ordering::Relaxed),
            accounts_empty: self.accounts_empty.load(Ordering::Relaxed),
            accounts_failed: self.accounts_failed.load(Ordering::Relaxed),
            rows_appended: self.rows_appended.load(Ordering::Relaxed),
            rows_purged: self.rows_purged.load(Ordering::Relaxed),
            ledger_entries_purged: self.ledger_entries_purged.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub accounts_dispatched: u64,
    /// Accounts that returned rows
    pub accounts_completed: u64,
    /// Accounts that returned no rows
    pub accounts_empty: u64,
    pub accounts_failed: u64,
    pub rows_appended: u64,
    pub rows_purged: u64,
    pub ledger_entries_purged: u64,
}
