//! Batch selection: which accounts this invocation processes
//!
//! Accounts are taken in directory order, skipping those already completed
//! today, up to the parallelism ceiling. Everything past the ceiling waits
//! for a later run. With a stable directory order every run makes forward
//! progress and the fleet drains in `ceil(pending / ceiling)` runs.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::account::AccountId;
use crate::ledger::CompletionMap;

/// Accounts dispatched together in one run, in directory order
pub type AccountBatch = Vec<AccountId>;

/// Outcome of one selection pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub batch: AccountBatch,
    /// Accounts already completed today
    pub already_processed: usize,
    /// Pending accounts left for a later run
    pub deferred: usize,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchSelector {
    ceiling: usize,
}

impl BatchSelector {
    pub fn new(ceiling: usize) -> Self {
        Self { ceiling }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Split `accounts` into done and pending, then cap pending at the ceiling
    ///
    /// Duplicate ids in `accounts` are considered once.
    pub fn select(&self, accounts: &[AccountId], completed: &CompletionMap) -> Selection {
        let mut seen = HashSet::with_capacity(accounts.len());
        let mut already_processed = 0;
        let mut pending = Vec::new();

        for account in accounts {
            if !seen.insert(account) {
                continue;
            }
            if completed.is_processed(account) {
                debug!(account = %account, "Already processed account");
                already_processed += 1;
            } else {
                debug!(account = %account, "Not yet processed account");
                pending.push(account.clone());
            }
        }

        let deferred = pending.len().saturating_sub(self.ceiling);
        if deferred > 0 {
            info!(
                ceiling = self.ceiling,
                deferred, "Parallel execution limit reached, deferring remaining accounts"
            );
            pending.truncate(self.ceiling);
        }

        Selection {
            batch: pending,
            already_processed,
            deferred,
        }
    }
}
