//! Advisory lock guarding the ledger against overlapping runs
//!
//! The sheets have no transactions, so two runs on the same workbook would
//! lose each other's ledger writes. A run first creates a lock object with
//! put-if-absent semantics; a second run sees it and stops. A lock older
//! than `stale_after` is assumed abandoned (the host killed its run) and
//! is broken.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};
use uuid::Uuid;

use crate::storage::{StorageClient, StorageError};

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Another run holds the lock (owner {owner}, acquired {acquired_at})")]
    Held { owner: Uuid, acquired_at: String },

    #[error("Lock is contended")]
    Contended,

    #[error("Lock storage fault: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, LockError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockRecord {
    owner: Uuid,
    acquired_at: String,
}

impl LockRecord {
    fn new(owner: Uuid) -> Self {
        let acquired_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        Self { owner, acquired_at }
    }

    /// Unreadable timestamps count as stale
    fn is_stale(&self, stale_after: Duration) -> bool {
        let Ok(acquired) = OffsetDateTime::parse(&self.acquired_at, &Rfc3339) else {
            return true;
        };
        let age = OffsetDateTime::now_utc().unix_timestamp() - acquired.unix_timestamp();
        age >= stale_after.as_secs() as i64
    }
}

enum LockState {
    Free,
    Held(LockRecord),
    Corrupt,
}

#[derive(Clone)]
pub struct RunLock {
    storage: StorageClient,
    key: String,
    stale_after: Duration,
}

impl RunLock {
    pub fn new(storage: StorageClient, key: impl Into<String>, stale_after: Duration) -> Self {
        Self {
            storage,
            key: key.into(),
            stale_after,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Take the lock, breaking it once if the current holder looks abandoned
    pub async fn acquire(&self) -> Result<LockGuard> {
        let owner = Uuid::now_v7();

        for attempt in 0..2 {
            let record = LockRecord::new(owner);
            let bytes = serde_json::to_vec_pretty(&record).unwrap_or_default();

            match self.storage.create_new(&self.key, bytes).await {
                Ok(_) => {
                    info!(key = %self.key, %owner, "Run lock acquired");
                    return Ok(LockGuard {
                        storage: self.storage.clone(),
                        key: self.key.clone(),
                        owner,
                    });
                }
                Err(StorageError::AlreadyExists(_)) => {}
                Err(e) => return Err(e.into()),
            }

            match self.read().await? {
                LockState::Free => continue,
                LockState::Held(held) if attempt == 0 && held.is_stale(self.stale_after) => {
                    warn!(key = %self.key, owner = %held.owner, acquired_at = %held.acquired_at, "Breaking stale run lock");
                    self.storage.delete(&self.key).await?;
                }
                LockState::Corrupt if attempt == 0 => {
                    warn!(key = %self.key, "Breaking unreadable run lock");
                    self.storage.delete(&self.key).await?;
                }
                LockState::Held(held) => {
                    return Err(LockError::Held {
                        owner: held.owner,
                        acquired_at: held.acquired_at,
                    });
                }
                LockState::Corrupt => return Err(LockError::Contended),
            }
        }

        Err(LockError::Contended)
    }

    async fn read(&self) -> Result<LockState> {
        let Some(bytes) = self.storage.download_optional(&self.key).await? else {
            return Ok(LockState::Free);
        };
        Ok(match serde_json::from_slice(&bytes) {
            Ok(record) => LockState::Held(record),
            Err(_) => LockState::Corrupt,
        })
    }
}

/// Proof of holding the run lock
pub struct LockGuard {
    storage: StorageClient,
    key: String,
    owner: Uuid,
}

impl LockGuard {
    pub fn owner(&self) -> Uuid {
        self.owner
    }

    /// Drop the lock if this guard still owns it
    pub async fn release(self) -> Result<()> {
        let current = self
            .storage
            .download_optional(&self.key)
            .await?
            .and_then(|bytes| serde_json::from_slice::<LockRecord>(&bytes).ok());

        match current {
            Some(record) if record.owner == self.owner => {
                self.storage.delete(&self.key).await?;
                info!(key = %self.key, owner = %self.owner, "Run lock released");
            }
            _ => warn!(key = %self.key, owner = %self.owner, "Run lock no longer ours, leaving it"),
        }
        Ok(())
    }
}
