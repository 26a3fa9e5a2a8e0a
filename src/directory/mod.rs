//! Live account directory
//!
//! The directory is the source of truth for which accounts exist. Its
//! enumeration order drives batch selection, so implementations must return
//! accounts in a stable order.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;
use tracing::info;

use crate::account::AccountId;
use crate::client::{ApiClient, ClientError};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Account directory request failed: {0}")]
    Client(#[from] ClientError),

    #[error("Account directory unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, DirectoryError>;

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Every account, in stable enumeration order
    async fn list_all(&self) -> Result<Vec<AccountId>>;

    /// The subset of `ids` still present in the directory, in directory order
    async fn filter_by_ids(&self, ids: &[AccountId]) -> Result<Vec<AccountId>> {
        let wanted: HashSet<&AccountId> = ids.iter().collect();
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|account| wanted.contains(account))
            .collect())
    }
}

/// Fixed account list from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    accounts: Vec<AccountId>,
}

impl StaticDirectory {
    pub fn new<I, A>(accounts: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<AccountId>,
    {
        Self {
            accounts: accounts.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl AccountDirectory for StaticDirectory {
    async fn list_all(&self) -> Result<Vec<AccountId>> {
        Ok(self.accounts.clone())
    }
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    accounts: Vec<AccountId>,
}

/// Directory served by `GET {base_url}/accounts` as `{"accounts": ["id", ...]}`
#[derive(Clone)]
pub struct HttpDirectory {
    client: ApiClient,
}

impl HttpDirectory {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AccountDirectory for HttpDirectory {
    async fn list_all(&self) -> Result<Vec<AccountId>> {
        let response: Option<AccountsResponse> = self.client.get_json("accounts").await?;
        let accounts = response.map(|r| r.accounts).unwrap_or_default();
        info!(accounts = accounts.len(), "Listed accounts");
        Ok(accounts)
    }
}
