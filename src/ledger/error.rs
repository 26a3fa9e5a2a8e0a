use thiserror::Error;

use crate::sheet::SheetError;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger storage fault: {0}")]
    Sheet(#[from] SheetError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
