use super::models::{Config, MAX_PARALLELISM};
use crate::fetch::TIMESTAMP_COLUMN;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("run.parallelism must be between 1 and {max}, got {value}")]
    InvalidParallelism { value: usize, max: usize },

    #[error("run.account_timeout_secs must be positive")]
    InvalidAccountTimeout,

    #[error("query.fields must name at least one field")]
    NoProjectionFields,

    #[error("query.fields must not contain '{field}', it is appended to every row")]
    ReservedField { field: String },

    #[error("query.fields lists '{field}' more than once")]
    DuplicateField { field: String },

    #[error("Retention TTL must be positive: {field} = {value}")]
    InvalidRetentionTTL { field: String, value: u32 },

    #[error("api.base_url is not set, reports are always fetched over HTTP")]
    MissingApiBaseUrl,

    #[error("Invalid api.base_url '{url}', expected 'http://' or 'https://'")]
    InvalidApiScheme { url: String },

    #[error("{field} must not be empty")]
    EmptyName { field: String },

    #[error("Ledger and report sheets must differ, both are '{name}'")]
    SheetNameCollision { name: String },

    #[error("lock.stale_after_secs must be positive")]
    InvalidLockStaleAfter,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_run(config)?;
    validate_query(config)?;
    validate_sheets(config)?;
    validate_retention(config)?;
    validate_api(config)?;
    validate_lock(config)?;
    Ok(())
}

fn validate_run(config: &Config) -> Result<(), ValidationError> {
    let value = config.run.parallelism;
    if !(1..=MAX_PARALLELISM).contains(&value) {
        return Err(ValidationError::InvalidParallelism {
            value,
            max: MAX_PARALLELISM,
        });
    }
    if config.run.account_timeout_secs == 0 {
        return Err(ValidationError::InvalidAccountTimeout);
    }
    Ok(())
}

/// Projection fields become report columns, so they must be unique and leave
/// room for the timestamp column
fn validate_query(config: &Config) -> Result<(), ValidationError> {
    if config.query.fields.is_empty() {
        return Err(ValidationError::NoProjectionFields);
    }

    let mut seen = HashSet::new();
    for field in &config.query.fields {
        if field.trim().is_empty() {
            return Err(ValidationError::EmptyName {
                field: "query.fields entry".to_string(),
            });
        }
        if field == TIMESTAMP_COLUMN {
            return Err(ValidationError::ReservedField {
                field: field.clone(),
            });
        }
        if !seen.insert(field.as_str()) {
            return Err(ValidationError::DuplicateField {
                field: field.clone(),
            });
        }
    }
    Ok(())
}

fn validate_sheets(config: &Config) -> Result<(), ValidationError> {
    for (field, value) in [
        ("storage.workbook", &config.storage.workbook),
        ("sheets.ledger", &config.sheets.ledger),
        ("sheets.report", &config.sheets.report),
    ] {
        if value.trim().is_empty() {
            return Err(ValidationError::EmptyName {
                field: field.to_string(),
            });
        }
    }

    if config.sheets.ledger == config.sheets.report {
        return Err(ValidationError::SheetNameCollision {
            name: config.sheets.ledger.clone(),
        });
    }
    Ok(())
}

fn validate_retention(config: &Config) -> Result<(), ValidationError> {
    if config.retention.report_ttl_days == 0 {
        return Err(ValidationError::InvalidRetentionTTL {
            field: "report_ttl_days".to_string(),
            value: 0,
        });
    }
    Ok(())
}

fn validate_api(config: &Config) -> Result<(), ValidationError> {
    match &config.api.base_url {
        Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
            Err(ValidationError::InvalidApiScheme { url: url.clone() })
        }
        Some(_) => Ok(()),
        None => Err(ValidationError::MissingApiBaseUrl),
    }
}

/// A zero window would treat every held lock as abandoned
fn validate_lock(config: &Config) -> Result<(), ValidationError> {
    if config.lock.stale_after_secs == 0 {
        return Err(ValidationError::InvalidLockStaleAfter);
    }
    Ok(())
}
