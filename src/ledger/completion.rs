use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::account::AccountId;

/// Per-day record of accounts whose results are durably stored
///
/// Serialized as a flat JSON object `{"<account>": true, ...}`. Entries are
/// only ever added within a day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionMap(BTreeMap<String, bool>);

impl CompletionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// True only for accounts present with a `true` flag
    pub fn is_processed(&self, account: &AccountId) -> bool {
        self.0.get(account.as_str()).copied().unwrap_or(false)
    }

    pub fn mark_processed(&mut self, account: &AccountId) {
        self.0.insert(account.as_str().to_string(), true);
    }

    pub fn processed_count(&self) -> usize {
        self.0.values().filter(|done| **done).count()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<A: Into<AccountId>> FromIterator<A> for CompletionMap {
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        let mut map = CompletionMap::new();
        for account in iter {
            map.mark_processed(&account.into());
        }
        map
    }
}
