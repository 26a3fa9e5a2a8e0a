use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FetchError, ReportFetcher, ReportQuery, SourceRow};
use crate::account::AccountId;
use crate::client::ApiClient;

#[derive(Debug, Serialize)]
struct ReportRequest<'a> {
    query: String,
    fields: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ReportResponse {
    #[serde(default)]
    rows: Vec<SourceRow>,
}

/// Fetches reports from `POST {base_url}/accounts/{id}/report`
///
/// Request body: `{"query": "SELECT ...", "fields": [...]}`.
/// Reply: `{"rows": [{"<field>": value, ...}]}`, or 204 for no rows.
#[derive(Clone)]
pub struct HttpReportFetcher {
    client: ApiClient,
}

impl HttpReportFetcher {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReportFetcher for HttpReportFetcher {
    async fn fetch(
        &self,
        account: &AccountId,
        query: &ReportQuery,
    ) -> Result<Vec<SourceRow>, FetchError> {
        let request = ReportRequest {
            query: query.to_query_string(),
            fields: &query.fields,
        };
        let path = format!("accounts/{}/report", account);
        let response: Option<ReportResponse> = self.client.post_json(&path, &request).await?;
        let rows = response.map(|r| r.rows).unwrap_or_default();
        debug!(account = %account, rows = rows.len(), "Report fetched");
        Ok(rows)
    }
}
