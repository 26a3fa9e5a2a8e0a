use serde::{Deserialize, Serialize};

/// Name of the column appended to every report row
pub const TIMESTAMP_COLUMN: &str = "Timestamp";

/// Fixed report query run against every account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportQuery {
    /// Projected fields, in report column order
    #[serde(default = "default_fields")]
    pub fields: Vec<String>,
    #[serde(default = "default_resource")]
    pub resource: String,
    /// WHERE clause body; empty for no filter
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default = "default_during")]
    pub during: String,
}

impl Default for ReportQuery {
    fn default() -> Self {
        Self {
            fields: default_fields(),
            resource: default_resource(),
            filter: default_filter(),
            during: default_during(),
        }
    }
}

impl ReportQuery {
    /// `SELECT <fields> FROM <resource> [WHERE <filter>] DURING <range>`
    pub fn to_query_string(&self) -> String {
        let mut query = format!("SELECT {} FROM {}", self.fields.join(", "), self.resource);
        if !self.filter.trim().is_empty() {
            query.push_str(" WHERE ");
            query.push_str(self.filter.trim());
        }
        if !self.during.trim().is_empty() {
            query.push_str(" DURING ");
            query.push_str(self.during.trim());
        }
        query
    }

    /// Report sheet header: the projected fields followed by the timestamp column
    pub fn header(&self) -> Vec<String> {
        let mut header = self.fields.clone();
        header.push(TIMESTAMP_COLUMN.to_string());
        header
    }
}

fn default_fields() -> Vec<String> {
    ["ExternalCustomerId", "AccountDescriptiveName", "Clicks", "Impressions"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_resource() -> String {
    "ACCOUNT_PERFORMANCE_REPORT".to_string()
}

fn default_filter() -> String {
    "Clicks > 0".to_string()
}

fn default_during() -> String {
    "LAST_30_DAYS".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_query_string() {
        assert_eq!(
            ReportQuery::default().to_query_string(),
            "SELECT ExternalCustomerId, AccountDescriptiveName, Clicks, Impressions \
             FROM ACCOUNT_PERFORMANCE_REPORT WHERE Clicks > 0 DURING LAST_30_DAYS"
        );
    }

    #[test]
    fn test_query_without_filter() {
        let query = ReportQuery {
            fields: vec!["Date".to_string(), "Cost".to_string()],
            filter: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(
            query.to_query_string(),
            "SELECT Date, Cost FROM ACCOUNT_PERFORMANCE_REPORT DURING LAST_30_DAYS"
        );
    }

    #[test]
    fn test_header_appends_timestamp() {
        let header = ReportQuery::default().header();
        assert_eq!(header.len(), 5);
        assert_eq!(header.last().map(String::as_str), Some("Timestamp"));
    }
}
