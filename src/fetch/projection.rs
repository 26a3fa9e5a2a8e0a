use serde_json::Value;

use crate::ledger::DayKey;
use crate::sheet::{Cell, Row};

use super::SourceRow;

/// Field whose values are written without dashes, so sheets keep them as text
const DATE_FIELD: &str = "Date";

/// Project source rows onto `fields`, appending the run's day stamp
///
/// Fields missing from a source row become empty cells.
pub fn project_rows(rows: &[SourceRow], fields: &[String], day: &DayKey) -> Vec<Row> {
    let stamp = day.to_string();
    rows.iter()
        .map(|row| project_row(row, fields, &stamp))
        .collect()
}

fn project_row(row: &SourceRow, fields: &[String], stamp: &str) -> Row {
    let mut line: Row = fields
        .iter()
        .map(|field| {
            let value = row.get(field).cloned().unwrap_or(Cell::Null);
            match value {
                Value::String(s) if field == DATE_FIELD => Value::String(s.replace('-', "")),
                other => other,
            }
        })
        .collect();
    line.push(Value::String(stamp.to_string()));
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn source(value: Value) -> SourceRow {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn day() -> DayKey {
        DayKey::from_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
    }

    #[test]
    fn test_projects_in_field_order() {
        let rows = vec![source(json!({
            "Impressions": "120",
            "ExternalCustomerId": "123-456-7890",
            "Clicks": "4",
            "Unused": "x"
        }))];

        let projected = project_rows(
            &rows,
            &fields(&["ExternalCustomerId", "Clicks", "Impressions"]),
            &day(),
        );

        assert_eq!(
            projected,
            vec![vec![
                json!("123-456-7890"),
                json!("4"),
                json!("120"),
                json!("20240101")
            ]]
        );
    }

    #[test]
    fn test_date_field_loses_dashes() {
        let rows = vec![source(json!({"Date": "2023-12-31", "Cost": 1.5}))];
        let projected = project_rows(&rows, &fields(&["Date", "Cost"]), &day());

        assert_eq!(projected[0], vec![json!("20231231"), json!(1.5), json!("20240101")]);
    }

    #[test]
    fn test_missing_field_is_empty_cell() {
        let rows = vec![source(json!({"Clicks": 3}))];
        let projected = project_rows(&rows, &fields(&["Clicks", "Impressions"]), &day());

        assert_eq!(projected[0], vec![json!(3), Value::Null, json!("20240101")]);
    }
}
