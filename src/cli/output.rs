//! Rendering of command results as JSON, CSV or a plain table

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON format (default)
    Json,
    /// CSV format
    Csv,
    /// Column-aligned table
    Table,
}

/// Format results according to the specified output format.
///
/// CSV and table output use the feature attributes of a query response or the
/// entries of a service listing; other payloads fall back to key/value rows.
pub fn format_output(data: &Value, format: OutputFormat, pretty: bool) -> Result<String> {
    match format {
        OutputFormat::Json => {
            if pretty {
                serde_json::to_string_pretty(data).context("Failed to format JSON output")
            } else {
                serde_json::to_string(data).context("Failed to format JSON output")
            }
        }
        OutputFormat::Csv => match tabular_rows(data) {
            Some(rows) => Ok(rows_to_csv(&rows)),
            None => Ok(json_to_csv(data)),
        },
        OutputFormat::Table => match tabular_rows(data) {
            Some(rows) => Ok(format_as_table(&rows)),
            None => serde_json::to_string_pretty(data).context("Failed to format JSON output"),
        },
    }
}

/// Records inside a response, when it has any
pub fn tabular_rows(data: &Value) -> Option<Vec<&Value>> {
    if let Some(features) = data.get("features").and_then(|f| f.as_array()) {
        return Some(features.iter().filter_map(|f| f.get("attributes")).collect());
    }
    if let Some(services) = data.get("services").and_then(|s| s.as_array()) {
        return Some(services.iter().collect());
    }
    data.as_array().map(|rows| rows.iter().collect())
}

/// Sorted union of the keys of the first records
fn columns(rows: &[&Value]) -> Vec<String> {
    let mut columns = BTreeSet::new();
    for record in rows.iter().take(10) {
        if let Some(obj) = record.as_object() {
            columns.extend(obj.keys().cloned());
        }
    }
    columns.into_iter().collect()
}

fn rows_to_csv(rows: &[&Value]) -> String {
    if rows.is_empty() {
        return "No data\n".to_string();
    }

    let headers = columns(rows);
    let mut csv = headers.iter().map(|h| csv_escape(h)).collect::<Vec<_>>().join(",");
    csv.push('\n');

    for record in rows {
        let row: Vec<String> = headers
            .iter()
            .map(|h| csv_escape(&json_value_to_string(record.get(h).unwrap_or(&Value::Null))))
            .collect();
        csv.push_str(&row.join(","));
        csv.push('\n');
    }
    csv
}

fn json_to_csv(data: &Value) -> String {
    match data {
        Value::Object(obj) => {
            let mut csv = String::from("key,value\n");
            for (key, value) in obj {
                csv.push_str(&format!("{},{}\n", csv_escape(key), csv_escape(&json_value_to_string(value))));
            }
            csv
        }
        _ => format!("value\n{}\n", csv_escape(&json_value_to_string(data))),
    }
}

pub fn format_as_table(rows: &[&Value]) -> String {
    if rows.is_empty() {
        return "No records found.\n".to_string();
    }

    let headers = columns(rows);
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|record| {
            headers
                .iter()
                .map(|col| match record.get(col) {
                    Some(Value::Array(_)) | Some(Value::Object(_)) => "...".to_string(),
                    Some(value) => json_value_to_string(value),
                    None => String::new(),
                })
                .collect()
        })
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| cells.iter().map(|row| row[i].chars().count()).chain([h.chars().count()]).max().unwrap_or(0))
        .collect();

    let render = |values: &[String]| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut output = String::new();
    output.push_str(&render(&headers));
    output.push('\n');
    output.push_str(&"-".repeat(widths.iter().sum::<usize>() + 3 * widths.len().saturating_sub(1)));
    output.push('\n');
    for row in &cells {
        output.push_str(&render(row));
        output.push('\n');
    }
    output.push_str(&format!("\nTotal records: {}\n", rows.len()));
    output
}

fn json_value_to_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query_response() -> Value {
        json!({
            "features": [
                {"attributes": {"OBJECTID": 1, "NAME": "Harbour, North"}},
                {"attributes": {"OBJECTID": 2, "NAME": "Old \"Mill\""}}
            ]
        })
    }

    #[test]
    fn test_csv_from_features() {
        let csv = format_output(&query_response(), OutputFormat::Csv, false).unwrap();
        assert_eq!(csv, "NAME,OBJECTID\n\"Harbour, North\",1\n\"Old \"\"Mill\"\"\",2\n");
    }

    #[test]
    fn test_csv_for_plain_object() {
        let csv = format_output(&json!({"server_url": "https://gis"}), OutputFormat::Csv, false).unwrap();
        assert_eq!(csv, "key,value\nserver_url,https://gis\n");
    }

    #[test]
    fn test_table_from_services() {
        let listing = json!({"services": [
            {"name": "Parcels", "type": "MapServer", "folder": "", "category": "custom"},
            {"name": "TouristAttractions", "type": "FeatureServer", "folder": "Hosted", "category": "hosted"}
        ]});
        let table = format_output(&listing, OutputFormat::Table, false).unwrap();
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[0].starts_with("category | folder | name"));
        assert!(lines[3].contains("TouristAttractions"));
        assert!(table.ends_with("Total records: 2\n"));
    }

    #[test]
    fn test_table_without_records() {
        let table = format_output(&json!({"features": []}), OutputFormat::Table, false).unwrap();
        assert_eq!(table, "No records found.\n");
    }

    #[test]
    fn test_json_compact() {
        let out = format_output(&json!({"count": 3}), OutputFormat::Json, false).unwrap();
        assert_eq!(out, "{\"count\":3}");
    }
}
