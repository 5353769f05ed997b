//! Aggregate CSV report over persisted validation results.
//!
//! Scans the results directory for JSON result documents and writes one
//! row per document. A structurally odd document never aborts the
//! report: missing counts fall back to the `-1` sentinel and broken
//! lookups to `"error"`, each with a warning, so a single bad result
//! still leaves a complete report behind.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::fs;
use tracing::{info, warn};

use crate::domain::services::ValidationError;

const REPORT_FILE: &str = "report.csv";
const REPORT_HEADER: &str = "Name, Number of resources, Completeness Indicator, Validation Report URL";

/// Sentinel resource count for documents the count cannot be read from.
const UNKNOWN_RESOURCE_COUNT: i64 = -1;

struct ResultRow {
    name: String,
    resources: i64,
    completeness: String,
    report_url: String,
}

impl ResultRow {
    fn to_csv(&self) -> String {
        format!(
            "{}, {}, {}, {}",
            csv_field(&self.name),
            self.resources,
            csv_field(&self.completeness),
            csv_field(&self.report_url)
        )
    }
}

/// Build `report.csv` from the JSON results in `results_dir` and return
/// its path. Rows are ordered by file name.
pub async fn build_report(results_dir: &Path) -> Result<PathBuf, ValidationError> {
    let mut entries = fs::read_dir(results_dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort();

    let mut content = String::from(REPORT_HEADER);
    content.push('\n');
    for file in &files {
        content.push_str(&summarize_file(file).await.to_csv());
        content.push('\n');
    }

    let report_path = results_dir.join(REPORT_FILE);
    fs::write(&report_path, content).await?;
    info!(rows = files.len(), path = %report_path.display(), "aggregate report written");
    Ok(report_path)
}

async fn summarize_file(path: &Path) -> ResultRow {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("(unnamed)")
        .to_string();

    let document: Value = match fs::read_to_string(path).await {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(document) => document,
            Err(error) => {
                warn!(file = %name, %error, "result document is not valid JSON");
                return ResultRow {
                    name,
                    resources: UNKNOWN_RESOURCE_COUNT,
                    completeness: "error".to_string(),
                    report_url: "error".to_string(),
                };
            }
        },
        Err(error) => {
            warn!(file = %name, %error, "result document could not be read");
            return ResultRow {
                name,
                resources: UNKNOWN_RESOURCE_COUNT,
                completeness: "error".to_string(),
                report_url: "error".to_string(),
            };
        }
    };

    ResultRow {
        resources: resource_count(&document, &name),
        completeness: text_field(&document, "/summary/completenessIndicator", &name),
        report_url: text_field(&document, "/summary/reportUrl", &name),
        name,
    }
}

/// Resource count with the single-resource fallback: a summary that
/// carries one resource object instead of a count still counts as 1.
fn resource_count(document: &Value, name: &str) -> i64 {
    if let Some(count) = document
        .pointer("/summary/resourceCount")
        .and_then(Value::as_i64)
    {
        return count;
    }
    if document
        .pointer("/summary/resource")
        .is_some_and(Value::is_object)
    {
        return 1;
    }
    warn!(file = %name, "resource count not present; using sentinel");
    UNKNOWN_RESOURCE_COUNT
}

fn text_field(document: &Value, pointer: &str, name: &str) -> String {
    match document.pointer(pointer) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        _ => {
            warn!(file = %name, pointer, "field missing or malformed");
            "error".to_string()
        }
    }
}

fn csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_result(dir: &Path, name: &str, document: &Value) {
        std::fs::write(dir.join(name), serde_json::to_vec(document).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_report_rows_are_sorted_by_file_name() {
        let dir = TempDir::new().unwrap();
        write_result(
            dir.path(),
            "b.json",
            &json!({"summary": {"resourceCount": 2, "completenessIndicator": 80, "reportUrl": "http://v/2"}}),
        );
        write_result(
            dir.path(),
            "a.json",
            &json!({"summary": {"resourceCount": 5, "completenessIndicator": "100", "reportUrl": "http://v/1"}}),
        );
        std::fs::write(dir.path().join("ignored.html"), "<html/>").unwrap();

        let path = build_report(dir.path()).await.unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Name, Number of resources, Completeness Indicator, Validation Report URL"
        );
        assert_eq!(lines[1], "a.json, 5, 100, http://v/1");
        assert_eq!(lines[2], "b.json, 2, 80, http://v/2");
    }

    #[tokio::test]
    async fn test_single_resource_object_counts_as_one() {
        let dir = TempDir::new().unwrap();
        write_result(
            dir.path(),
            "single.json",
            &json!({"summary": {"resource": {"title": "t"}, "completenessIndicator": 50, "reportUrl": "http://v/s"}}),
        );

        let path = build_report(dir.path()).await.unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("single.json, 1, 50, http://v/s"));
    }

    #[tokio::test]
    async fn test_anomalies_get_sentinels_not_failures() {
        let dir = TempDir::new().unwrap();
        write_result(dir.path(), "odd.json", &json!({"summary": {}}));
        std::fs::write(dir.path().join("broken.json"), b"not json").unwrap();

        let path = build_report(dir.path()).await.unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("odd.json, -1, error, error"));
        assert!(content.contains("broken.json, -1, error, error"));
    }

    #[tokio::test]
    async fn test_fields_with_commas_are_quoted() {
        let dir = TempDir::new().unwrap();
        write_result(
            dir.path(),
            "quoted.json",
            &json!({"summary": {"resourceCount": 1, "completenessIndicator": "90, provisional", "reportUrl": "http://v/q"}}),
        );

        let path = build_report(dir.path()).await.unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("quoted.json, 1, \"90, provisional\", http://v/q"));
    }

    #[tokio::test]
    async fn test_empty_results_dir_yields_header_only() {
        let dir = TempDir::new().unwrap();
        let path = build_report(dir.path()).await.unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
