//! Wire model for the catalogue paging protocol and the page merger.
//!
//! Requests and responses are JSON envelopes with a root discriminator
//! field (`request` / `response`). Records themselves stay opaque
//! `serde_json::Value` objects; nothing here interprets record content
//! beyond the organisation lookup used by the harvest statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Root discriminator of a request document.
pub const REQUEST_ROOT: &str = "GetRecords";
/// Root discriminator of a catalogue response.
pub const RESPONSE_ROOT: &str = "GetRecordsResponse";

/// Whether a request asks for the match count only or for record content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultType {
    Count,
    Results,
}

/// How much of each record the catalogue should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementSet {
    Summary,
    Full,
}

/// A `GetRecords` request document as stored in a unit file.
///
/// The query is opaque; the harvester only rewrites the paging
/// attributes, so a unit file can leave them at their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsRequest {
    pub request: String,
    #[serde(default = "default_result_type")]
    pub result_type: ResultType,
    #[serde(default = "default_start_position")]
    pub start_position: u64,
    #[serde(default = "default_max_records")]
    pub max_records: u32,
    #[serde(default = "default_element_set")]
    pub element_set: ElementSet,
    #[serde(default)]
    pub query: Value,
}

fn default_result_type() -> ResultType {
    ResultType::Results
}

fn default_start_position() -> u64 {
    1
}

fn default_max_records() -> u32 {
    10
}

fn default_element_set() -> ElementSet {
    ElementSet::Summary
}

impl RecordsRequest {
    /// Reject documents whose root discriminator is not `GetRecords`.
    pub fn ensure_root(&self) -> Result<(), RecordSetError> {
        if self.request == REQUEST_ROOT {
            Ok(())
        } else {
            Err(RecordSetError::UnexpectedRoot {
                expected: REQUEST_ROOT,
                actual: self.request.clone(),
            })
        }
    }

    /// Derive the count probe: same query, no record content.
    pub fn for_count_probe(&self) -> Self {
        let mut probe = self.clone();
        probe.result_type = ResultType::Count;
        probe
    }

    /// Derive the request for one page. The element set is forced to
    /// `full` so every page carries complete records regardless of what
    /// the unit file asked for.
    pub fn for_page(&self, start_position: u64, max_records: u32) -> Self {
        let mut page = self.clone();
        page.result_type = ResultType::Results;
        page.element_set = ElementSet::Full;
        page.start_position = start_position;
        page.max_records = max_records;
        page
    }
}

/// A `GetRecordsResponse` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsResponse {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_results: Option<SearchResults>,
}

/// The `searchResults` container of a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub number_of_records_matched: u64,
    pub number_of_records_returned: u64,
    pub next_record: u64,
    #[serde(default)]
    pub records: Vec<Value>,
}

impl RecordsResponse {
    /// Reject documents whose root discriminator is not
    /// `GetRecordsResponse`.
    pub fn ensure_root(&self) -> Result<(), RecordSetError> {
        if self.response == RESPONSE_ROOT {
            Ok(())
        } else {
            Err(RecordSetError::UnexpectedRoot {
                expected: RESPONSE_ROOT,
                actual: self.response.clone(),
            })
        }
    }

    /// Total match count, requiring the `searchResults` container.
    pub fn matched(&self) -> Result<u64, RecordSetError> {
        self.search_results
            .as_ref()
            .map(|results| results.number_of_records_matched)
            .ok_or(RecordSetError::MissingSearchResults)
    }
}

#[derive(Debug, Error)]
pub enum RecordSetError {
    #[error("unexpected root element '{actual}', expected '{expected}'")]
    UnexpectedRoot {
        expected: &'static str,
        actual: String,
    },

    #[error("response is missing the searchResults container")]
    MissingSearchResults,

    #[error("no pages to merge")]
    NoPages,
}

/// Merge fetched pages into one record set.
///
/// A single page is returned unchanged. Otherwise the first page becomes
/// the base: both aggregate counts are rewritten to `total_matched` (the
/// externally probed total is authoritative, never recomputed),
/// `nextRecord` becomes 0, and the records of the remaining pages are
/// appended in page order. A first page without a `searchResults`
/// container fails fast; later pages without one contribute nothing but
/// do not abort the merge.
pub fn merge_pages(
    pages: Vec<RecordsResponse>,
    total_matched: u64,
) -> Result<RecordsResponse, RecordSetError> {
    let mut pages = pages.into_iter();
    let Some(mut base) = pages.next() else {
        return Err(RecordSetError::NoPages);
    };
    if pages.len() == 0 {
        return Ok(base);
    }

    let results = base
        .search_results
        .as_mut()
        .ok_or(RecordSetError::MissingSearchResults)?;
    for (offset, page) in pages.enumerate() {
        match page.search_results {
            Some(more) => results.records.extend(more.records),
            None => warn!(page = offset + 2, "page without searchResults; nothing to append"),
        }
    }

    results.number_of_records_matched = total_matched;
    results.number_of_records_returned = total_matched;
    results.next_record = 0;
    if results.records.len() as u64 != total_matched {
        warn!(
            collected = results.records.len(),
            matched = total_matched,
            "merged record count differs from the probed total"
        );
    }
    Ok(base)
}

/// Group records by the organisation that published them. Records
/// without an organisation are counted under a placeholder bucket.
pub fn summarize_by_organisation(records: &[Value]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for record in records {
        let organisation = record
            .pointer("/contact/organisationName")
            .and_then(Value::as_str)
            .unwrap_or("(unknown)");
        *counts.entry(organisation.to_string()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(returned: u64, next: u64, records: Vec<Value>) -> RecordsResponse {
        RecordsResponse {
            response: RESPONSE_ROOT.to_string(),
            search_results: Some(SearchResults {
                number_of_records_matched: 250,
                number_of_records_returned: returned,
                next_record: next,
                records,
            }),
        }
    }

    #[test]
    fn test_single_page_is_returned_unchanged() {
        let only = page(42, 0, vec![json!({"id": "a"})]);
        let merged = merge_pages(vec![only.clone()], 42).unwrap();
        let results = merged.search_results.unwrap();
        // identity: the original aggregate values survive
        assert_eq!(results.number_of_records_returned, 42);
        assert_eq!(results.records.len(), 1);
    }

    #[test]
    fn test_merge_rewrites_aggregates_and_appends_in_order() {
        let pages = vec![
            page(100, 101, vec![json!({"id": 1}), json!({"id": 2})]),
            page(100, 201, vec![json!({"id": 3})]),
            page(50, 0, vec![json!({"id": 4})]),
        ];
        let merged = merge_pages(pages, 4).unwrap();
        let results = merged.search_results.unwrap();
        assert_eq!(results.number_of_records_matched, 4);
        assert_eq!(results.number_of_records_returned, 4);
        assert_eq!(results.next_record, 0);
        let ids: Vec<i64> = results
            .records
            .iter()
            .map(|record| record["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_external_total_is_authoritative() {
        let pages = vec![page(1, 2, vec![json!({})]), page(1, 0, vec![json!({})])];
        // deliberately not the sum of page contents
        let merged = merge_pages(pages, 250).unwrap();
        let results = merged.search_results.unwrap();
        assert_eq!(results.number_of_records_matched, 250);
        assert_eq!(results.number_of_records_returned, 250);
        assert_eq!(results.records.len(), 2);
    }

    #[test]
    fn test_first_page_without_container_fails() {
        let bare = RecordsResponse {
            response: RESPONSE_ROOT.to_string(),
            search_results: None,
        };
        let result = merge_pages(vec![bare, page(1, 0, vec![])], 1);
        assert!(matches!(result, Err(RecordSetError::MissingSearchResults)));
    }

    #[test]
    fn test_later_page_without_container_is_tolerated() {
        let bare = RecordsResponse {
            response: RESPONSE_ROOT.to_string(),
            search_results: None,
        };
        let merged = merge_pages(vec![page(1, 2, vec![json!({})]), bare], 1).unwrap();
        assert_eq!(merged.search_results.unwrap().records.len(), 1);
    }

    #[test]
    fn test_empty_page_list_is_rejected() {
        assert!(matches!(merge_pages(vec![], 0), Err(RecordSetError::NoPages)));
    }

    #[test]
    fn test_root_checks_name_expected_and_actual() {
        let response = RecordsResponse {
            response: "GetRecords".to_string(),
            search_results: None,
        };
        let error = response.ensure_root().unwrap_err();
        let message = error.to_string();
        assert!(message.contains("GetRecords"));
        assert!(message.contains("GetRecordsResponse"));
    }

    #[test]
    fn test_page_request_forces_full_element_set() {
        let request: RecordsRequest =
            serde_json::from_value(json!({"request": "GetRecords", "query": {"type": "dataset"}}))
                .unwrap();
        let probe = request.for_count_probe();
        assert_eq!(probe.result_type, ResultType::Count);

        let page = request.for_page(101, 100);
        assert_eq!(page.result_type, ResultType::Results);
        assert_eq!(page.element_set, ElementSet::Full);
        assert_eq!(page.start_position, 101);
        assert_eq!(page.max_records, 100);
        // the opaque query travels with every derived request
        assert_eq!(page.query, json!({"type": "dataset"}));
    }

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let document = serde_json::to_value(page(1, 0, vec![])).unwrap();
        let results = &document["searchResults"];
        assert!(results.get("numberOfRecordsMatched").is_some());
        assert!(results.get("numberOfRecordsReturned").is_some());
        assert!(results.get("nextRecord").is_some());
    }

    #[test]
    fn test_organisation_summary_groups_and_sorts() {
        let records = vec![
            json!({"contact": {"organisationName": "Agency B"}}),
            json!({"contact": {"organisationName": "Agency A"}}),
            json!({"contact": {"organisationName": "Agency B"}}),
            json!({"title": "no contact"}),
        ];
        let summary = summarize_by_organisation(&records);
        let entries: Vec<(&str, u64)> = summary
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        assert_eq!(
            entries,
            vec![("(unknown)", 1), ("Agency A", 1), ("Agency B", 2)]
        );
    }
}
