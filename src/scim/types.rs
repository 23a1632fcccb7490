//! SCIM Protocol Types
//!
//! Wire types shared by the search surface: the list query parameters a
//! client sends and the ListResponse envelope it receives (RFC 7644).

use serde::{Deserialize, Serialize};

// =============================================================================
// Schema URIs
// =============================================================================

/// SCIM ListResponse schema URI
pub const SCHEMA_LIST_RESPONSE: &str = "urn:ietf:params:scim:api:messages:2.0:ListResponse";

/// SCIM Error schema URI
pub const SCHEMA_ERROR: &str = "urn:ietf:params:scim:api:messages:2.0:Error";

// =============================================================================
// Protocol Types (RFC 7644)
// =============================================================================

/// One page of search results, serialized as a SCIM ListResponse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultPage<T> {
    /// SCIM schema URIs
    pub schemas: Vec<String>,

    /// Total number of entries matching the filter
    pub total_results: u64,

    /// Number of entries in this page
    pub items_per_page: u64,

    /// 1-based index of the first entry in this page
    pub start_index: u64,

    #[serde(rename = "Resources")]
    pub entries: Vec<T>,
}

impl<T> SearchResultPage<T> {
    pub fn new(entries: Vec<T>, total_results: u64, start_index: u64) -> Self {
        let items_per_page = entries.len() as u64;
        Self {
            schemas: vec![SCHEMA_LIST_RESPONSE.to_string()],
            total_results,
            items_per_page,
            start_index,
            entries,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), 0, 1)
    }

    /// Convert every entry, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> SearchResultPage<U> {
        SearchResultPage {
            schemas: self.schemas,
            total_results: self.total_results,
            items_per_page: self.items_per_page,
            start_index: self.start_index,
            entries: self.entries.into_iter().map(f).collect(),
        }
    }
}

/// Query parameters for list operations, exactly as received.
///
/// Numbers are signed so out-of-range input (`startIndex=-5`) reaches
/// normalization instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// SCIM filter expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// 1-based start index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<i64>,

    /// Number of results per page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,

    /// Attribute to sort by
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,

    /// Sort order ("ascending" or "descending")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<String>,

    /// Comma-separated directory attributes to return
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<String>,
}

impl SearchParams {
    /// `attributes` split on commas, blanks dropped.
    pub fn return_attributes(&self) -> Vec<String> {
        self.attributes
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
