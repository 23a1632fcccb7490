use serde::{Deserialize, Serialize};

use crate::scim::{
    filter::{FilterOptions, MAX_FILTER_DEPTH, MAX_FILTER_LENGTH},
    search::{DEFAULT_COUNT, DEFAULT_SORT_BY, MAX_COUNT, PagingOptions},
};

/// Filter parsing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    /// Recognize only lowercase operator and connective keywords.
    #[serde(default)]
    pub keywords_case_sensitive: bool,

    /// Match attribute names against mapping tables case-sensitively.
    #[serde(default)]
    pub attributes_case_sensitive: bool,

    /// Maximum filter length in bytes.
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Maximum nesting depth of grouped and negated expressions.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            keywords_case_sensitive: false,
            attributes_case_sensitive: false,
            max_length: default_max_length(),
            max_depth: default_max_depth(),
        }
    }
}

impl FilterConfig {
    pub fn options(&self) -> FilterOptions {
        FilterOptions {
            keywords_case_sensitive: self.keywords_case_sensitive,
            max_length: self.max_length,
            max_depth: self.max_depth,
        }
    }
}

fn default_max_length() -> usize {
    MAX_FILTER_LENGTH
}

fn default_max_depth() -> usize {
    MAX_FILTER_DEPTH
}

/// Pagination and sorting defaults for list searches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct PagingConfig {
    /// Page size used when the client sends none or a non-positive one.
    #[serde(default = "default_count")]
    pub default_count: u64,

    /// Largest page size a client may request.
    #[serde(default = "default_max_count")]
    pub max_count: u64,

    /// Logical attribute to sort by when the client sends none.
    #[serde(default = "default_sort_by")]
    pub default_sort_by: String,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_count: default_count(),
            max_count: default_max_count(),
            default_sort_by: default_sort_by(),
        }
    }
}

impl PagingConfig {
    pub fn options(&self) -> PagingOptions {
        PagingOptions {
            default_count: self.default_count,
            max_count: self.max_count,
            default_sort_by: self.default_sort_by.clone(),
        }
    }
}

fn default_count() -> u64 {
    DEFAULT_COUNT
}

fn default_max_count() -> u64 {
    MAX_COUNT
}

fn default_sort_by() -> String {
    DEFAULT_SORT_BY.to_string()
}

/// Directory tree configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct LayoutConfig {
    /// Organization DN all search bases hang off.
    #[serde(default = "default_base_dn")]
    pub base_dn: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            base_dn: default_base_dn(),
        }
    }
}

fn default_base_dn() -> String {
    "o=gluu".to_string()
}
