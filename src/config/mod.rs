//! Configuration module for the SCIM directory search service.
//!
//! Configured via a TOML file, with support for environment variable
//! interpolation using `${VAR_NAME}` syntax. Every section is optional.
//!
//! # Example
//!
//! ```toml
//! [directory]
//! base_dn = "o=${ORG_NAME}"
//!
//! [filter]
//! attributes_case_sensitive = false
//!
//! [paging]
//! max_count = 500
//!
//! [mappings.user]
//! nickName = "nickname"
//!
//! [observability.logging]
//! level = "debug"
//! format = "json"
//! ```

mod mappings;
mod observability;
mod search;

use std::{path::Path, sync::LazyLock};

pub use mappings::*;
pub use observability::*;
use regex::Regex;
pub use search::*;
use serde::{Deserialize, Serialize};

use crate::scim::{
    layout::DirectoryLayout, mapping::MappingRegistry, search::SearchRequestBuilder,
    translate::FilterService,
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct DirectoryConfig {
    /// Directory tree layout.
    #[serde(default)]
    pub directory: LayoutConfig,

    /// Filter parsing limits and case sensitivity.
    #[serde(default)]
    pub filter: FilterConfig,

    /// Pagination and sorting defaults.
    #[serde(default)]
    pub paging: PagingConfig,

    /// Attribute mappings layered over the built-in tables.
    #[serde(default)]
    pub mappings: MappingsConfig,

    /// Observability configuration (logging).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl DirectoryConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: DirectoryConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.directory.base_dn.trim().is_empty() {
            return Err(ConfigError::Validation(
                "directory.base_dn must not be empty".into(),
            ));
        }
        if self.filter.max_length == 0 {
            return Err(ConfigError::Validation(
                "filter.max_length must be at least 1".into(),
            ));
        }
        if self.filter.max_depth == 0 {
            return Err(ConfigError::Validation(
                "filter.max_depth must be at least 1".into(),
            ));
        }
        if self.paging.default_count == 0 {
            return Err(ConfigError::Validation(
                "paging.default_count must be at least 1".into(),
            ));
        }
        if self.paging.max_count < self.paging.default_count {
            return Err(ConfigError::Validation(format!(
                "paging.max_count ({}) must not be less than paging.default_count ({})",
                self.paging.max_count, self.paging.default_count
            )));
        }
        if self.paging.default_sort_by.trim().is_empty() {
            return Err(ConfigError::Validation(
                "paging.default_sort_by must not be empty".into(),
            ));
        }
        self.mappings.validate()
    }

    /// Built-in mapping tables with the configured overrides applied.
    pub fn mapping_registry(&self) -> MappingRegistry {
        self.mappings
            .build_registry(self.filter.attributes_case_sensitive)
    }

    pub fn filter_service(&self) -> FilterService {
        FilterService::new(self.filter.options(), self.mapping_registry())
    }

    pub fn search_builder(&self) -> SearchRequestBuilder {
        SearchRequestBuilder::new(self.filter_service(), self.paging.options())
    }

    pub fn layout(&self) -> DirectoryLayout {
        DirectoryLayout::new(self.directory.base_dn.trim())
    }

    /// Generate the JSON schema for the configuration.
    #[cfg(feature = "json-schema")]
    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(DirectoryConfig)
    }

    /// Generate the JSON schema as a pretty-printed JSON string.
    #[cfg(feature = "json-schema")]
    pub fn json_schema_string() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::json_schema())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented lines (lines where content before the variable is a comment).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        // Find if there's a comment on this line
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in ENV_VAR_PATTERN.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            // Skip if this variable is inside a comment
            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
