//! SCIM Error Types
//!
//! [`ScimError`] is the single error type returned by filter translation and
//! search. Each variant wraps the component error unchanged so the caller
//! keeps its position, attribute and entity context.
//!
//! Transport layers map errors with [`ScimError::is_client_error`] and
//! [`ScimError::scim_type`], or render a [`ScimErrorResponse`] body
//! (RFC 7644 Section 3.12) directly.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{
    filter::FilterSyntaxError,
    filter_to_ldap::{TranslateError, UnsupportedComparison},
    mapping::{AttributeMappingError, EntityType},
    types::SCHEMA_ERROR,
};

/// Failure reported by the directory search collaborator.
///
/// Forwarded to callers unchanged.
#[derive(Debug, thiserror::Error)]
#[error("Directory search failed: {message}")]
pub struct DirectorySearchError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DirectorySearchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScimError {
    #[error("Invalid filter: {0}")]
    Syntax(#[from] FilterSyntaxError),

    #[error(transparent)]
    AttributeMapping(#[from] AttributeMappingError),

    #[error(transparent)]
    UnsupportedComparison(#[from] UnsupportedComparison),

    #[error("No filter translation registered for entity type '{0}'")]
    UnregisteredEntity(EntityType),

    #[error(transparent)]
    DirectorySearch(#[from] DirectorySearchError),
}

impl From<TranslateError> for ScimError {
    fn from(err: TranslateError) -> Self {
        match err {
            TranslateError::AttributeMapping(e) => ScimError::AttributeMapping(e),
            TranslateError::UnsupportedComparison(e) => ScimError::UnsupportedComparison(e),
        }
    }
}

/// Discriminant of a [`ScimError`], for logging and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScimErrorKind {
    Syntax,
    AttributeMapping,
    UnsupportedComparison,
    UnregisteredEntity,
    DirectorySearch,
}

impl ScimErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScimErrorKind::Syntax => "syntax",
            ScimErrorKind::AttributeMapping => "attribute_mapping",
            ScimErrorKind::UnsupportedComparison => "unsupported_comparison",
            ScimErrorKind::UnregisteredEntity => "unregistered_entity",
            ScimErrorKind::DirectorySearch => "directory_search",
        }
    }
}

impl fmt::Display for ScimErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ScimError {
    pub fn kind(&self) -> ScimErrorKind {
        match self {
            ScimError::Syntax(_) => ScimErrorKind::Syntax,
            ScimError::AttributeMapping(_) => ScimErrorKind::AttributeMapping,
            ScimError::UnsupportedComparison(_) => ScimErrorKind::UnsupportedComparison,
            ScimError::UnregisteredEntity(_) => ScimErrorKind::UnregisteredEntity,
            ScimError::DirectorySearch(_) => ScimErrorKind::DirectorySearch,
        }
    }

    /// Whether the request itself was at fault (a 400 over HTTP).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ScimErrorKind::Syntax
                | ScimErrorKind::AttributeMapping
                | ScimErrorKind::UnsupportedComparison
        )
    }

    /// SCIM `scimType` for client errors.
    pub fn scim_type(&self) -> Option<ScimErrorType> {
        match self.kind() {
            ScimErrorKind::Syntax | ScimErrorKind::AttributeMapping => {
                Some(ScimErrorType::InvalidFilter)
            }
            ScimErrorKind::UnsupportedComparison => Some(ScimErrorType::InvalidValue),
            ScimErrorKind::UnregisteredEntity | ScimErrorKind::DirectorySearch => None,
        }
    }
}

/// SCIM error response per RFC 7644.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimErrorResponse {
    /// SCIM schema URIs (always contains the Error schema)
    pub schemas: Vec<String>,

    /// HTTP status code as a string (e.g., "400", "500")
    pub status: String,

    /// SCIM-specific error type (optional, per RFC 7644)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scim_type: Option<ScimErrorType>,

    /// Human-readable error detail
    pub detail: String,
}

impl From<&ScimError> for ScimErrorResponse {
    fn from(err: &ScimError) -> Self {
        let status = if err.is_client_error() { "400" } else { "500" };
        Self {
            schemas: vec![SCHEMA_ERROR.to_string()],
            status: status.to_string(),
            scim_type: err.scim_type(),
            detail: err.to_string(),
        }
    }
}

/// SCIM error types per RFC 7644 Section 3.12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScimErrorType {
    /// Filter syntax is invalid or names an unsupported attribute
    InvalidFilter,

    /// Comparison value is invalid for the attribute's type
    InvalidValue,
}

impl fmt::Display for ScimErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScimErrorType::InvalidFilter => write!(f, "invalidFilter"),
            ScimErrorType::InvalidValue => write!(f, "invalidValue"),
        }
    }
}

/// Result type for SCIM operations
pub type ScimResult<T> = Result<T, ScimError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scim::filter::{CompareOp, parse_filter};

    fn syntax_error() -> ScimError {
        parse_filter("userName eq").unwrap_err().into()
    }

    #[test]
    fn test_client_errors() {
        let syntax = syntax_error();
        assert_eq!(syntax.kind(), ScimErrorKind::Syntax);
        assert!(syntax.is_client_error());
        assert_eq!(syntax.scim_type(), Some(ScimErrorType::InvalidFilter));

        let mapping = ScimError::from(AttributeMappingError {
            attribute: "bogus".to_string(),
            entity_type: EntityType::User,
        });
        assert!(mapping.is_client_error());
        assert_eq!(mapping.scim_type(), Some(ScimErrorType::InvalidFilter));

        let unsupported = ScimError::from(TranslateError::from(UnsupportedComparison {
            attribute: "active".to_string(),
            op: CompareOp::Co,
            value: "\"x\"".to_string(),
            reason: "attribute expects a boolean",
        }));
        assert_eq!(unsupported.kind(), ScimErrorKind::UnsupportedComparison);
        assert_eq!(unsupported.scim_type(), Some(ScimErrorType::InvalidValue));
    }

    #[test]
    fn test_server_errors() {
        let unregistered = ScimError::UnregisteredEntity(EntityType::FidoDevice);
        assert!(!unregistered.is_client_error());
        assert_eq!(unregistered.scim_type(), None);
        assert_eq!(
            unregistered.to_string(),
            "No filter translation registered for entity type 'fido-device'"
        );

        let search = ScimError::from(DirectorySearchError::new("connection reset"));
        assert_eq!(search.kind(), ScimErrorKind::DirectorySearch);
        assert!(!search.is_client_error());
    }

    #[test]
    fn test_directory_search_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = ScimError::from(DirectorySearchError::with_source("search failed", io));
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "timed out");
    }

    #[test]
    fn test_syntax_error_message_keeps_position() {
        let err = syntax_error();
        assert!(err.to_string().contains("at position 11"));
    }

    #[test]
    fn test_error_response_body() {
        let response = ScimErrorResponse::from(&syntax_error());
        assert_eq!(response.status, "400");

        let json = serde_json::to_string_pretty(&response).unwrap();
        assert!(json.contains("\"scimType\": \"invalidFilter\""));
        assert!(json.contains(SCHEMA_ERROR));

        let response = ScimErrorResponse::from(&ScimError::UnregisteredEntity(EntityType::Group));
        assert_eq!(response.status, "500");
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("scimType"));
    }

    #[test]
    fn test_scim_error_type_display() {
        assert_eq!(format!("{}", ScimErrorType::InvalidFilter), "invalidFilter");
        assert_eq!(format!("{}", ScimErrorType::InvalidValue), "invalidValue");
    }
}
