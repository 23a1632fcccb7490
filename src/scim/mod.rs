//! SCIM Filter to Directory Search
//!
//! Translates SCIM filter expressions (RFC 7644 Section 3.4.2.2) into RFC 4515
//! LDAP filters and wraps them in bounded, paged directory search requests.
//!
//! ## Module Structure
//!
//! - [`token`]: filter tokenizer
//! - [`filter`]: recursive-descent parser, AST and error sink
//! - [`mapping`]: per-entity attribute mapping tables
//! - [`filter_to_ldap`]: AST → LDAP filter visitors and their registry
//! - [`translate`]: [`FilterService`], the tokenize → parse → visit facade
//! - [`search`]: paging normalization and the directory search boundary
//! - [`layout`]: search base DNs under the organization
//! - [`types`]: list parameters and the ListResponse envelope
//! - [`error`]: [`ScimError`] and its classification

pub mod error;
pub mod filter;
pub mod filter_to_ldap;
pub mod layout;
pub mod mapping;
pub mod search;
pub mod token;
pub mod translate;
pub mod types;

pub use error::*;
pub use filter::{
    AttrPath, CompareOp, ErrorSink, FailFast, Filter, FilterOptions, FilterSyntaxError,
    FilterValue, LogicalOp, parse_filter, parse_filter_with_options, parse_into, parse_tokens,
};
pub use filter_to_ldap::{
    FilterVisitor, LdapFilterVisitor, TranslateError, TranslatedFilter, UnsupportedComparison,
    VisitorRegistry, escape_filter_value,
};
pub use layout::DirectoryLayout;
pub use mapping::{
    AttrMapping, AttrSyntax, AttributeMappingError, AttributeMappingTable, EntityType,
    MappingRegistry,
};
pub use search::{
    DirectorySearch, PagingOptions, SearchRequest, SearchRequestBuilder, SortOrder,
    VirtualListViewResponse,
};
pub use token::{Token, TokenKind, tokenize};
pub use translate::FilterService;
pub use types::*;
