//! Paged directory search
//!
//! [`SearchRequestBuilder`] turns raw list parameters into a bounded, sorted
//! [`SearchRequest`] and hands it to a [`DirectorySearch`] collaborator.
//!
//! ## Normalization
//!
//! - absent or blank filter: the entity's match-all filter
//! - `count < 1`: the default page size; `count > max`: the maximum
//! - `startIndex < 1`: 1
//! - absent or blank `sortBy`: `displayName`, remapped through the user
//!   mapping table when searching users
//! - `sortOrder` other than `ascending`/`descending`: ascending

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    error::{DirectorySearchError, ScimError, ScimResult},
    filter_to_ldap::TranslatedFilter,
    mapping::EntityType,
    translate::FilterService,
    types::{SearchParams, SearchResultPage},
};

/// Page size when the client sends none or a non-positive one.
pub const DEFAULT_COUNT: u64 = 100;

/// Upper bound on page size.
pub const MAX_COUNT: u64 = 200;

/// Sort attribute when the client sends none.
pub const DEFAULT_SORT_BY: &str = "displayName";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// Parse a client-supplied `sortOrder`, treating anything unrecognized as
    /// ascending.
    pub fn from_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("descending") => SortOrder::Descending,
            _ => SortOrder::Ascending,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Ascending => write!(f, "ascending"),
            SortOrder::Descending => write!(f, "descending"),
        }
    }
}

/// Paging defaults and bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagingOptions {
    pub default_count: u64,
    pub max_count: u64,
    pub default_sort_by: String,
}

impl Default for PagingOptions {
    fn default() -> Self {
        Self {
            default_count: DEFAULT_COUNT,
            max_count: MAX_COUNT,
            default_sort_by: DEFAULT_SORT_BY.to_string(),
        }
    }
}

/// A normalized search, ready for the directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub base_dn: String,
    pub entity_type: EntityType,
    pub filter: TranslatedFilter,
    /// 1-based, always ≥ 1
    pub start_index: u64,
    /// Always within `[1, max_count]`
    pub count: u64,
    /// Directory attribute to sort on
    pub sort_by: String,
    pub sort_order: SortOrder,
    pub return_attributes: Vec<String>,
}

/// Virtual-list-view result from the directory.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualListViewResponse<T> {
    pub entries: Vec<T>,
    /// Total entries matching the filter, across all pages
    pub total_results: u64,
}

/// Executes searches against the backing directory.
#[async_trait]
pub trait DirectorySearch<T>: Send + Sync {
    async fn find_entries(
        &self,
        request: &SearchRequest,
    ) -> Result<VirtualListViewResponse<T>, DirectorySearchError>;
}

#[derive(Debug, Clone)]
pub struct SearchRequestBuilder {
    filters: FilterService,
    paging: PagingOptions,
}

impl SearchRequestBuilder {
    pub fn new(filters: FilterService, paging: PagingOptions) -> Self {
        Self { filters, paging }
    }

    pub fn filters(&self) -> &FilterService {
        &self.filters
    }

    pub fn paging(&self) -> &PagingOptions {
        &self.paging
    }

    /// Build a request, taking the return attributes from `params.attributes`.
    pub fn build_from_params(
        &self,
        base_dn: &str,
        entity: EntityType,
        params: &SearchParams,
    ) -> ScimResult<SearchRequest> {
        self.build_request(base_dn, entity, params, &params.return_attributes())
    }

    /// Normalize `params` and translate its filter for `entity`.
    pub fn build_request(
        &self,
        base_dn: &str,
        entity: EntityType,
        params: &SearchParams,
        return_attributes: &[String],
    ) -> ScimResult<SearchRequest> {
        info!(
            entity = %entity,
            filter = ?params.filter,
            start_index = ?params.start_index,
            count = ?params.count,
            sort_by = ?params.sort_by,
            sort_order = ?params.sort_order,
            "Search request parameters"
        );

        let filter = self.filters.translate(params.filter.as_deref(), entity)?;
        let count = self.normalize_count(params.count);
        let start_index = normalize_start_index(params.start_index);
        let sort_by = self.resolve_sort_by(entity, params.sort_by.as_deref())?;
        let sort_order = SortOrder::from_value(params.sort_order.as_deref());

        info!(
            entity = %entity,
            filter = %filter,
            start_index,
            count,
            sort_by = %sort_by,
            sort_order = %sort_order,
            "Normalized search request"
        );

        Ok(SearchRequest {
            base_dn: base_dn.to_string(),
            entity_type: entity,
            filter,
            start_index,
            count,
            sort_by,
            sort_order,
            return_attributes: return_attributes.to_vec(),
        })
    }

    /// Run `request` and wrap the directory's answer as a result page.
    ///
    /// Directory failures are forwarded unchanged; nothing is retried.
    pub async fn search<T, D>(
        &self,
        directory: &D,
        request: &SearchRequest,
    ) -> ScimResult<SearchResultPage<T>>
    where
        D: DirectorySearch<T> + ?Sized,
    {
        let response = directory
            .find_entries(request)
            .await
            .map_err(ScimError::DirectorySearch)?;

        let page = SearchResultPage::new(
            response.entries,
            response.total_results,
            request.start_index,
        );

        info!(
            entity = %request.entity_type,
            total_results = page.total_results,
            items_per_page = page.items_per_page,
            start_index = page.start_index,
            "Search results"
        );

        Ok(page)
    }

    /// `build_from_params` followed by `search`.
    pub async fn list<T, D>(
        &self,
        directory: &D,
        base_dn: &str,
        entity: EntityType,
        params: &SearchParams,
    ) -> ScimResult<SearchResultPage<T>>
    where
        D: DirectorySearch<T> + ?Sized,
    {
        let request = self.build_from_params(base_dn, entity, params)?;
        self.search(directory, &request).await
    }

    fn normalize_count(&self, count: Option<i64>) -> u64 {
        match count {
            Some(c) if c >= 1 => (c as u64).min(self.paging.max_count),
            _ => self.paging.default_count.min(self.paging.max_count),
        }
    }

    // Only user sort attributes are remapped; group and device searches sort
    // on the name as given.
    fn resolve_sort_by(&self, entity: EntityType, sort_by: Option<&str>) -> ScimResult<String> {
        let logical = sort_by
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.paging.default_sort_by);

        if entity != EntityType::User {
            return Ok(logical.to_string());
        }

        let table = self
            .filters
            .mappings()
            .get(EntityType::User)
            .ok_or(ScimError::UnregisteredEntity(EntityType::User))?;
        Ok(table.resolve_name(logical)?.attribute.clone())
    }
}

impl Default for SearchRequestBuilder {
    fn default() -> Self {
        Self::new(FilterService::default(), PagingOptions::default())
    }
}

fn normalize_start_index(start_index: Option<i64>) -> u64 {
    match start_index {
        Some(s) if s >= 1 => s as u64,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rstest::rstest;

    use super::*;
    use crate::scim::error::ScimErrorKind;

    const BASE_DN: &str = "ou=people,o=gluu";

    fn params() -> SearchParams {
        SearchParams::default()
    }

    fn build(entity: EntityType, params: &SearchParams) -> SearchRequest {
        SearchRequestBuilder::default()
            .build_request(BASE_DN, entity, params, &[])
            .unwrap()
    }

    /// Records every request and answers with a fixed page.
    struct RecordingDirectory {
        requests: Mutex<Vec<SearchRequest>>,
        entries: Vec<String>,
        total_results: u64,
    }

    impl RecordingDirectory {
        fn new(entries: &[&str], total_results: u64) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                entries: entries.iter().map(|s| s.to_string()).collect(),
                total_results,
            }
        }
    }

    #[async_trait]
    impl DirectorySearch<String> for RecordingDirectory {
        async fn find_entries(
            &self,
            request: &SearchRequest,
        ) -> Result<VirtualListViewResponse<String>, DirectorySearchError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(VirtualListViewResponse {
                entries: self.entries.clone(),
                total_results: self.total_results,
            })
        }
    }

    struct FailingDirectory;

    #[async_trait]
    impl DirectorySearch<String> for FailingDirectory {
        async fn find_entries(
            &self,
            _request: &SearchRequest,
        ) -> Result<VirtualListViewResponse<String>, DirectorySearchError> {
            Err(DirectorySearchError::new("server unavailable"))
        }
    }

    #[test]
    fn test_defaults() {
        let request = build(EntityType::User, &params());
        assert_eq!(request.filter.as_str(), "(inum=*)");
        assert_eq!(request.start_index, 1);
        assert_eq!(request.count, DEFAULT_COUNT);
        assert_eq!(request.sort_by, "displayName");
        assert_eq!(request.sort_order, SortOrder::Ascending);
        assert_eq!(request.base_dn, BASE_DN);
        assert!(request.return_attributes.is_empty());
    }

    #[rstest]
    #[case(Some(0), DEFAULT_COUNT)]
    #[case(Some(-3), DEFAULT_COUNT)]
    #[case(None, DEFAULT_COUNT)]
    #[case(Some(1), 1)]
    #[case(Some(150), 150)]
    #[case(Some(200), MAX_COUNT)]
    #[case(Some(100_000), MAX_COUNT)]
    fn test_count_normalization(#[case] count: Option<i64>, #[case] expected: u64) {
        let request = build(
            EntityType::Group,
            &SearchParams {
                count,
                ..params()
            },
        );
        assert_eq!(request.count, expected);
    }

    #[rstest]
    #[case(Some(-5), 1)]
    #[case(Some(0), 1)]
    #[case(None, 1)]
    #[case(Some(1), 1)]
    #[case(Some(41), 41)]
    fn test_start_index_normalization(#[case] start_index: Option<i64>, #[case] expected: u64) {
        let request = build(
            EntityType::Group,
            &SearchParams {
                start_index,
                ..params()
            },
        );
        assert_eq!(request.start_index, expected);
    }

    #[rstest]
    #[case(None, SortOrder::Ascending)]
    #[case(Some("ascending"), SortOrder::Ascending)]
    #[case(Some("DESCENDING"), SortOrder::Descending)]
    #[case(Some("descending"), SortOrder::Descending)]
    #[case(Some("sideways"), SortOrder::Ascending)]
    fn test_sort_order(#[case] sort_order: Option<&str>, #[case] expected: SortOrder) {
        let request = build(
            EntityType::User,
            &SearchParams {
                sort_order: sort_order.map(str::to_string),
                ..params()
            },
        );
        assert_eq!(request.sort_order, expected);
    }

    #[test]
    fn test_user_sort_by_is_remapped() {
        let request = build(
            EntityType::User,
            &SearchParams {
                sort_by: Some("name.familyName".to_string()),
                ..params()
            },
        );
        assert_eq!(request.sort_by, "sn");

        let request = build(
            EntityType::User,
            &SearchParams {
                sort_by: Some("  ".to_string()),
                ..params()
            },
        );
        assert_eq!(request.sort_by, "displayName");
    }

    #[test]
    fn test_unknown_user_sort_by_is_rejected() {
        let err = SearchRequestBuilder::default()
            .build_request(
                BASE_DN,
                EntityType::User,
                &SearchParams {
                    sort_by: Some("shoeSize".to_string()),
                    ..params()
                },
                &[],
            )
            .unwrap_err();
        assert_eq!(err.kind(), ScimErrorKind::AttributeMapping);
    }

    #[test]
    fn test_non_user_sort_by_passes_through() {
        let request = build(
            EntityType::FidoDevice,
            &SearchParams {
                sort_by: Some("creationDate".to_string()),
                ..params()
            },
        );
        assert_eq!(request.sort_by, "creationDate");
    }

    #[test]
    fn test_filter_errors_propagate() {
        let err = SearchRequestBuilder::default()
            .build_request(
                BASE_DN,
                EntityType::User,
                &SearchParams {
                    filter: Some("userName eq".to_string()),
                    ..params()
                },
                &[],
            )
            .unwrap_err();
        assert_eq!(err.kind(), ScimErrorKind::Syntax);
    }

    #[test]
    fn test_custom_paging_options() {
        let builder = SearchRequestBuilder::new(
            FilterService::default(),
            PagingOptions {
                default_count: 25,
                max_count: 50,
                default_sort_by: "userName".to_string(),
            },
        );
        let request = builder
            .build_request(BASE_DN, EntityType::User, &params(), &[])
            .unwrap();
        assert_eq!(request.count, 25);
        assert_eq!(request.sort_by, "uid");

        let request = builder
            .build_request(
                BASE_DN,
                EntityType::User,
                &SearchParams {
                    count: Some(75),
                    ..params()
                },
                &[],
            )
            .unwrap();
        assert_eq!(request.count, 50);
    }

    #[test]
    fn test_build_from_params_splits_attributes() {
        let request = SearchRequestBuilder::default()
            .build_from_params(
                BASE_DN,
                EntityType::User,
                &SearchParams {
                    attributes: Some("uid,mail".to_string()),
                    ..params()
                },
            )
            .unwrap();
        assert_eq!(request.return_attributes, vec!["uid", "mail"]);
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let request = build(
            EntityType::User,
            &SearchParams {
                filter: Some("title pr".to_string()),
                ..params()
            },
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["baseDn"], BASE_DN);
        assert_eq!(json["entityType"], "user");
        assert_eq!(json["filter"], "(oxTrustTitle=*)");
        assert_eq!(json["startIndex"], 1);
        assert_eq!(json["sortOrder"], "ascending");
        assert!(json["returnAttributes"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_reshapes_response() {
        let directory = RecordingDirectory::new(&["alice", "bob"], 42);
        let builder = SearchRequestBuilder::default();
        let request = builder
            .build_request(
                BASE_DN,
                EntityType::User,
                &SearchParams {
                    filter: Some(r#"userName sw "a""#.to_string()),
                    start_index: Some(11),
                    count: Some(2),
                    ..params()
                },
                &["uid".to_string()],
            )
            .unwrap();

        let page = builder
            .search::<String, _>(&directory, &request)
            .await
            .unwrap();
        assert_eq!(page.entries, vec!["alice", "bob"]);
        assert_eq!(page.total_results, 42);
        assert_eq!(page.items_per_page, 2);
        assert_eq!(page.start_index, 11);

        let recorded = directory.requests.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0], request);
        assert_eq!(recorded[0].filter.as_str(), "(uid=a*)");
    }

    #[tokio::test]
    async fn test_search_propagates_directory_failure() {
        let builder = SearchRequestBuilder::default();
        let request = build(EntityType::Group, &params());
        let err = builder
            .search::<String, _>(&FailingDirectory, &request)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ScimErrorKind::DirectorySearch);
        assert!(err.to_string().contains("server unavailable"));
    }

    #[tokio::test]
    async fn test_list_does_not_call_directory_on_bad_filter() {
        let directory = RecordingDirectory::new(&[], 0);
        let err = SearchRequestBuilder::default()
            .list::<String, _>(
                &directory,
                BASE_DN,
                EntityType::User,
                &SearchParams {
                    filter: Some(r#"bogusAttr eq "x""#.to_string()),
                    ..params()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_client_error());
        assert!(directory.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_through_trait_object() {
        let directory: Box<dyn DirectorySearch<String>> =
            Box::new(RecordingDirectory::new(&["x"], 1));
        let builder = SearchRequestBuilder::default();
        let page = builder
            .list::<String, _>(directory.as_ref(), BASE_DN, EntityType::FidoDevice, &params())
            .await
            .unwrap();
        assert_eq!(page.total_results, 1);
    }
}
