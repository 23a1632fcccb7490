//! Filter translation entry point
//!
//! [`FilterService`] runs tokenize → parse → visit for one filter string and
//! entity type. It holds only immutable, `Arc`-shared state, so one instance
//! can be cloned into every request handler and used concurrently.

use std::sync::Arc;

use tracing::debug;

use super::{
    error::{ScimError, ScimResult},
    filter::{FailFast, Filter, FilterOptions, FilterSyntaxError, parse_tokens},
    filter_to_ldap::{FilterVisitor, TranslatedFilter, VisitorRegistry},
    mapping::{EntityType, MappingRegistry},
    token::tokenize,
};

#[derive(Debug, Clone)]
pub struct FilterService {
    options: FilterOptions,
    mappings: MappingRegistry,
    visitors: VisitorRegistry,
}

impl FilterService {
    /// One LDAP visitor per mapping table.
    pub fn new(options: FilterOptions, mappings: MappingRegistry) -> Self {
        let visitors = VisitorRegistry::from_mappings(&mappings);
        Self {
            options,
            mappings,
            visitors,
        }
    }

    /// Replace the visitor for the visitor's entity type.
    pub fn register_visitor(&mut self, visitor: Arc<dyn FilterVisitor>) {
        self.visitors.register(visitor);
    }

    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    /// The tables the built-in visitors translate with.
    pub fn mappings(&self) -> &MappingRegistry {
        &self.mappings
    }

    pub fn visitors(&self) -> &VisitorRegistry {
        &self.visitors
    }

    /// Parse without translating.
    pub fn parse(&self, input: &str) -> Result<Filter, FilterSyntaxError> {
        let tokens = tokenize(input, &self.options)?;
        let mut sink = FailFast::new();
        let parsed = parse_tokens(&tokens, &self.options, &mut sink);
        sink.into_result(parsed)
    }

    /// Translate `filter` into a directory filter for `entity`.
    ///
    /// Absent, empty, or whitespace-only input yields the entity's match-all
    /// filter without invoking the parser.
    pub fn translate(
        &self,
        filter: Option<&str>,
        entity: EntityType,
    ) -> ScimResult<TranslatedFilter> {
        let visitor = self.visitor(entity)?;

        let Some(input) = filter.filter(|s| !s.trim().is_empty()) else {
            let translated = visitor.match_all();
            debug!(entity = %entity, output = %translated, "Empty filter, matching all entries");
            return Ok(translated);
        };

        let parsed = self.parse(input).inspect_err(|e| {
            debug!(entity = %entity, input = %input, error = %e, "Filter rejected by parser");
        })?;

        let translated = visitor.visit(&parsed).map_err(ScimError::from).inspect_err(|e| {
            debug!(entity = %entity, input = %input, error = %e, "Filter translation failed");
        })?;

        debug!(
            entity = %entity,
            input = %input,
            output = %translated,
            "Translated filter"
        );
        Ok(translated)
    }

    /// The match-all filter for `entity`.
    pub fn match_all(&self, entity: EntityType) -> ScimResult<TranslatedFilter> {
        Ok(self.visitor(entity)?.match_all())
    }

    fn visitor(&self, entity: EntityType) -> ScimResult<&dyn FilterVisitor> {
        self.visitors
            .get(entity)
            .map(|v| v.as_ref())
            .ok_or(ScimError::UnregisteredEntity(entity))
    }
}

impl Default for FilterService {
    fn default() -> Self {
        Self::new(FilterOptions::default(), MappingRegistry::default())
    }
}
