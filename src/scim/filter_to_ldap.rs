//! SCIM Filter to LDAP Translation
//!
//! Converts a parsed SCIM filter (RFC 7644) into an RFC 4515 search filter,
//! resolving every attribute through the entity type's mapping table.
//!
//! ## Operator Mapping
//!
//! | SCIM              | LDAP                    |
//! |-------------------|-------------------------|
//! | `a eq v`          | `(a=v)`                 |
//! | `a ne v`          | `(!(a=v))`              |
//! | `a co v`          | `(a=*v*)`               |
//! | `a sw v`          | `(a=v*)`                |
//! | `a ew v`          | `(a=*v)`                |
//! | `a pr`            | `(a=*)`                 |
//! | `a ge v`          | `(a>=v)`                |
//! | `a le v`          | `(a<=v)`                |
//! | `a gt v`          | `(&(a>=v)(!(a=v)))`     |
//! | `a lt v`          | `(&(a<=v)(!(a=v)))`     |
//! | `a eq null`       | `(!(a=*))`              |
//! | `a ne null`       | `(a=*)`                 |
//!
//! LDAP has no strict ordering match, so `gt`/`lt` exclude equality
//! explicitly. Logical nodes become `(&...)`, `(|...)` and `(!...)`; the
//! prefix form is fully parenthesized so the output always follows the tree.
//!
//! ## Unsupported Comparisons
//!
//! Comparisons the attribute's syntax cannot express are rejected rather than
//! approximated:
//!
//! - substring and ordering operators on boolean attributes
//! - substring operators on numeric attributes
//! - anything but `eq`/`ne` against `null` or a boolean literal
//!
//! Numeric literals are written exactly as the client sent them.

use std::{collections::HashMap, fmt, sync::Arc};

use serde::{Serialize, Serializer};

use super::{
    filter::{AttrPath, CompareOp, Filter, FilterValue, LogicalOp},
    mapping::{
        AttrSyntax, AttributeMappingError, AttributeMappingTable, EntityType, MappingRegistry,
    },
};

/// An RFC 4515 filter string. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranslatedFilter(String);

impl TranslatedFilter {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Presence filter `(attribute=*)`.
    pub fn presence(attribute: &str) -> Self {
        Self(format!("({attribute}=*)"))
    }
}

impl fmt::Display for TranslatedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TranslatedFilter {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for TranslatedFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// A well-formed comparison the attribute's syntax cannot express.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported comparison '{attribute} {op} {value}': {reason}")]
pub struct UnsupportedComparison {
    pub attribute: String,
    pub op: CompareOp,
    /// The comparison value as written in SCIM syntax
    pub value: String,
    pub reason: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error(transparent)]
    AttributeMapping(#[from] AttributeMappingError),

    #[error(transparent)]
    UnsupportedComparison(#[from] UnsupportedComparison),
}

/// Translates a filter tree for one entity type.
pub trait FilterVisitor: Send + Sync {
    fn entity_type(&self) -> EntityType;

    /// Translate `filter`, failing on the first unmapped attribute or
    /// unsupported comparison.
    fn visit(&self, filter: &Filter) -> Result<TranslatedFilter, TranslateError>;

    /// Filter matching every entry of this entity type.
    fn match_all(&self) -> TranslatedFilter;
}

/// [`FilterVisitor`] backed by an attribute mapping table.
#[derive(Debug, Clone)]
pub struct LdapFilterVisitor {
    table: Arc<AttributeMappingTable>,
}

impl LdapFilterVisitor {
    pub fn new(table: Arc<AttributeMappingTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &AttributeMappingTable {
        &self.table
    }

    fn write_filter(&self, filter: &Filter, out: &mut String) -> Result<(), TranslateError> {
        match filter {
            Filter::Compare { attr, op, value } => self.write_compare(attr, *op, value, out),
            Filter::Present { attr } => {
                let mapping = self.table.resolve(attr)?;
                out.push_str(&format!("({}=*)", mapping.attribute));
                Ok(())
            }
            Filter::Group(inner) => self.write_filter(inner, out),
            Filter::Logical { op, children } => self.write_logical(*op, children, out),
        }
    }

    fn write_logical(
        &self,
        op: LogicalOp,
        children: &[Filter],
        out: &mut String,
    ) -> Result<(), TranslateError> {
        match (op, children) {
            (LogicalOp::And | LogicalOp::Or, [only]) => self.write_filter(only, out),
            (LogicalOp::Not, [only]) => {
                out.push_str("(!");
                self.write_filter(only, out)?;
                out.push(')');
                Ok(())
            }
            // Hand-built trees only: negate the conjunction of all children.
            (LogicalOp::Not, _) => {
                out.push_str("(!");
                self.write_logical(LogicalOp::And, children, out)?;
                out.push(')');
                Ok(())
            }
            (LogicalOp::And | LogicalOp::Or, _) => {
                out.push_str(if op == LogicalOp::And { "(&" } else { "(|" });
                for child in children {
                    self.write_filter(child, out)?;
                }
                out.push(')');
                Ok(())
            }
        }
    }

    fn write_compare(
        &self,
        attr: &AttrPath,
        op: CompareOp,
        value: &FilterValue,
        out: &mut String,
    ) -> Result<(), TranslateError> {
        let mapping = self.table.resolve(attr)?;
        let name = mapping.attribute.as_str();
        let unsupported = |reason: &'static str| UnsupportedComparison {
            attribute: attr.to_string(),
            op,
            value: value.to_string(),
            reason,
        };

        let literal = match (&mapping.syntax, value) {
            (_, FilterValue::Null) => {
                let rendered = match op {
                    CompareOp::Eq => format!("(!({name}=*))"),
                    CompareOp::Ne => format!("({name}=*)"),
                    _ => return Err(unsupported("null only supports eq and ne").into()),
                };
                out.push_str(&rendered);
                return Ok(());
            }
            (AttrSyntax::Boolean { .. }, _) => {
                let flag = match value {
                    FilterValue::Bool(b) => Some(*b),
                    FilterValue::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
                    FilterValue::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
                    _ => None,
                };
                let Some(flag) = flag else {
                    return Err(unsupported("attribute expects a boolean").into());
                };
                if !matches!(op, CompareOp::Eq | CompareOp::Ne) {
                    return Err(unsupported("boolean attributes only support eq and ne").into());
                }
                let directory_value = mapping.syntax.boolean_literal(flag).unwrap_or_default();
                escape_filter_value(directory_value)
            }
            (AttrSyntax::Number, FilterValue::Bool(_)) => {
                return Err(unsupported("attribute expects a number").into());
            }
            (AttrSyntax::Number, _) if op.is_substring() => {
                return Err(
                    unsupported("numeric attributes do not support substring matching").into(),
                );
            }
            (_, FilterValue::Bool(b)) => {
                if !matches!(op, CompareOp::Eq | CompareOp::Ne) {
                    return Err(unsupported("boolean values only support eq and ne").into());
                }
                (if *b { "TRUE" } else { "FALSE" }).to_string()
            }
            (_, FilterValue::Number(n)) => n.clone(),
            (_, FilterValue::String(s)) => escape_filter_value(s),
        };

        let rendered = match op {
            CompareOp::Eq => format!("({name}={literal})"),
            CompareOp::Ne => format!("(!({name}={literal}))"),
            CompareOp::Co | CompareOp::Sw | CompareOp::Ew if literal.is_empty() => {
                format!("({name}=*)")
            }
            CompareOp::Co => format!("({name}=*{literal}*)"),
            CompareOp::Sw => format!("({name}={literal}*)"),
            CompareOp::Ew => format!("({name}=*{literal})"),
            CompareOp::Ge => format!("({name}>={literal})"),
            CompareOp::Le => format!("({name}<={literal})"),
            CompareOp::Gt => format!("(&({name}>={literal})(!({name}={literal})))"),
            CompareOp::Lt => format!("(&({name}<={literal})(!({name}={literal})))"),
        };
        out.push_str(&rendered);
        Ok(())
    }
}

impl FilterVisitor for LdapFilterVisitor {
    fn entity_type(&self) -> EntityType {
        self.table.entity_type()
    }

    fn visit(&self, filter: &Filter) -> Result<TranslatedFilter, TranslateError> {
        let mut out = String::new();
        self.write_filter(filter, &mut out)?;
        Ok(TranslatedFilter(out))
    }

    fn match_all(&self) -> TranslatedFilter {
        TranslatedFilter::presence(self.table.match_all_attribute())
    }
}

/// Visitors keyed by entity type.
#[derive(Clone, Default)]
pub struct VisitorRegistry {
    visitors: Arc<HashMap<EntityType, Arc<dyn FilterVisitor>>>,
}

impl VisitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One [`LdapFilterVisitor`] per table in `mappings`.
    pub fn from_mappings(mappings: &MappingRegistry) -> Self {
        let mut registry = Self::new();
        for table in mappings.tables() {
            registry.register(Arc::new(LdapFilterVisitor::new(Arc::clone(table))));
        }
        registry
    }

    /// Register `visitor` for its entity type, replacing any existing one.
    pub fn register(&mut self, visitor: Arc<dyn FilterVisitor>) {
        Arc::make_mut(&mut self.visitors).insert(visitor.entity_type(), visitor);
    }

    pub fn get(&self, entity_type: EntityType) -> Option<&Arc<dyn FilterVisitor>> {
        self.visitors.get(&entity_type)
    }

    pub fn entity_types(&self) -> impl Iterator<Item = EntityType> + '_ {
        self.visitors.keys().copied()
    }
}

impl fmt::Debug for VisitorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entities: Vec<_> = self.entity_types().map(|e| e.as_str()).collect();
        entities.sort_unstable();
        f.debug_struct("VisitorRegistry")
            .field("entity_types", &entities)
            .finish()
    }
}

/// Escape a value for use inside an RFC 4515 filter.
pub fn escape_filter_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '*' => result.push_str("\\2a"),
            '(' => result.push_str("\\28"),
            ')' => result.push_str("\\29"),
            '\\' => result.push_str("\\5c"),
            '\0' => result.push_str("\\00"),
            _ => result.push(c),
        }
    }
    result
}
