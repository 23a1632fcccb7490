//! Per-entity attribute mapping tables
//!
//! Each entity type has one table from logical SCIM attribute path
//! (`userName`, `name.familyName`, `meta.lastModified`) to the physical
//! directory attribute and its value syntax. Tables are built once at
//! startup, optionally extended from configuration, then shared read-only
//! behind `Arc`.
//!
//! ### Built-in User Attributes
//!
//! - `id` → `inum`
//! - `userName` → `uid`
//! - `name.givenName` → `givenName`, `name.familyName` → `sn`
//! - `active` → `gluuStatus` (`active` / `inactive`)
//! - `emails.value` → `mail`
//!
//! ### Built-in Group Attributes
//!
//! - `id` → `inum`
//! - `displayName` → `displayName`
//! - `members.value` → `member`
//!
//! ### Built-in FIDO Device Attributes
//!
//! - `id` → `oxId`
//! - `userId` → `personInum`
//! - `counter` → `oxCounter` (number)
//!
//! A bare multi-valued attribute (`emails`) resolves through its `value`
//! sub-attribute (`emails.value`) when it has no mapping of its own.

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use super::filter::AttrPath;

/// Directory attribute used for the match-all filter when a table maps no `id`.
pub const FALLBACK_MATCH_ALL_ATTRIBUTE: &str = "objectClass";

/// Kind of record a filter is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityType {
    User,
    Group,
    FidoDevice,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [EntityType::User, EntityType::Group, EntityType::FidoDevice];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::User => "user",
            EntityType::Group => "group",
            EntityType::FidoDevice => "fido-device",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown entity type '{0}' (expected user, group or fido-device)")]
pub struct UnknownEntityType(pub String);

impl FromStr for EntityType {
    type Err = UnknownEntityType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" | "users" => Ok(EntityType::User),
            "group" | "groups" => Ok(EntityType::Group),
            "fido-device" | "fido_device" | "fidodevice" | "fido2" => Ok(EntityType::FidoDevice),
            _ => Err(UnknownEntityType(s.to_string())),
        }
    }
}

/// How values of a directory attribute are written in a filter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttrSyntax {
    /// Free text. Supports every operator.
    #[default]
    String,
    /// Two-valued attribute stored as directory literals
    /// (e.g. `gluuStatus` holds `active` / `inactive`).
    Boolean {
        true_value: String,
        false_value: String,
    },
    /// Numeric attribute. Supports equality and ordering.
    Number,
}

impl AttrSyntax {
    /// Directory literal for a boolean, or `None` when the attribute is not boolean.
    pub fn boolean_literal(&self, value: bool) -> Option<&str> {
        match self {
            AttrSyntax::Boolean {
                true_value,
                false_value,
            } => Some(if value { true_value } else { false_value }),
            _ => None,
        }
    }
}

/// Physical directory attribute for one logical attribute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrMapping {
    pub attribute: String,
    pub syntax: AttrSyntax,
}

impl AttrMapping {
    pub fn string(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            syntax: AttrSyntax::String,
        }
    }

    pub fn number(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            syntax: AttrSyntax::Number,
        }
    }

    pub fn boolean(
        attribute: impl Into<String>,
        true_value: impl Into<String>,
        false_value: impl Into<String>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            syntax: AttrSyntax::Boolean {
                true_value: true_value.into(),
                false_value: false_value.into(),
            },
        }
    }
}

/// A logical attribute the entity's table does not map.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Attribute '{attribute}' is not supported for {entity_type} filters")]
pub struct AttributeMappingError {
    pub attribute: String,
    pub entity_type: EntityType,
}

/// Logical attribute path → directory attribute, for one entity type.
#[derive(Debug, Clone)]
pub struct AttributeMappingTable {
    entity_type: EntityType,
    entries: HashMap<String, AttrMapping>,
    case_sensitive: bool,
}

impl AttributeMappingTable {
    /// An empty table.
    pub fn new(entity_type: EntityType, case_sensitive: bool) -> Self {
        Self {
            entity_type,
            entries: HashMap::new(),
            case_sensitive,
        }
    }

    /// The built-in table for `entity_type`.
    pub fn builtin(entity_type: EntityType, case_sensitive: bool) -> Self {
        let mut table = Self::new(entity_type, case_sensitive);
        let entries = match entity_type {
            EntityType::User => user_entries(),
            EntityType::Group => group_entries(),
            EntityType::FidoDevice => fido_device_entries(),
        };
        for (logical, mapping) in entries {
            table.insert(logical, mapping);
        }
        table
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add or replace a mapping. `logical` may use `:` or `.` before a
    /// sub-attribute.
    pub fn insert(&mut self, logical: &str, mapping: AttrMapping) {
        let key = self.key(&AttrPath::from_logical(logical).logical_name());
        self.entries.insert(key, mapping);
    }

    /// Resolve a filter attribute path.
    pub fn resolve(&self, path: &AttrPath) -> Result<&AttrMapping, AttributeMappingError> {
        let logical = path.logical_name();
        if let Some(mapping) = self.entries.get(&self.key(&logical)) {
            return Ok(mapping);
        }
        if path.sub_attr.is_none()
            && let Some(mapping) = self.entries.get(&self.key(&format!("{logical}.value")))
        {
            return Ok(mapping);
        }
        Err(AttributeMappingError {
            attribute: logical,
            entity_type: self.entity_type,
        })
    }

    /// Resolve a bare logical name such as a `sortBy` value.
    pub fn resolve_name(&self, name: &str) -> Result<&AttrMapping, AttributeMappingError> {
        self.resolve(&AttrPath::from_logical(name))
    }

    /// Directory attribute whose presence matches every entry of this type.
    pub fn match_all_attribute(&self) -> &str {
        self.entries
            .get(&self.key("id"))
            .map_or(FALLBACK_MATCH_ALL_ATTRIBUTE, |m| m.attribute.as_str())
    }

    /// Entries sorted by logical name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrMapping)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }

    fn key(&self, logical: &str) -> String {
        if self.case_sensitive {
            logical.to_string()
        } else {
            logical.to_ascii_lowercase()
        }
    }
}

fn user_entries() -> Vec<(&'static str, AttrMapping)> {
    vec![
        ("id", AttrMapping::string("inum")),
        ("externalId", AttrMapping::string("oxTrustExternalId")),
        ("userName", AttrMapping::string("uid")),
        ("name.formatted", AttrMapping::string("cn")),
        ("name.givenName", AttrMapping::string("givenName")),
        ("name.familyName", AttrMapping::string("sn")),
        ("name.middleName", AttrMapping::string("middleName")),
        ("name.honorificPrefix", AttrMapping::string("oxTrustHonorificPrefix")),
        ("name.honorificSuffix", AttrMapping::string("oxTrustHonorificSuffix")),
        ("displayName", AttrMapping::string("displayName")),
        ("nickName", AttrMapping::string("nickname")),
        ("profileUrl", AttrMapping::string("oxTrustProfileURL")),
        ("title", AttrMapping::string("oxTrustTitle")),
        ("userType", AttrMapping::string("oxTrustUserType")),
        ("preferredLanguage", AttrMapping::string("preferredLanguage")),
        ("locale", AttrMapping::string("locale")),
        ("timezone", AttrMapping::string("zoneinfo")),
        ("active", AttrMapping::boolean("gluuStatus", "active", "inactive")),
        ("emails.value", AttrMapping::string("mail")),
        ("phoneNumbers.value", AttrMapping::string("telephoneNumber")),
        ("groups.value", AttrMapping::string("memberOf")),
        ("meta.created", AttrMapping::string("oxCreationTimestamp")),
        ("meta.lastModified", AttrMapping::string("oxTrustMetaLastModified")),
        ("meta.location", AttrMapping::string("oxTrustMetaLocation")),
    ]
}

fn group_entries() -> Vec<(&'static str, AttrMapping)> {
    vec![
        ("id", AttrMapping::string("inum")),
        ("displayName", AttrMapping::string("displayName")),
        ("members.value", AttrMapping::string("member")),
        ("meta.lastModified", AttrMapping::string("oxTrustMetaLastModified")),
        ("meta.location", AttrMapping::string("oxTrustMetaLocation")),
    ]
}

fn fido_device_entries() -> Vec<(&'static str, AttrMapping)> {
    vec![
        ("id", AttrMapping::string("oxId")),
        ("userId", AttrMapping::string("personInum")),
        ("displayName", AttrMapping::string("displayName")),
        ("creationDate", AttrMapping::string("creationDate")),
        ("counter", AttrMapping::number("oxCounter")),
        ("status", AttrMapping::string("oxStatus")),
        ("application", AttrMapping::string("oxApplication")),
        ("meta.lastModified", AttrMapping::string("oxLastAccessTime")),
    ]
}

/// Mapping tables for every entity type, shared across threads.
#[derive(Debug, Clone)]
pub struct MappingRegistry {
    tables: Arc<HashMap<EntityType, Arc<AttributeMappingTable>>>,
}

impl MappingRegistry {
    /// Built-in tables for all entity types.
    pub fn builtin(case_sensitive: bool) -> Self {
        Self::from_tables(
            EntityType::ALL
                .into_iter()
                .map(|entity| AttributeMappingTable::builtin(entity, case_sensitive)),
        )
    }

    /// Register the given tables. A later table for the same entity replaces
    /// an earlier one.
    pub fn from_tables(tables: impl IntoIterator<Item = AttributeMappingTable>) -> Self {
        let tables = tables
            .into_iter()
            .map(|table| (table.entity_type(), Arc::new(table)))
            .collect();
        Self {
            tables: Arc::new(tables),
        }
    }

    pub fn get(&self, entity_type: EntityType) -> Option<&Arc<AttributeMappingTable>> {
        self.tables.get(&entity_type)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Arc<AttributeMappingTable>> {
        self.tables.values()
    }
}

impl Default for MappingRegistry {
    fn default() -> Self {
        Self::builtin(false)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(EntityType::User, "userName", "uid")]
    #[case(EntityType::User, "name:familyName", "sn")]
    #[case(EntityType::User, "name.givenName", "givenName")]
    #[case(EntityType::User, "emails", "mail")]
    #[case(EntityType::Group, "members", "member")]
    #[case(EntityType::Group, "displayName", "displayName")]
    #[case(EntityType::FidoDevice, "userId", "personInum")]
    #[case(EntityType::FidoDevice, "meta.lastModified", "oxLastAccessTime")]
    fn test_builtin_resolution(
        #[case] entity: EntityType,
        #[case] logical: &str,
        #[case] expected: &str,
    ) {
        let table = AttributeMappingTable::builtin(entity, false);
        assert_eq!(table.resolve_name(logical).unwrap().attribute, expected);
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let table = AttributeMappingTable::builtin(EntityType::User, false);
        assert_eq!(table.resolve_name("USERNAME").unwrap().attribute, "uid");
        assert_eq!(table.resolve_name("Name:FamilyName").unwrap().attribute, "sn");
    }

    #[test]
    fn test_case_sensitive_lookup() {
        let table = AttributeMappingTable::builtin(EntityType::User, true);
        assert!(table.resolve_name("userName").is_ok());
        let err = table.resolve_name("username").unwrap_err();
        assert_eq!(err.attribute, "username");
        assert_eq!(err.entity_type, EntityType::User);
    }

    #[test]
    fn test_unmapped_attribute() {
        let table = AttributeMappingTable::builtin(EntityType::Group, false);
        let err = table.resolve_name("userName").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Attribute 'userName' is not supported for group filters"
        );
    }

    #[test]
    fn test_value_fallback_only_for_bare_attributes() {
        let table = AttributeMappingTable::builtin(EntityType::User, false);
        assert!(table.resolve_name("emails").is_ok());
        assert!(table.resolve_name("emails.type").is_err());
    }

    #[test]
    fn test_boolean_syntax() {
        let table = AttributeMappingTable::builtin(EntityType::User, false);
        let active = table.resolve_name("active").unwrap();
        assert_eq!(active.attribute, "gluuStatus");
        assert_eq!(active.syntax.boolean_literal(true), Some("active"));
        assert_eq!(active.syntax.boolean_literal(false), Some("inactive"));
        assert_eq!(AttrSyntax::String.boolean_literal(true), None);
    }

    #[test]
    fn test_match_all_attribute() {
        let registry = MappingRegistry::builtin(false);
        assert_eq!(
            registry.get(EntityType::User).unwrap().match_all_attribute(),
            "inum"
        );
        assert_eq!(
            registry.get(EntityType::FidoDevice).unwrap().match_all_attribute(),
            "oxId"
        );
        let empty = AttributeMappingTable::new(EntityType::Group, false);
        assert_eq!(empty.match_all_attribute(), FALLBACK_MATCH_ALL_ATTRIBUTE);
    }

    #[test]
    fn test_insert_overrides_builtin() {
        let mut table = AttributeMappingTable::builtin(EntityType::User, false);
        let before = table.len();
        table.insert("userName", AttrMapping::string("mail"));
        table.insert("name:nickname", AttrMapping::string("nickname"));
        assert_eq!(table.resolve_name("userName").unwrap().attribute, "mail");
        assert_eq!(table.resolve_name("name.nickname").unwrap().attribute, "nickname");
        assert_eq!(table.len(), before + 1);
    }

    #[test]
    fn test_entity_type_from_str() {
        assert_eq!("user".parse::<EntityType>().unwrap(), EntityType::User);
        assert_eq!("Groups".parse::<EntityType>().unwrap(), EntityType::Group);
        assert_eq!(
            "fido-device".parse::<EntityType>().unwrap(),
            EntityType::FidoDevice
        );
        assert!("device".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_entity_type_serde() {
        let json = serde_json::to_string(&EntityType::FidoDevice).unwrap();
        assert_eq!(json, "\"fido-device\"");
        let back: EntityType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EntityType::FidoDevice);
    }

    #[test]
    fn test_iter_is_sorted() {
        let table = AttributeMappingTable::builtin(EntityType::Group, false);
        let keys: Vec<_> = table.iter().map(|(k, _)| k).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
