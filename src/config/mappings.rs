use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::scim::mapping::{AttrMapping, AttributeMappingTable, EntityType, MappingRegistry};

/// Extra or overriding attribute mappings, layered over the built-in tables.
///
/// ```toml
/// [mappings.user]
/// nickName = "nickname"
/// "meta.created" = { attribute = "oxCreationTimestamp", syntax = "string" }
///
/// [mappings.fido_device]
/// registered = { attribute = "oxRegistered", syntax = "boolean", true_value = "TRUE", false_value = "FALSE" }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct MappingsConfig {
    #[serde(default)]
    pub user: BTreeMap<String, MappingEntry>,

    #[serde(default)]
    pub group: BTreeMap<String, MappingEntry>,

    #[serde(default)]
    pub fido_device: BTreeMap<String, MappingEntry>,
}

/// A single mapping: a bare directory attribute name (string syntax) or a
/// table with an explicit syntax.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(untagged)]
pub enum MappingEntry {
    Attribute(String),
    Detailed(MappingDetail),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct MappingDetail {
    /// Directory attribute name.
    pub attribute: String,

    #[serde(default)]
    pub syntax: SyntaxKind,

    /// Directory value for `true` (boolean syntax only).
    #[serde(default)]
    pub true_value: Option<String>,

    /// Directory value for `false` (boolean syntax only).
    #[serde(default)]
    pub false_value: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum SyntaxKind {
    #[default]
    String,
    Number,
    Boolean,
}

impl MappingEntry {
    fn attribute(&self) -> &str {
        match self {
            MappingEntry::Attribute(attribute) => attribute,
            MappingEntry::Detailed(detail) => &detail.attribute,
        }
    }

    fn to_mapping(&self) -> AttrMapping {
        match self {
            MappingEntry::Attribute(attribute) => AttrMapping::string(attribute.trim()),
            MappingEntry::Detailed(detail) => {
                let attribute = detail.attribute.trim();
                match detail.syntax {
                    SyntaxKind::String => AttrMapping::string(attribute),
                    SyntaxKind::Number => AttrMapping::number(attribute),
                    SyntaxKind::Boolean => AttrMapping::boolean(
                        attribute,
                        detail.true_value.as_deref().unwrap_or("true"),
                        detail.false_value.as_deref().unwrap_or("false"),
                    ),
                }
            }
        }
    }
}

impl MappingsConfig {
    fn entries(&self, entity: EntityType) -> &BTreeMap<String, MappingEntry> {
        match entity {
            EntityType::User => &self.user,
            EntityType::Group => &self.group,
            EntityType::FidoDevice => &self.fido_device,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        for entity in EntityType::ALL {
            for (logical, entry) in self.entries(entity) {
                if logical.trim().is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "mappings.{}: logical attribute name must not be empty",
                        section_name(entity)
                    )));
                }
                if entry.attribute().trim().is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "mappings.{}.{logical}: directory attribute must not be empty",
                        section_name(entity)
                    )));
                }
                if let MappingEntry::Detailed(detail) = entry {
                    let has_values = detail.true_value.is_some() || detail.false_value.is_some();
                    if has_values && detail.syntax != SyntaxKind::Boolean {
                        return Err(ConfigError::Validation(format!(
                            "mappings.{}.{logical}: true_value/false_value require syntax = \"boolean\"",
                            section_name(entity)
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Built-in tables with these entries applied on top.
    pub fn build_registry(&self, case_sensitive: bool) -> MappingRegistry {
        MappingRegistry::from_tables(EntityType::ALL.into_iter().map(|entity| {
            let mut table = AttributeMappingTable::builtin(entity, case_sensitive);
            for (logical, entry) in self.entries(entity) {
                table.insert(logical.trim(), entry.to_mapping());
            }
            table
        }))
    }
}

fn section_name(entity: EntityType) -> &'static str {
    match entity {
        EntityType::User => "user",
        EntityType::Group => "group",
        EntityType::FidoDevice => "fido_device",
    }
}
