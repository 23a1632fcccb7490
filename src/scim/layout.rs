//! Directory tree layout
//!
//! Search bases under the organization DN:
//!
//! ```text
//! ou=people,{org}
//! ou=groups,{org}
//! ou=fido2_register,inum={person},ou=people,{org}
//! oxId={device},ou=fido2_register,inum={person},ou=people,{org}
//! ```

use super::mapping::EntityType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLayout {
    org_dn: String,
}

impl DirectoryLayout {
    pub fn new(org_dn: impl Into<String>) -> Self {
        Self {
            org_dn: org_dn.into(),
        }
    }

    pub fn org_dn(&self) -> &str {
        &self.org_dn
    }

    pub fn people_dn(&self) -> String {
        format!("ou=people,{}", self.org_dn)
    }

    pub fn groups_dn(&self) -> String {
        format!("ou=groups,{}", self.org_dn)
    }

    /// Container holding one person's FIDO2 registrations.
    pub fn fido2_devices_dn(&self, person_inum: &str) -> String {
        format!(
            "ou=fido2_register,inum={},{}",
            escape_dn_value(person_inum),
            self.people_dn()
        )
    }

    /// A single FIDO2 registration.
    pub fn fido2_device_dn(&self, person_inum: &str, device_id: &str) -> String {
        format!(
            "oxId={},{}",
            escape_dn_value(device_id),
            self.fido2_devices_dn(person_inum)
        )
    }

    /// Search base for `entity`.
    ///
    /// Device searches without an owner start at the people branch so a
    /// subtree search covers every person's registrations.
    pub fn base_dn_for(&self, entity: EntityType, owner: Option<&str>) -> String {
        match (entity, owner) {
            (EntityType::User, _) => self.people_dn(),
            (EntityType::Group, _) => self.groups_dn(),
            (EntityType::FidoDevice, Some(person)) => self.fido2_devices_dn(person),
            (EntityType::FidoDevice, None) => self.people_dn(),
        }
    }
}

/// Escape an attribute value for use in a DN (RFC 4514).
pub fn escape_dn_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                result.push('\\');
                result.push(c);
            }
            '#' if i == 0 => result.push_str("\\#"),
            ' ' if i == 0 || i == last => result.push_str("\\ "),
            '\0' => result.push_str("\\00"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> DirectoryLayout {
        DirectoryLayout::new("o=gluu")
    }

    #[test]
    fn test_branches() {
        assert_eq!(layout().people_dn(), "ou=people,o=gluu");
        assert_eq!(layout().groups_dn(), "ou=groups,o=gluu");
    }

    #[test]
    fn test_fido2_dns() {
        assert_eq!(
            layout().fido2_devices_dn("A1B2"),
            "ou=fido2_register,inum=A1B2,ou=people,o=gluu"
        );
        assert_eq!(
            layout().fido2_device_dn("A1B2", "dev-1"),
            "oxId=dev-1,ou=fido2_register,inum=A1B2,ou=people,o=gluu"
        );
    }

    #[test]
    fn test_base_dn_for() {
        let layout = layout();
        assert_eq!(layout.base_dn_for(EntityType::User, None), "ou=people,o=gluu");
        assert_eq!(layout.base_dn_for(EntityType::Group, Some("x")), "ou=groups,o=gluu");
        assert_eq!(
            layout.base_dn_for(EntityType::FidoDevice, None),
            "ou=people,o=gluu"
        );
        assert_eq!(
            layout.base_dn_for(EntityType::FidoDevice, Some("P1")),
            "ou=fido2_register,inum=P1,ou=people,o=gluu"
        );
    }

    #[test]
    fn test_dn_escaping() {
        assert_eq!(escape_dn_value("a,b=c"), r"a\,b\=c");
        assert_eq!(escape_dn_value("#tag"), r"\#tag");
        assert_eq!(escape_dn_value(" padded "), r"\ padded\ ");
        assert_eq!(escape_dn_value("mid#dle"), "mid#dle");
        assert_eq!(
            layout().fido2_devices_dn("x,ou=admins"),
            r"ou=fido2_register,inum=x\,ou\=admins,ou=people,o=gluu"
        );
    }
}
