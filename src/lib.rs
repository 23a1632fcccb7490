//! SCIM filter to directory search translation.
//!
//! Parses SCIM filter expressions, translates them into RFC 4515 LDAP
//! filters through per-entity attribute mapping tables, and builds bounded,
//! paged search requests for a directory backend.
//!
//! ```
//! use scim_directory::scim::{EntityType, FilterService};
//!
//! let filters = FilterService::default();
//! let ldap = filters
//!     .translate(Some(r#"userName eq "bjensen" and active eq true"#), EntityType::User)
//!     .unwrap();
//! assert_eq!(ldap.as_str(), "(&(uid=bjensen)(gluuStatus=active))");
//! ```

pub mod config;
#[cfg(feature = "cli")]
pub mod observability;
pub mod scim;
