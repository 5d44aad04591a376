//! Identity types for Teable entities
//!
//! Teable identifiers are opaque prefixed strings (`tbl...`, `fld...`,
//! `rec...`, `bse...`). Each kind gets its own newtype so a record id can
//! never be passed where a field id is expected.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Common behaviour for string-backed entity identifiers.
pub trait EntityIdType:
    Clone + Eq + std::hash::Hash + fmt::Display + AsRef<str> + From<String>
{
    /// Prefix Teable uses for this identifier kind.
    const PREFIX: &'static str;

    /// True if the identifier carries the expected prefix.
    fn has_expected_prefix(&self) -> bool {
        self.as_ref().starts_with(Self::PREFIX)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the raw identifier.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl EntityIdType for $name {
            const PREFIX: &'static str = $prefix;
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of a table (`tbl...`).
    TableId,
    "tbl"
);
string_id!(
    /// Identifier of a field, i.e. a column (`fld...`).
    FieldId,
    "fld"
);
string_id!(
    /// Identifier of a record, i.e. a row (`rec...`).
    RecordId,
    "rec"
);
string_id!(
    /// Identifier of a base, the container of tables (`bse...`).
    BaseId,
    "bse"
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_display_is_raw_string() {
        let id = FieldId::new("fldName");
        assert_eq!(id.to_string(), "fldName");
        assert_eq!(id.as_str(), "fldName");
    }

    #[test]
    fn test_prefix_check() {
        assert!(TableId::from("tblAbc").has_expected_prefix());
        assert!(!RecordId::from("tblAbc").has_expected_prefix());
    }

    #[test]
    fn test_lookup_by_str_through_borrow() {
        let mut map = HashMap::new();
        map.insert(RecordId::from("rec1"), 1);
        assert_eq!(map.get("rec1"), Some(&1));
    }

    #[test]
    fn test_serde_transparent() {
        let id = FieldId::from("fld1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"fld1\"");
        let back: FieldId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
