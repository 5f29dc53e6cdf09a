use lazy_static::lazy_static;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;

use super::FilterError;

lazy_static! {
    // Plain SQL identifiers only; anything else could smuggle SQL into a predicate
    static ref COLUMN_NAME_REGEX: Regex =
        Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("column name pattern is valid");
}

/// A column name that passed the identifier allow-list.
///
/// Filter compilation only accepts `Column`, so every identifier interpolated
/// into SQL has been checked exactly once, at parse time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Column(String);

impl Column {
    pub fn parse(name: &str) -> Result<Self, FilterError> {
        if COLUMN_NAME_REGEX.is_match(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(FilterError::InvalidFilterColumn(name.to_string()))
        }
    }

    /// Columns named in source code (bucket definitions, scopes).
    pub(crate) fn known(name: &'static str) -> Self {
        debug_assert!(COLUMN_NAME_REGEX.is_match(name), "bad column literal {name}");
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Column {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_identifiers() {
        for name in ["response_code", "_private", "Depth2", "a"] {
            assert_eq!(Column::parse(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn test_rejects_everything_else() {
        for name in [
            "",
            "2depth",
            "response code",
            "id; DROP TABLE pages",
            "pages.id",
            "og_title--",
            "\"quoted\"",
        ] {
            assert!(
                matches!(Column::parse(name), Err(FilterError::InvalidFilterColumn(_))),
                "{name:?} should be rejected"
            );
        }
    }
}
