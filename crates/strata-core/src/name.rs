//! Validated name segments for the catalog namespace.
//!
//! Every level of the namespace hierarchy (metalake, catalog, schema,
//! object) is addressed by a [`Name`]: a non-empty identifier matching
//! `[a-zA-Z_][a-zA-Z0-9_]*`. Validation happens at construction so the rest
//! of the system can treat names as well-formed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Maximum length for a single name segment.
pub const MAX_NAME_LEN: usize = 128;

/// A validated name segment.
///
/// Names must be:
/// - Non-empty, at most [`MAX_NAME_LEN`] characters
/// - ASCII letters, digits, and underscores
/// - Starting with a letter or underscore
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name(String);

impl Name {
    /// Creates a new name after validating the format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the name is malformed.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Creates a name without validation.
    ///
    /// Intended for names that have already been validated (e.g., read back
    /// from storage).
    #[must_use]
    pub fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::validation("name cannot be empty"));
        }

        if name.len() > MAX_NAME_LEN {
            return Err(Error::validation(format!(
                "name '{name}' is too long (maximum {MAX_NAME_LEN} characters)"
            )));
        }

        let mut chars = name.chars();
        // Non-empty checked above.
        let first = chars.next().unwrap_or('_');
        if !(first.is_ascii_alphabetic() || first == '_') {
            return Err(Error::validation(format!(
                "name '{name}' must start with a letter or underscore"
            )));
        }

        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::validation(format!(
                "name '{name}' contains invalid characters (only letters, digits, and underscores allowed)"
            )));
        }

        Ok(())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(Name::new("sales").is_ok());
        assert!(Name::new("_internal").is_ok());
        assert!(Name::new("t1").is_ok());
        assert!(Name::new("Orders_2024").is_ok());
    }

    #[test]
    fn invalid_names() {
        assert!(Name::new("").is_err());
        assert!(Name::new("1table").is_err());
        assert!(Name::new("has space").is_err());
        assert!(Name::new("dash-ed").is_err());
        assert!(Name::new("dot.ted").is_err());
        assert!(Name::new("a".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn display_and_parse_roundtrip() {
        let name: Name = "warehouse".parse().unwrap();
        assert_eq!(name.to_string(), "warehouse");
        assert_eq!(name.as_str(), "warehouse");
    }
}
