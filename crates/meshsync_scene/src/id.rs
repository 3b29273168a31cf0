//! Session identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Id value meaning "unassigned"
pub const INVALID_ID: i32 = -1;

/// Session-scoped handle plus name of a scene object.
///
/// The numeric `id` is only meaningful for the lifetime of a session; the
/// name is used as a fallback when the receiver never assigned an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    pub id: i32,
    pub name: String,
}

impl Identifier {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }

    /// Identifier carrying only a name
    pub fn from_name(name: impl Into<String>) -> Self {
        Self::new(INVALID_ID, name)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.id != INVALID_ID
    }
}

impl Default for Identifier {
    fn default() -> Self {
        Self::from_name(String::new())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}#{}", self.name, self.id)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_invalid() {
        let id = Identifier::default();
        assert!(!id.is_valid());
        assert_eq!(id.id, INVALID_ID);
    }

    #[test]
    fn test_display() {
        assert_eq!(Identifier::new(3, "cube").to_string(), "cube#3");
        assert_eq!(Identifier::from_name("cube").to_string(), "cube");
    }
}
