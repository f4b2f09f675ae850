//! ACL entry keys: who an entry applies to, and whether it grants or denies.
//!
//! The textual form is the RFC 4314 identifier as it appears on the wire:
//!
//! - `bob` names the user `bob`
//! - `$staff` names the group `staff`
//! - `owner`, `anyone` and `authenticated` name special principals
//! - a leading `-` marks a negative (deny) entry, e.g. `-bob`

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

const NEGATIVE_MARKER: char = '-';
const GROUP_MARKER: char = '$';

/// The special principal names.
pub mod special {
    pub const OWNER: &str = "owner";
    pub const ANYONE: &str = "anyone";
    pub const AUTHENTICATED: &str = "authenticated";

    pub(crate) fn is_special(name: &str) -> bool {
        matches!(name, OWNER | ANYONE | AUTHENTICATED)
    }
}

/// The kind of principal an entry key names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NameType {
    User,
    Group,
    Special,
}

/// Identifies the principal of an ACL entry.
///
/// Two keys are equal iff name, kind and polarity all match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryKey {
    name: String,
    name_type: NameType,
    negative: bool,
}

impl EntryKey {
    /// Build a key, rejecting names that cannot be represented.
    pub fn new(name: impl Into<String>, name_type: NameType, negative: bool) -> Result<Self> {
        let name = name.into();
        let valid = match name_type {
            NameType::Special => special::is_special(&name),
            NameType::User => {
                !name.is_empty()
                    && !name.starts_with(NEGATIVE_MARKER)
                    && !name.starts_with(GROUP_MARKER)
                    && !special::is_special(&name)
            }
            NameType::Group => !name.is_empty(),
        };
        if !valid {
            return Err(CoreError::InvalidEntryKey(name));
        }
        Ok(Self {
            name,
            name_type,
            negative,
        })
    }

    /// A positive entry for a user.
    pub fn user(name: impl Into<String>) -> Result<Self> {
        Self::new(name, NameType::User, false)
    }

    /// A positive entry for a group.
    pub fn group(name: impl Into<String>) -> Result<Self> {
        Self::new(name, NameType::Group, false)
    }

    pub fn owner() -> Self {
        Self::special(special::OWNER)
    }

    pub fn anyone() -> Self {
        Self::special(special::ANYONE)
    }

    pub fn authenticated() -> Self {
        Self::special(special::AUTHENTICATED)
    }

    fn special(name: &str) -> Self {
        Self {
            name: name.to_string(),
            name_type: NameType::Special,
            negative: false,
        }
    }

    /// The same principal with the opposite polarity.
    pub fn negate(&self) -> Self {
        Self {
            negative: !self.negative,
            ..self.clone()
        }
    }

    /// Parse the RFC 4314 identifier form.
    pub fn parse(s: &str) -> Result<Self> {
        let (negative, rest) = match s.strip_prefix(NEGATIVE_MARKER) {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (name, name_type) = if let Some(group) = rest.strip_prefix(GROUP_MARKER) {
            (group, NameType::Group)
        } else if special::is_special(rest) {
            (rest, NameType::Special)
        } else {
            (rest, NameType::User)
        };

        Self::new(name, name_type, negative).map_err(|_| CoreError::InvalidEntryKey(s.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_type(&self) -> NameType {
        self.name_type
    }

    /// Whether this entry denies rather than grants.
    pub fn is_negative(&self) -> bool {
        self.negative
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "{}", NEGATIVE_MARKER)?;
        }
        if self.name_type == NameType::Group {
            write!(f, "{}", GROUP_MARKER)?;
        }
        f.write_str(&self.name)
    }
}

impl FromStr for EntryKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        EntryKey::parse(s)
    }
}

impl Serialize for EntryKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntryKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        EntryKey::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user() {
        let key = EntryKey::parse("bob").unwrap();
        assert_eq!(key.name(), "bob");
        assert_eq!(key.name_type(), NameType::User);
        assert!(!key.is_negative());
    }

    #[test]
    fn test_parse_negative_group() {
        let key = EntryKey::parse("-$staff").unwrap();
        assert_eq!(key.name(), "staff");
        assert_eq!(key.name_type(), NameType::Group);
        assert!(key.is_negative());
        assert_eq!(key.to_string(), "-$staff");
    }

    #[test]
    fn test_parse_specials() {
        assert_eq!(EntryKey::parse("owner").unwrap(), EntryKey::owner());
        assert_eq!(EntryKey::parse("anyone").unwrap(), EntryKey::anyone());
        assert_eq!(
            EntryKey::parse("-authenticated").unwrap(),
            EntryKey::authenticated().negate()
        );
    }

    #[test]
    fn test_polarity_distinguishes_keys() {
        let bob = EntryKey::user("bob").unwrap();
        assert_ne!(bob, bob.negate());
        assert_eq!(bob, bob.negate().negate());
    }

    #[test]
    fn test_user_and_group_with_same_name_differ() {
        assert_ne!(
            EntryKey::user("staff").unwrap(),
            EntryKey::group("staff").unwrap()
        );
    }

    #[test]
    fn test_rejects_empty_names() {
        assert!(EntryKey::parse("").is_err());
        assert!(EntryKey::parse("-").is_err());
        assert!(EntryKey::parse("$").is_err());
        assert!(EntryKey::parse("--bob").is_err());
    }

    #[test]
    fn test_special_name_is_not_a_user() {
        assert!(EntryKey::user("owner").is_err());
        assert!(EntryKey::new("bob", NameType::Special, false).is_err());
    }
}
