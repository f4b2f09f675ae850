//! The RFC 4314 rights vocabulary.
//!
//! A [`Rights`] value is a bit set over the eleven [`Right`]s. The canonical
//! textual form lists one character per right in [`Right::ALL`] order, so
//! `Rights::parse(&r.to_string()) == Ok(r)` holds for every value.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// A single mailbox right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Right {
    /// `a`: administer (perform SETACL/DELETEACL/GETACL/LISTRIGHTS).
    Administer,
    /// `e`: perform EXPUNGE and expunge as part of CLOSE.
    PerformExpunge,
    /// `i`: insert (APPEND, COPY into mailbox).
    Insert,
    /// `k`: create mailboxes below this one.
    CreateMailbox,
    /// `l`: lookup (mailbox is visible to LIST/LSUB).
    Lookup,
    /// `p`: post (send mail to submission address for mailbox).
    Post,
    /// `r`: read (SELECT, EXAMINE, STATUS, FETCH, SEARCH, COPY from mailbox).
    Read,
    /// `s`: keep seen/unseen information across sessions.
    WriteSeenFlag,
    /// `t`: set or clear the \Deleted flag.
    DeleteMessages,
    /// `w`: set or clear flags other than \Seen and \Deleted.
    Write,
    /// `x`: delete or rename the mailbox itself.
    DeleteMailbox,
}

impl Right {
    /// Every supported right, in canonical serialization order.
    pub const ALL: [Right; 11] = [
        Right::Administer,
        Right::PerformExpunge,
        Right::Insert,
        Right::CreateMailbox,
        Right::Lookup,
        Right::Post,
        Right::Read,
        Right::WriteSeenFlag,
        Right::DeleteMessages,
        Right::Write,
        Right::DeleteMailbox,
    ];

    /// The RFC 4314 character for this right.
    pub const fn as_char(self) -> char {
        match self {
            Right::Administer => 'a',
            Right::PerformExpunge => 'e',
            Right::Insert => 'i',
            Right::CreateMailbox => 'k',
            Right::Lookup => 'l',
            Right::Post => 'p',
            Right::Read => 'r',
            Right::WriteSeenFlag => 's',
            Right::DeleteMessages => 't',
            Right::Write => 'w',
            Right::DeleteMailbox => 'x',
        }
    }

    /// Look up the right for a canonical character.
    pub fn from_char(ch: char) -> Option<Right> {
        Right::ALL.iter().copied().find(|r| r.as_char() == ch)
    }

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Right {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A set of [`Right`]s.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Rights(u16);

impl Rights {
    /// No rights at all.
    pub const EMPTY: Rights = Rights(0);

    /// Every supported right.
    pub const FULL: Rights = Rights((1 << Right::ALL.len()) - 1);

    /// Build a set from a slice of rights.
    pub fn of(rights: &[Right]) -> Self {
        rights.iter().copied().collect()
    }

    /// Parse the canonical textual form.
    ///
    /// Every character must be one of the eleven supported rights; anything
    /// else (including the obsolete `c` and `d`) is
    /// [`CoreError::MalformedRights`]. Duplicates and ordering are tolerated.
    pub fn parse(s: &str) -> Result<Self> {
        s.chars()
            .map(|ch| {
                Right::from_char(ch).ok_or_else(|| CoreError::MalformedRights {
                    input: s.to_string(),
                    ch,
                })
            })
            .collect()
    }

    /// Parse rights supplied by a client in an RFC 4314 command.
    ///
    /// The obsolete RFC 2086 rights are expanded: `c` becomes `kx` and `d`
    /// becomes `etx`. Other lowercase letters and digits are valid right
    /// syntax this server does not implement and fail with
    /// [`CoreError::UnsupportedRight`]; everything else is malformed.
    pub fn parse_rfc4314(s: &str) -> Result<Self> {
        let mut rights = Rights::EMPTY;
        for ch in s.chars() {
            let expanded = match ch {
                'c' => Rights::of(&[Right::CreateMailbox, Right::DeleteMailbox]),
                'd' => Rights::of(&[
                    Right::PerformExpunge,
                    Right::DeleteMessages,
                    Right::DeleteMailbox,
                ]),
                _ => match Right::from_char(ch) {
                    Some(right) => Rights(right.bit()),
                    None if ch.is_ascii_lowercase() || ch.is_ascii_digit() => {
                        return Err(CoreError::UnsupportedRight(ch));
                    }
                    None => {
                        return Err(CoreError::MalformedRights {
                            input: s.to_string(),
                            ch,
                        });
                    }
                },
            };
            rights = rights.union(expanded);
        }
        Ok(rights)
    }

    /// All rights present in either set.
    pub const fn union(self, other: Rights) -> Rights {
        Rights(self.0 | other.0)
    }

    /// The rights of `self` that are not in `other`.
    pub const fn except(self, other: Rights) -> Rights {
        Rights(self.0 & !other.0)
    }

    /// Whether `right` is in the set.
    pub const fn contains(self, right: Right) -> bool {
        self.0 & right.bit() != 0
    }

    /// Whether every right of `other` is in the set.
    pub const fn contains_all(self, other: Rights) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate the rights in canonical order.
    pub fn iter(self) -> impl Iterator<Item = Right> {
        Right::ALL.into_iter().filter(move |r| self.contains(*r))
    }

    /// The canonical textual form.
    pub fn serialize(self) -> String {
        self.iter().map(Right::as_char).collect()
    }
}

impl FromIterator<Right> for Rights {
    fn from_iter<T: IntoIterator<Item = Right>>(iter: T) -> Self {
        Rights(iter.into_iter().fold(0, |bits, r| bits | r.bit()))
    }
}

impl From<Right> for Rights {
    fn from(right: Right) -> Self {
        Rights(right.bit())
    }
}

impl FromStr for Rights {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Rights::parse(s)
    }
}

impl fmt::Display for Rights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Rights::serialize(*self))
    }
}

impl fmt::Debug for Rights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rights({:?})", Rights::serialize(*self))
    }
}

impl Serialize for Rights {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&Rights::serialize(*self))
    }
}

impl<'de> Deserialize<'de> for Rights {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Rights::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_full_rights_serialization() {
        assert_eq!(Rights::FULL.to_string(), "aeiklprstwx");
        assert_eq!(Rights::FULL.len(), 11);
    }

    #[test]
    fn test_parse_is_order_insensitive() {
        let a = Rights::parse("rl").unwrap();
        let b = Rights::parse("lrl").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "lr");
    }

    #[test]
    fn test_parse_rejects_unknown_character() {
        let err = Rights::parse("lrZ").unwrap_err();
        assert_eq!(
            err,
            CoreError::MalformedRights {
                input: "lrZ".into(),
                ch: 'Z'
            }
        );
    }

    #[test]
    fn test_canonical_parse_rejects_legacy_rights() {
        assert!(matches!(
            Rights::parse("c"),
            Err(CoreError::MalformedRights { ch: 'c', .. })
        ));
    }

    #[test]
    fn test_rfc4314_expands_legacy_rights() {
        assert_eq!(Rights::parse_rfc4314("c").unwrap().to_string(), "kx");
        assert_eq!(Rights::parse_rfc4314("d").unwrap().to_string(), "etx");
        assert_eq!(Rights::parse_rfc4314("rd").unwrap().to_string(), "ertx");
    }

    #[test]
    fn test_rfc4314_unsupported_vs_malformed() {
        assert_eq!(
            Rights::parse_rfc4314("rz"),
            Err(CoreError::UnsupportedRight('z'))
        );
        assert_eq!(
            Rights::parse_rfc4314("r7"),
            Err(CoreError::UnsupportedRight('7'))
        );
        assert!(matches!(
            Rights::parse_rfc4314("r*"),
            Err(CoreError::MalformedRights { ch: '*', .. })
        ));
    }

    #[test]
    fn test_set_operations() {
        let lr = Rights::of(&[Right::Lookup, Right::Read]);
        let ra = Rights::of(&[Right::Read, Right::Administer]);

        assert_eq!(lr.union(ra).to_string(), "alr");
        assert_eq!(lr.except(ra).to_string(), "l");
        assert!(lr.contains(Right::Read));
        assert!(!lr.contains(Right::Administer));
        assert!(Rights::FULL.contains_all(lr));
        assert!(!lr.contains_all(ra));
        assert!(lr.except(lr).is_empty());
    }

    #[test]
    fn test_serde_as_string() {
        let rights = Rights::parse("alr").unwrap();
        let json = serde_json::to_string(&rights).unwrap();
        assert_eq!(json, "\"alr\"");
        let back: Rights = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rights);
    }

    proptest! {
        #[test]
        fn prop_parse_serialize_roundtrip(bits in 0u16..(1 << 11)) {
            let rights = Rights(bits);
            prop_assert_eq!(Rights::parse(&rights.serialize()).unwrap(), rights);
        }

        #[test]
        fn prop_union_then_except_removes(a in 0u16..(1 << 11), b in 0u16..(1 << 11)) {
            let (a, b) = (Rights(a), Rights(b));
            prop_assert!(a.union(b).contains_all(a));
            prop_assert!(a.union(b).except(b).contains_all(a.except(b)));
            prop_assert_eq!(a.union(b).except(b), a.except(b));
        }
    }
}
