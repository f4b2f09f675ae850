//! Mailbox ACLs and the commands that edit them.
//!
//! A [`MailboxAcl`] is an immutable value. Editing returns a new ACL, and an
//! entry whose rights become empty is pruned, so `get` never yields an empty
//! [`Rights`].

use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::entry::EntryKey;
use crate::error::Result;
use crate::rights::Rights;

/// How a command combines with the rights already present for its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditMode {
    Add,
    Remove,
    Replace,
}

/// A single ACL mutation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclCommand {
    pub key: EntryKey,
    pub mode: EditMode,
    pub rights: Rights,
}

impl AclCommand {
    pub fn new(key: EntryKey, mode: EditMode, rights: Rights) -> Self {
        Self { key, mode, rights }
    }

    pub fn add(key: EntryKey, rights: Rights) -> Self {
        Self::new(key, EditMode::Add, rights)
    }

    pub fn remove(key: EntryKey, rights: Rights) -> Self {
        Self::new(key, EditMode::Remove, rights)
    }

    pub fn replace(key: EntryKey, rights: Rights) -> Self {
        Self::new(key, EditMode::Replace, rights)
    }

    /// Parse the arguments of an IMAP `SETACL` command.
    ///
    /// `modification` is the rights string, optionally prefixed with `+`
    /// (add) or `-` (remove); without a prefix it replaces. Rights go through
    /// [`Rights::parse_rfc4314`], so unsupported rights are reported here,
    /// before the command reaches any ACL.
    pub fn parse(identifier: &str, modification: &str) -> Result<Self> {
        let key = EntryKey::parse(identifier)?;
        let (mode, rights) = if let Some(rest) = modification.strip_prefix('+') {
            (EditMode::Add, rest)
        } else if let Some(rest) = modification.strip_prefix('-') {
            (EditMode::Remove, rest)
        } else {
            (EditMode::Replace, modification)
        };
        Ok(Self::new(key, mode, Rights::parse_rfc4314(rights)?))
    }
}

/// The access control list of one mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MailboxAcl {
    entries: BTreeMap<EntryKey, Rights>,
}

impl MailboxAcl {
    /// The ACL with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Owner gets every right; the default for a new personal mailbox.
    pub fn owner_full() -> Self {
        Self::from_entries([(EntryKey::owner(), Rights::FULL)])
    }

    /// Build an ACL, dropping entries with empty rights.
    ///
    /// If a key repeats, the last occurrence wins.
    pub fn from_entries(entries: impl IntoIterator<Item = (EntryKey, Rights)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .filter(|(_, rights)| !rights.is_empty())
                .collect(),
        }
    }

    /// The rights held by `key`, if it has an entry.
    pub fn get(&self, key: &EntryKey) -> Option<Rights> {
        self.entries.get(key).copied()
    }

    /// Entries in key order.
    pub fn entries(&self) -> btree_map::Iter<'_, EntryKey, Rights> {
        self.entries.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, EntryKey, Rights> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply a command, returning the edited ACL.
    ///
    /// A key without an entry behaves as if it held empty rights.
    pub fn apply(&self, command: &AclCommand) -> MailboxAcl {
        let existing = self.get(&command.key).unwrap_or(Rights::EMPTY);
        let updated = match command.mode {
            EditMode::Add => existing.union(command.rights),
            EditMode::Remove => existing.except(command.rights),
            EditMode::Replace => command.rights,
        };
        self.with_entry(command.key.clone(), updated)
    }

    /// Set the rights for one key; empty rights remove the entry.
    pub fn with_entry(&self, key: EntryKey, rights: Rights) -> MailboxAcl {
        let mut entries = self.entries.clone();
        if rights.is_empty() {
            entries.remove(&key);
        } else {
            entries.insert(key, rights);
        }
        MailboxAcl { entries }
    }

    /// Entry-wise union: each key holds the rights it has in either ACL.
    pub fn union(&self, other: &MailboxAcl) -> MailboxAcl {
        let mut entries = self.entries.clone();
        for (key, rights) in &other.entries {
            let merged = entries.get(key).copied().unwrap_or(Rights::EMPTY).union(*rights);
            entries.insert(key.clone(), merged);
        }
        MailboxAcl { entries }
    }

    /// Entry-wise subtraction of `other`'s rights from this ACL.
    pub fn except(&self, other: &MailboxAcl) -> MailboxAcl {
        MailboxAcl::from_entries(self.entries.iter().map(|(key, rights)| {
            let removed = other.get(key).unwrap_or(Rights::EMPTY);
            (key.clone(), rights.except(removed))
        }))
    }
}

impl FromIterator<(EntryKey, Rights)> for MailboxAcl {
    fn from_iter<T: IntoIterator<Item = (EntryKey, Rights)>>(iter: T) -> Self {
        MailboxAcl::from_entries(iter)
    }
}

impl<'a> IntoIterator for &'a MailboxAcl {
    type Item = (&'a EntryKey, &'a Rights);
    type IntoIter = btree_map::Iter<'a, EntryKey, Rights>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
