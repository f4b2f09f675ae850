//! Entry-level differences between two ACLs.
//!
//! The diff drives rights index maintenance and change notification, so
//! consumers never have to compare ACLs themselves.

use crate::acl::MailboxAcl;
use crate::entry::EntryKey;
use crate::rights::Rights;

/// What happened to one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Changed,
}

/// One changed entry. At least one side is present, and the two sides differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryChange {
    pub key: EntryKey,
    pub old: Option<Rights>,
    pub new: Option<Rights>,
}

impl EntryChange {
    pub fn kind(&self) -> ChangeKind {
        match (self.old, self.new) {
            (None, _) => ChangeKind::Added,
            (_, None) => ChangeKind::Removed,
            _ => ChangeKind::Changed,
        }
    }
}

/// The changes turning `old_acl` into `new_acl`, ordered by entry key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclDiff {
    old_acl: MailboxAcl,
    new_acl: MailboxAcl,
    changes: Vec<EntryChange>,
}

impl AclDiff {
    /// Compare two ACLs.
    ///
    /// Walks both key sets once, in order, so the output is deterministic.
    pub fn compute(old_acl: &MailboxAcl, new_acl: &MailboxAcl) -> AclDiff {
        let mut changes = Vec::new();
        let mut old_iter = old_acl.entries().peekable();
        let mut new_iter = new_acl.entries().peekable();

        loop {
            let change = match (old_iter.peek(), new_iter.peek()) {
                (None, None) => break,
                (Some((key, rights)), None) => {
                    let change = removed(key, **rights);
                    old_iter.next();
                    Some(change)
                }
                (None, Some((key, rights))) => {
                    let change = added(key, **rights);
                    new_iter.next();
                    Some(change)
                }
                (Some((old_key, old_rights)), Some((new_key, new_rights))) => {
                    match old_key.cmp(new_key) {
                        std::cmp::Ordering::Less => {
                            let change = removed(old_key, **old_rights);
                            old_iter.next();
                            Some(change)
                        }
                        std::cmp::Ordering::Greater => {
                            let change = added(new_key, **new_rights);
                            new_iter.next();
                            Some(change)
                        }
                        std::cmp::Ordering::Equal => {
                            let change = (old_rights != new_rights).then(|| EntryChange {
                                key: (*old_key).clone(),
                                old: Some(**old_rights),
                                new: Some(**new_rights),
                            });
                            old_iter.next();
                            new_iter.next();
                            change
                        }
                    }
                }
            };
            changes.extend(change);
        }

        AclDiff {
            old_acl: old_acl.clone(),
            new_acl: new_acl.clone(),
            changes,
        }
    }

    pub fn old_acl(&self) -> &MailboxAcl {
        &self.old_acl
    }

    pub fn new_acl(&self) -> &MailboxAcl {
        &self.new_acl
    }

    pub fn changes(&self) -> &[EntryChange] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn added(&self) -> impl Iterator<Item = &EntryChange> {
        self.of_kind(ChangeKind::Added)
    }

    pub fn removed(&self) -> impl Iterator<Item = &EntryChange> {
        self.of_kind(ChangeKind::Removed)
    }

    pub fn changed(&self) -> impl Iterator<Item = &EntryChange> {
        self.of_kind(ChangeKind::Changed)
    }

    fn of_kind(&self, kind: ChangeKind) -> impl Iterator<Item = &EntryChange> {
        self.changes.iter().filter(move |c| c.kind() == kind)
    }

    /// Replay the changes onto `base` with upsert/delete semantics.
    ///
    /// `diff.apply_to(diff.old_acl()) == *diff.new_acl()` always holds.
    pub fn apply_to(&self, base: &MailboxAcl) -> MailboxAcl {
        self.changes.iter().fold(base.clone(), |acl, change| {
            acl.with_entry(change.key.clone(), change.new.unwrap_or(Rights::EMPTY))
        })
    }
}

fn added(key: &EntryKey, rights: Rights) -> EntryChange {
    EntryChange {
        key: key.clone(),
        old: None,
        new: Some(rights),
    }
}

fn removed(key: &EntryKey, rights: Rights) -> EntryChange {
    EntryChange {
        key: key.clone(),
        old: Some(rights),
        new: None,
    }
}
