//! Store traits: the abstract interface for ACL persistence.
//!
//! The ACL subsystem only needs single-row primitives from its backing store:
//! a versioned record per mailbox with compare-and-swap, and a flat table of
//! rights index rows. Nothing here requires multi-row transactions.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use mailacl_core::{EntryKey, MailboxId, Rights};

use crate::error::Result;

/// Version written by the first insert and by every reset.
pub const INITIAL_VERSION: u64 = 0;

/// A stored ACL record: encoded ACL bytes plus their version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAcl {
    /// The encoded ACL, opaque to the store.
    pub acl: Bytes,
    /// Incremented by exactly one on every successful compare-and-swap.
    pub version: u64,
}

/// Versioned ACL records, one per mailbox.
///
/// Conflicts are reported as `Ok(false)`. `Err` is reserved for the store
/// itself failing.
#[async_trait]
pub trait AclStore: Send + Sync {
    /// Read the current record of a mailbox.
    async fn read_acl(&self, mailbox_id: &MailboxId) -> Result<Option<StoredAcl>>;

    /// Create the record at [`INITIAL_VERSION`] unless one already exists.
    ///
    /// Returns `false` if a record was already present.
    async fn insert_acl_if_absent(&self, mailbox_id: &MailboxId, acl: &[u8]) -> Result<bool>;

    /// Replace the record only if its version is still `expected_version`.
    ///
    /// Returns `false` on version mismatch or if the record vanished.
    async fn compare_and_swap_acl(
        &self,
        mailbox_id: &MailboxId,
        acl: &[u8],
        new_version: u64,
        expected_version: u64,
    ) -> Result<bool>;

    /// Unconditionally write the record at [`INITIAL_VERSION`].
    async fn overwrite_acl(&self, mailbox_id: &MailboxId, acl: &[u8]) -> Result<()>;
}

/// The denormalized rights index: `(identity, mailbox) -> rights`.
///
/// A row exists only while the identity holds non-empty rights on the
/// mailbox. Identities are full entry keys, so a negative entry has its own
/// row next to the positive one.
#[async_trait]
pub trait RightsIndexStore: Send + Sync {
    /// Insert or replace a row.
    async fn upsert_rights(
        &self,
        identity: &EntryKey,
        mailbox_id: &MailboxId,
        rights: Rights,
    ) -> Result<()>;

    /// Delete a row. Deleting an absent row is not an error.
    async fn delete_rights(&self, identity: &EntryKey, mailbox_id: &MailboxId) -> Result<()>;

    /// Get the rights of one identity on one mailbox.
    async fn retrieve_rights(
        &self,
        identity: &EntryKey,
        mailbox_id: &MailboxId,
    ) -> Result<Option<Rights>>;

    /// All mailboxes an identity has rights on.
    async fn list_rights_for_identity(
        &self,
        identity: &EntryKey,
    ) -> Result<BTreeMap<MailboxId, Rights>>;

    /// All identities with rights on a mailbox.
    ///
    /// Used by repair sweeps, not by the update path.
    async fn list_rights_for_mailbox(
        &self,
        mailbox_id: &MailboxId,
    ) -> Result<BTreeMap<EntryKey, Rights>>;
}
