//! In-memory implementation of the store traits.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;

use mailacl_core::{EntryKey, MailboxId, Rights};

use crate::error::{Result, StoreError};
use crate::traits::{AclStore, RightsIndexStore, StoredAcl, INITIAL_VERSION};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; each
/// trait method holds the lock for its whole duration, which makes
/// compare-and-swap atomic.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Versioned ACL records.
    acls: HashMap<MailboxId, StoredAcl>,

    /// Rights index: identity -> mailbox -> rights.
    rights: HashMap<EntryKey, BTreeMap<MailboxId, Rights>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    /// Write raw bytes as a mailbox's record, bypassing any codec.
    ///
    /// Lets tests plant corrupt or hand-crafted records.
    pub fn put_raw_acl(&self, mailbox_id: &MailboxId, acl: &[u8], version: u64) -> Result<()> {
        self.write()?.acls.insert(
            *mailbox_id,
            StoredAcl {
                acl: Bytes::copy_from_slice(acl),
                version,
            },
        );
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AclStore for MemoryStore {
    async fn read_acl(&self, mailbox_id: &MailboxId) -> Result<Option<StoredAcl>> {
        Ok(self.read()?.acls.get(mailbox_id).cloned())
    }

    async fn insert_acl_if_absent(&self, mailbox_id: &MailboxId, acl: &[u8]) -> Result<bool> {
        let mut inner = self.write()?;
        if inner.acls.contains_key(mailbox_id) {
            return Ok(false);
        }
        inner.acls.insert(
            *mailbox_id,
            StoredAcl {
                acl: Bytes::copy_from_slice(acl),
                version: INITIAL_VERSION,
            },
        );
        Ok(true)
    }

    async fn compare_and_swap_acl(
        &self,
        mailbox_id: &MailboxId,
        acl: &[u8],
        new_version: u64,
        expected_version: u64,
    ) -> Result<bool> {
        let mut inner = self.write()?;
        match inner.acls.get_mut(mailbox_id) {
            Some(stored) if stored.version == expected_version => {
                stored.acl = Bytes::copy_from_slice(acl);
                stored.version = new_version;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn overwrite_acl(&self, mailbox_id: &MailboxId, acl: &[u8]) -> Result<()> {
        self.put_raw_acl(mailbox_id, acl, INITIAL_VERSION)
    }
}

#[async_trait]
impl RightsIndexStore for MemoryStore {
    async fn upsert_rights(
        &self,
        identity: &EntryKey,
        mailbox_id: &MailboxId,
        rights: Rights,
    ) -> Result<()> {
        self.write()?
            .rights
            .entry(identity.clone())
            .or_default()
            .insert(*mailbox_id, rights);
        Ok(())
    }

    async fn delete_rights(&self, identity: &EntryKey, mailbox_id: &MailboxId) -> Result<()> {
        let mut inner = self.write()?;
        let now_empty = match inner.rights.get_mut(identity) {
            Some(mailboxes) => {
                mailboxes.remove(mailbox_id);
                mailboxes.is_empty()
            }
            None => false,
        };
        if now_empty {
            inner.rights.remove(identity);
        }
        Ok(())
    }

    async fn retrieve_rights(
        &self,
        identity: &EntryKey,
        mailbox_id: &MailboxId,
    ) -> Result<Option<Rights>> {
        Ok(self
            .read()?
            .rights
            .get(identity)
            .and_then(|mailboxes| mailboxes.get(mailbox_id))
            .copied())
    }

    async fn list_rights_for_identity(
        &self,
        identity: &EntryKey,
    ) -> Result<BTreeMap<MailboxId, Rights>> {
        Ok(self.read()?.rights.get(identity).cloned().unwrap_or_default())
    }

    async fn list_rights_for_mailbox(
        &self,
        mailbox_id: &MailboxId,
    ) -> Result<BTreeMap<EntryKey, Rights>> {
        let inner = self.read()?;
        Ok(inner
            .rights
            .iter()
            .filter_map(|(identity, mailboxes)| {
                mailboxes
                    .get(mailbox_id)
                    .map(|rights| (identity.clone(), *rights))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bob() -> EntryKey {
        EntryKey::user("bob").unwrap()
    }

    #[tokio::test]
    async fn test_insert_if_absent_only_once() {
        let store = MemoryStore::new();
        let mailbox = MailboxId::generate();

        assert!(store.insert_acl_if_absent(&mailbox, b"first").await.unwrap());
        assert!(!store.insert_acl_if_absent(&mailbox, b"second").await.unwrap());

        let stored = store.read_acl(&mailbox).await.unwrap().unwrap();
        assert_eq!(stored.acl.as_ref(), b"first");
        assert_eq!(stored.version, INITIAL_VERSION);
    }

    #[tokio::test]
    async fn test_compare_and_swap_checks_version() {
        let store = MemoryStore::new();
        let mailbox = MailboxId::generate();
        store.insert_acl_if_absent(&mailbox, b"v0").await.unwrap();

        assert!(!store.compare_and_swap_acl(&mailbox, b"stale", 6, 5).await.unwrap());
        assert!(store.compare_and_swap_acl(&mailbox, b"v1", 1, 0).await.unwrap());
        assert!(!store.compare_and_swap_acl(&mailbox, b"again", 1, 0).await.unwrap());

        let stored = store.read_acl(&mailbox).await.unwrap().unwrap();
        assert_eq!(stored.acl.as_ref(), b"v1");
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_compare_and_swap_on_missing_record_fails() {
        let store = MemoryStore::new();
        let mailbox = MailboxId::generate();
        assert!(!store.compare_and_swap_acl(&mailbox, b"x", 1, 0).await.unwrap());
        assert!(store.read_acl(&mailbox).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_resets_version() {
        let store = MemoryStore::new();
        let mailbox = MailboxId::generate();
        store.put_raw_acl(&mailbox, b"old", 7).unwrap();

        store.overwrite_acl(&mailbox, b"new").await.unwrap();
        let stored = store.read_acl(&mailbox).await.unwrap().unwrap();
        assert_eq!(stored.version, INITIAL_VERSION);
        assert_eq!(stored.acl.as_ref(), b"new");
    }

    #[tokio::test]
    async fn test_rights_rows() {
        let store = MemoryStore::new();
        let inbox = MailboxId::generate();
        let sent = MailboxId::generate();
        let rights = Rights::parse("lr").unwrap();

        store.upsert_rights(&bob(), &inbox, rights).await.unwrap();
        store.upsert_rights(&bob(), &sent, Rights::FULL).await.unwrap();
        store.upsert_rights(&bob().negate(), &inbox, rights).await.unwrap();

        assert_eq!(store.retrieve_rights(&bob(), &inbox).await.unwrap(), Some(rights));
        assert_eq!(store.list_rights_for_identity(&bob()).await.unwrap().len(), 2);
        assert_eq!(store.list_rights_for_mailbox(&inbox).await.unwrap().len(), 2);

        store.delete_rights(&bob(), &inbox).await.unwrap();
        store.delete_rights(&bob(), &inbox).await.unwrap();
        assert_eq!(store.retrieve_rights(&bob(), &inbox).await.unwrap(), None);
        assert_eq!(
            store.retrieve_rights(&bob().negate(), &inbox).await.unwrap(),
            Some(rights)
        );
    }

    #[tokio::test]
    async fn test_list_for_unknown_identity_is_empty() {
        let store = MemoryStore::new();
        assert!(store.list_rights_for_identity(&bob()).await.unwrap().is_empty());
    }
}
