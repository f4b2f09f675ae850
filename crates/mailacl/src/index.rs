//! The rights-by-identity index maintainer.
//!
//! The index is a denormalized view of every mailbox ACL, keyed the other way
//! round: for an identity, which mailboxes does it have rights on. It is
//! derived data. The mapper feeds it the diff of every committed update, and
//! [`RightsIndex::repair`] rebuilds one mailbox's rows from its primary ACL.
//!
//! Negative entries get their own rows (`-bob` next to `bob`). Combining them
//! into effective rights is left to the reader.

use std::collections::BTreeMap;
use std::sync::Arc;

use mailacl_core::{AclDiff, EntryKey, MailboxAcl, MailboxId, Rights};
use mailacl_store::RightsIndexStore;

use crate::error::Result;

/// Maintains and queries the rights index.
pub struct RightsIndex<I: RightsIndexStore> {
    store: Arc<I>,
}

impl<I: RightsIndexStore> RightsIndex<I> {
    pub fn new(store: Arc<I>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &I {
        &self.store
    }

    /// Apply the changes of one diff to a mailbox's rows.
    ///
    /// Removed entries delete their row, everything else is upserted with the
    /// new rights. Applying the same diff again leaves the index unchanged.
    pub async fn apply_diff(&self, mailbox_id: &MailboxId, diff: &AclDiff) -> Result<()> {
        for change in diff.changes() {
            match change.new {
                Some(rights) if !rights.is_empty() => {
                    self.store
                        .upsert_rights(&change.key, mailbox_id, rights)
                        .await?;
                }
                _ => {
                    self.store.delete_rights(&change.key, mailbox_id).await?;
                }
            }
        }
        Ok(())
    }

    /// Rights of one identity on one mailbox, if any.
    pub async fn retrieve(
        &self,
        identity: &EntryKey,
        mailbox_id: &MailboxId,
    ) -> Result<Option<Rights>> {
        Ok(self.store.retrieve_rights(identity, mailbox_id).await?)
    }

    /// Every mailbox the identity has an entry on. Empty if none.
    pub async fn list_rights_for_identity(
        &self,
        identity: &EntryKey,
    ) -> Result<BTreeMap<MailboxId, Rights>> {
        Ok(self.store.list_rights_for_identity(identity).await?)
    }

    /// Shorthand for the positive entry of the user `name`.
    ///
    /// A name that cannot be a user, such as `owner` or `$staff`, holds no
    /// user entry anywhere, so the result is empty. Use [`list_rights_for_identity`](Self::list_rights_for_identity)
    /// for the special identifiers.
    pub async fn list_rights_for_user(&self, name: &str) -> Result<BTreeMap<MailboxId, Rights>> {
        match EntryKey::user(name) {
            Ok(identity) => self.list_rights_for_identity(&identity).await,
            Err(_) => Ok(BTreeMap::new()),
        }
    }

    /// Bring a mailbox's rows in line with its primary ACL.
    ///
    /// Returns the diff between what the index held and `acl`; an empty diff
    /// means the rows were already correct.
    pub async fn repair(&self, mailbox_id: &MailboxId, acl: &MailboxAcl) -> Result<AclDiff> {
        let rows = self.store.list_rights_for_mailbox(mailbox_id).await?;
        let indexed = MailboxAcl::from_entries(rows);
        let diff = AclDiff::compute(&indexed, acl);

        if !diff.is_empty() {
            tracing::debug!(
                mailbox = %mailbox_id,
                changes = diff.changes().len(),
                "repairing rights index"
            );
            self.apply_diff(mailbox_id, &diff).await?;
        }

        Ok(diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailacl_core::AclCommand;
    use mailacl_store::MemoryStore;

    fn bob() -> EntryKey {
        EntryKey::user("bob").unwrap()
    }

    fn lr() -> Rights {
        Rights::parse("lr").unwrap()
    }

    fn index() -> RightsIndex<MemoryStore> {
        RightsIndex::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_apply_diff_upserts_and_deletes() {
        let index = index();
        let mailbox = MailboxId::generate();

        let empty = MailboxAcl::empty();
        let granted = empty.apply(&AclCommand::add(bob(), lr()));
        index
            .apply_diff(&mailbox, &AclDiff::compute(&empty, &granted))
            .await
            .unwrap();
        assert_eq!(index.retrieve(&bob(), &mailbox).await.unwrap(), Some(lr()));

        let revoked = granted.apply(&AclCommand::remove(bob(), lr()));
        index
            .apply_diff(&mailbox, &AclDiff::compute(&granted, &revoked))
            .await
            .unwrap();
        assert_eq!(index.retrieve(&bob(), &mailbox).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_apply_diff_twice_is_idempotent() {
        let index = index();
        let mailbox = MailboxId::generate();
        let acl = MailboxAcl::owner_full().with_entry(bob(), lr());
        let diff = AclDiff::compute(&MailboxAcl::empty(), &acl);

        index.apply_diff(&mailbox, &diff).await.unwrap();
        let once = index.store().list_rights_for_mailbox(&mailbox).await.unwrap();
        index.apply_diff(&mailbox, &diff).await.unwrap();
        let twice = index.store().list_rights_for_mailbox(&mailbox).await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[tokio::test]
    async fn test_negative_entries_have_their_own_rows() {
        let index = index();
        let mailbox = MailboxId::generate();
        let acl = MailboxAcl::empty()
            .with_entry(bob(), lr())
            .with_entry(bob().negate(), Rights::parse("r").unwrap());

        index
            .apply_diff(&mailbox, &AclDiff::compute(&MailboxAcl::empty(), &acl))
            .await
            .unwrap();

        assert_eq!(index.retrieve(&bob(), &mailbox).await.unwrap(), Some(lr()));
        assert_eq!(
            index.retrieve(&bob().negate(), &mailbox).await.unwrap(),
            Some(Rights::parse("r").unwrap())
        );
        assert_eq!(index.list_rights_for_user("bob").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_rights_for_user_spans_mailboxes() {
        let index = index();
        let inbox = MailboxId::generate();
        let archive = MailboxId::generate();
        let acl = MailboxAcl::empty().with_entry(bob(), lr());
        let diff = AclDiff::compute(&MailboxAcl::empty(), &acl);

        index.apply_diff(&inbox, &diff).await.unwrap();
        index.apply_diff(&archive, &diff).await.unwrap();

        let listed = index.list_rights_for_user("bob").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed.get(&inbox), Some(&lr()));
        assert!(index.list_rights_for_user("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reserved_names_list_nothing_for_user() {
        let index = index();
        let mailbox = MailboxId::generate();
        let acl = MailboxAcl::owner_full().with_entry(EntryKey::anyone(), lr());
        index
            .apply_diff(&mailbox, &AclDiff::compute(&MailboxAcl::empty(), &acl))
            .await
            .unwrap();

        for name in ["owner", "anyone", "", "$staff"] {
            assert!(index.list_rights_for_user(name).await.unwrap().is_empty(), "{name:?}");
        }
        assert_eq!(
            index.list_rights_for_identity(&EntryKey::owner()).await.unwrap().get(&mailbox),
            Some(&Rights::FULL)
        );
    }

    #[tokio::test]
    async fn test_repair_rebuilds_stale_rows() {
        let index = index();
        let mailbox = MailboxId::generate();
        let alice = EntryKey::user("alice").unwrap();

        // Stale rows: alice no longer in the ACL, bob's rights outdated.
        index.store().upsert_rights(&alice, &mailbox, lr()).await.unwrap();
        index
            .store()
            .upsert_rights(&bob(), &mailbox, Rights::parse("r").unwrap())
            .await
            .unwrap();

        let acl = MailboxAcl::owner_full().with_entry(bob(), lr());
        let diff = index.repair(&mailbox, &acl).await.unwrap();
        assert_eq!(diff.changes().len(), 3);

        let rows = index.store().list_rights_for_mailbox(&mailbox).await.unwrap();
        assert_eq!(MailboxAcl::from_entries(rows), acl);

        assert!(index.repair(&mailbox, &acl).await.unwrap().is_empty());
    }
}
