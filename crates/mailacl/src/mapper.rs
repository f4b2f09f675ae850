//! The ACL mapper: versioned ACL records under optimistic concurrency.
//!
//! Every mailbox has at most one stored record, `(encoded ACL, version)`. The
//! store only offers single-row conditional writes, so an update is a
//! read-modify-write loop: read the record, apply the command, and write the
//! result only if the version is still the one that was read. A writer that
//! loses the race reads again and retries, up to
//! [`AclConfig::max_retries`] attempts in total.
//!
//! After a write commits, the diff between the old and new ACL is applied to
//! the rights index and then handed to the registered listeners. Once its
//! index writes are done, a writer re-reads the record and repairs the
//! mailbox's rows if another writer committed in the meantime, so index
//! writes landing out of order cannot leave a stale row behind. Neither step
//! can roll the primary record back; a crash in between leaves the index
//! stale until the next update of the mailbox or a [`RightsIndex::repair`].

use std::collections::BTreeMap;
use std::sync::Arc;

use mailacl_core::{
    AclCodec, AclCommand, AclDiff, EntryKey, JsonCodec, MailboxAcl, MailboxId, Rights,
};
use mailacl_store::{AclStore, RightsIndexStore, INITIAL_VERSION};

use crate::config::AclConfig;
use crate::error::{AclError, Result};
use crate::events::{AclChangedEvent, AclListener};
use crate::hook::CasHook;
use crate::index::RightsIndex;

/// A decoded ACL together with the version of the record it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedAcl {
    pub acl: MailboxAcl,
    pub version: u64,
}

/// Outcome of a committed [`AclMapper::update_acl`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclUpdated {
    pub mailbox_id: MailboxId,
    /// Version the record now has. `0` when this update created it.
    pub version: u64,
    /// What the command changed. Empty when it was a no-op.
    pub diff: AclDiff,
}

/// Reads and writes mailbox ACLs and keeps the rights index in step.
///
/// `S` holds the versioned records and `I` the index rows. Both may be the
/// same store. The mapper keeps no state of its own between calls, so any
/// number of mappers, in any number of processes, can share one store.
pub struct AclMapper<S: AclStore, I: RightsIndexStore> {
    acls: Arc<S>,
    index: RightsIndex<I>,
    config: AclConfig,
    codec: Arc<dyn AclCodec>,
    hook: Option<Arc<dyn CasHook>>,
    listeners: Vec<Arc<dyn AclListener>>,
}

impl<S: AclStore, I: RightsIndexStore> AclMapper<S, I> {
    /// Create a mapper encoding records with [`JsonCodec`].
    pub fn new(acls: Arc<S>, index: Arc<I>, config: AclConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            acls,
            index: RightsIndex::new(index),
            config,
            codec: Arc::new(JsonCodec),
            hook: None,
            listeners: Vec::new(),
        })
    }

    /// Use a different record encoding.
    ///
    /// Every mapper sharing a store must use the same codec.
    pub fn with_codec(mut self, codec: Arc<dyn AclCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Install the hook fired before each conditional write.
    pub fn with_hook(mut self, hook: Arc<dyn CasHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Register a listener for committed updates. Listeners run in
    /// registration order.
    pub fn with_listener(mut self, listener: Arc<dyn AclListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn config(&self) -> &AclConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.acls
    }

    pub fn index(&self) -> &RightsIndex<I> {
        &self.index
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the ACL of a mailbox.
    ///
    /// A mailbox without a record has the empty ACL. So does one whose record
    /// cannot be decoded: the failure is logged and the caller sees no
    /// entries rather than an error.
    pub async fn get_acl(&self, mailbox_id: &MailboxId) -> Result<MailboxAcl> {
        Ok(self
            .get_versioned(mailbox_id)
            .await?
            .map(|versioned| versioned.acl)
            .unwrap_or_default())
    }

    /// Get the ACL of a mailbox with its record version.
    ///
    /// `None` if no record exists. A corrupt record decodes as empty, at the
    /// version it was stored with.
    pub async fn get_versioned(&self, mailbox_id: &MailboxId) -> Result<Option<VersionedAcl>> {
        Ok(self
            .acls
            .read_acl(mailbox_id)
            .await?
            .map(|stored| VersionedAcl {
                acl: self.decode_or_empty(mailbox_id, &stored.acl),
                version: stored.version,
            }))
    }

    /// Mailboxes the identity has an entry on, from the rights index.
    pub async fn list_rights_for_identity(
        &self,
        identity: &EntryKey,
    ) -> Result<BTreeMap<MailboxId, Rights>> {
        self.index.list_rights_for_identity(identity).await
    }

    /// Mailboxes the user `name` has a positive entry on.
    pub async fn list_rights_for_user(&self, name: &str) -> Result<BTreeMap<MailboxId, Rights>> {
        self.index.list_rights_for_user(name).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply a command to a mailbox's ACL.
    ///
    /// Creates the record at version 0 if there is none, otherwise bumps the
    /// version by one. Every commit bumps it, including a command that
    /// changes nothing. Store failures are returned immediately; only lost
    /// races are retried. When every attempt loses, the call fails with
    /// [`AclError::RetriesExhausted`] and the record is left as the winning
    /// writers made it.
    pub async fn update_acl(
        &self,
        mailbox_id: &MailboxId,
        command: &AclCommand,
    ) -> Result<AclUpdated> {
        let max_retries = self.config.max_retries;

        for attempt in 1..=max_retries {
            let committed = match self.acls.read_acl(mailbox_id).await? {
                None => {
                    let new_acl = MailboxAcl::empty().apply(command);
                    let encoded = self.codec.encode(&new_acl)?;
                    self.before_cas(mailbox_id, attempt).await?;

                    if self.acls.insert_acl_if_absent(mailbox_id, &encoded).await? {
                        Some((MailboxAcl::empty(), new_acl, INITIAL_VERSION, false))
                    } else {
                        tracing::debug!(
                            mailbox = %mailbox_id,
                            attempt,
                            "ACL record created concurrently, retrying"
                        );
                        None
                    }
                }
                Some(stored) => {
                    let decoded = self.decode_stored(mailbox_id, &stored.acl);
                    let corrupt = decoded.is_none();
                    let old_acl = decoded.unwrap_or_default();
                    let new_acl = old_acl.apply(command);
                    let encoded = self.codec.encode(&new_acl)?;
                    let new_version = stored.version.wrapping_add(1);
                    self.before_cas(mailbox_id, attempt).await?;

                    if self
                        .acls
                        .compare_and_swap_acl(mailbox_id, &encoded, new_version, stored.version)
                        .await?
                    {
                        Some((old_acl, new_acl, new_version, corrupt))
                    } else {
                        tracing::debug!(
                            mailbox = %mailbox_id,
                            attempt,
                            expected_version = stored.version,
                            "ACL version conflict, retrying"
                        );
                        None
                    }
                }
            };

            if let Some((old_acl, new_acl, version, corrupt)) = committed {
                tracing::trace!(mailbox = %mailbox_id, version, attempt, "ACL update committed");
                let diff = AclDiff::compute(&old_acl, &new_acl);
                // The rows of a corrupt record are unknown, so rebuild them
                // from the new ACL instead of diffing against empty.
                let rebuild = corrupt.then_some(&new_acl);
                return self.after_commit(mailbox_id, version, diff, rebuild).await;
            }
        }

        tracing::warn!(
            mailbox = %mailbox_id,
            attempts = max_retries,
            "ACL update retries exhausted"
        );
        Err(AclError::RetriesExhausted {
            mailbox_id: *mailbox_id,
            attempts: max_retries,
        })
    }

    /// Replace a mailbox's ACL unconditionally, resetting its version to 0.
    ///
    /// No conflict detection: a concurrent update may be overwritten. The
    /// mailbox's index rows are then repaired against `acl`. Listeners are not
    /// notified.
    pub async fn reset_acl(&self, mailbox_id: &MailboxId, acl: &MailboxAcl) -> Result<()> {
        let encoded = self.codec.encode(acl)?;
        self.acls.overwrite_acl(mailbox_id, &encoded).await?;
        tracing::debug!(mailbox = %mailbox_id, entries = acl.len(), "ACL reset");

        self.index.repair(mailbox_id, acl).await?;
        self.settle_index(mailbox_id, INITIAL_VERSION).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn decode_or_empty(&self, mailbox_id: &MailboxId, bytes: &[u8]) -> MailboxAcl {
        self.decode_stored(mailbox_id, bytes).unwrap_or_default()
    }

    /// `None` when the record is corrupt.
    fn decode_stored(&self, mailbox_id: &MailboxId, bytes: &[u8]) -> Option<MailboxAcl> {
        match self.codec.decode(bytes) {
            Ok(acl) => Some(acl),
            Err(e) => {
                tracing::error!(
                    mailbox = %mailbox_id,
                    error = %e,
                    "stored ACL failed to decode, treating it as empty"
                );
                None
            }
        }
    }

    async fn before_cas(&self, mailbox_id: &MailboxId, attempt: u32) -> Result<()> {
        match &self.hook {
            Some(hook) => hook.before_cas(mailbox_id, attempt).await,
            None => Ok(()),
        }
    }

    async fn after_commit(
        &self,
        mailbox_id: &MailboxId,
        version: u64,
        diff: AclDiff,
        rebuild: Option<&MailboxAcl>,
    ) -> Result<AclUpdated> {
        if let Err(e) = self.sync_index(mailbox_id, version, &diff, rebuild).await {
            tracing::warn!(
                mailbox = %mailbox_id,
                version,
                error = %e,
                "ACL committed but rights index update failed"
            );
            return Err(e);
        }

        if !self.listeners.is_empty() {
            let event = AclChangedEvent {
                mailbox_id: *mailbox_id,
                version,
                diff: diff.clone(),
            };
            for listener in &self.listeners {
                if let Err(e) = listener.on_acl_changed(&event).await {
                    tracing::warn!(
                        mailbox = %mailbox_id,
                        version,
                        error = %e,
                        "ACL listener failed"
                    );
                }
            }
        }

        Ok(AclUpdated {
            mailbox_id: *mailbox_id,
            version,
            diff,
        })
    }

    async fn sync_index(
        &self,
        mailbox_id: &MailboxId,
        version: u64,
        diff: &AclDiff,
        rebuild: Option<&MailboxAcl>,
    ) -> Result<()> {
        match rebuild {
            Some(acl) => {
                self.index.repair(mailbox_id, acl).await?;
            }
            None => self.index.apply_diff(mailbox_id, diff).await?,
        }
        self.settle_index(mailbox_id, version).await
    }

    /// Repair the mailbox's rows until the record stops moving.
    ///
    /// Index writes of concurrent writers can land in any order. Each writer
    /// re-reads the record after its own writes, and if the version is no
    /// longer the one its writes were based on, repairs against the current
    /// ACL. A stale row is therefore always followed by a repair from the
    /// writer that wrote it.
    async fn settle_index(&self, mailbox_id: &MailboxId, version: u64) -> Result<()> {
        let mut synced = version;
        for _ in 0..self.config.max_retries {
            let current = match self.get_versioned(mailbox_id).await? {
                Some(current) => current,
                None => return Ok(()),
            };
            if current.version == synced {
                return Ok(());
            }

            tracing::debug!(
                mailbox = %mailbox_id,
                indexed_version = synced,
                current_version = current.version,
                "ACL moved during index update, repairing"
            );
            self.index.repair(mailbox_id, &current.acl).await?;
            synced = current.version;
        }

        tracing::warn!(
            mailbox = %mailbox_id,
            version = synced,
            "rights index did not settle, leaving it to the next writer"
        );
        Ok(())
    }
}
