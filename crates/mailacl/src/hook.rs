//! Injection point fired just before every conditional write.

use async_trait::async_trait;
use mailacl_core::MailboxId;

use crate::error::Result;

/// Called by [`AclMapper::update_acl`](crate::AclMapper::update_acl)
/// immediately before each insert-if-absent or compare-and-swap attempt.
///
/// The command has already been applied to the record read in this attempt,
/// so anything the hook writes to the store makes that attempt lose. Tests
/// use this to force version conflicts deterministically.
///
/// An error aborts the update and is returned to the caller unchanged.
#[async_trait]
pub trait CasHook: Send + Sync {
    /// `attempt` starts at 1.
    async fn before_cas(&self, mailbox_id: &MailboxId, attempt: u32) -> Result<()>;
}
