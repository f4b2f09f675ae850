//! Error types for ACL operations.

use mailacl_core::{CoreError, MailboxId};
use mailacl_store::StoreError;
use thiserror::Error;

/// Errors that can occur during ACL operations.
#[derive(Debug, Error)]
pub enum AclError {
    /// Malformed or unsupported rights, invalid keys, codec failures on write.
    #[error("ACL error: {0}")]
    Core(#[from] CoreError),

    /// The backing store failed. Not retried.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Every compare-and-swap attempt lost to a concurrent writer.
    ///
    /// The stored ACL is left exactly as the winning writers made it.
    #[error("ACL update of mailbox {mailbox_id} did not converge after {attempts} attempts")]
    RetriesExhausted { mailbox_id: MailboxId, attempts: u32 },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for ACL operations.
pub type Result<T> = std::result::Result<T, AclError>;
