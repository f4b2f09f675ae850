//! Error types for the mailbox ACL core.

use thiserror::Error;

/// Errors produced by the rights algebra and the ACL codecs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A rights string contained a character that is not a known right.
    #[error("malformed rights {input:?}: unrecognized character {ch:?}")]
    MalformedRights { input: String, ch: char },

    /// A syntactically valid RFC 4314 right that this server does not support.
    #[error("unsupported right: {0:?}")]
    UnsupportedRight(char),

    /// An ACL entry identifier that cannot name a principal.
    #[error("invalid entry key: {0:?}")]
    InvalidEntryKey(String),

    /// A stored ACL document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
