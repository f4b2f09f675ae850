//! # Mailacl Core
//!
//! Pure primitives for mailbox access control lists: rights, entry keys,
//! ACLs, edit commands, diffs and the byte codecs used to store them.
//!
//! This crate contains no I/O, no storage, no concurrency. Every type is an
//! immutable value and every operation is a pure function.
//!
//! ## Key Types
//!
//! - [`Right`] / [`Rights`] - The RFC 4314 rights vocabulary and sets over it
//! - [`EntryKey`] - A principal (user, group, special) plus grant/deny polarity
//! - [`MailboxAcl`] - Mapping from entry key to rights for one mailbox
//! - [`AclCommand`] - An ADD/REMOVE/REPLACE edit applied to an ACL
//! - [`AclDiff`] - The entry-level changes between two ACLs
//! - [`MailboxId`] - Identifier of the mailbox an ACL belongs to
//!
//! ## Usage
//!
//! ```rust
//! use mailacl_core::{AclCommand, AclDiff, MailboxAcl};
//!
//! let before = MailboxAcl::owner_full();
//! let command = AclCommand::parse("bob", "+lr").unwrap();
//! let after = before.apply(&command);
//!
//! let diff = AclDiff::compute(&before, &after);
//! assert_eq!(diff.added().count(), 1);
//! ```

pub mod acl;
pub mod codec;
pub mod diff;
pub mod entry;
pub mod error;
pub mod rights;
pub mod types;

pub use acl::{AclCommand, EditMode, MailboxAcl};
pub use codec::{AclCodec, CborCodec, JsonCodec};
pub use diff::{AclDiff, ChangeKind, EntryChange};
pub use entry::{EntryKey, NameType};
pub use error::{CoreError, Result};
pub use rights::{Right, Rights};
pub use types::MailboxId;
