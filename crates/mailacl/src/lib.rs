//! # Mailacl
//!
//! Mailbox access control lists with optimistic-concurrency persistence and a
//! rights-by-identity index.
//!
//! ## Overview
//!
//! - **ACLs**: one versioned record per mailbox, mapping entry keys to rights
//! - **Updates**: ADD / REMOVE / REPLACE commands applied through a bounded
//!   compare-and-swap retry loop; no locks, no multi-row transactions
//! - **Rights index**: for every identity, the mailboxes it has rights on,
//!   maintained from the diff of each committed update
//! - **Notifications**: listeners receive the diff of every committed update
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mailacl::{AclConfig, AclMapper};
//! use mailacl::core::{AclCommand, MailboxId};
//! use mailacl::store::SqliteStore;
//!
//! async fn example() {
//!     let store = Arc::new(SqliteStore::open("acl.db").unwrap());
//!     let mapper = AclMapper::new(store.clone(), store, AclConfig::default()).unwrap();
//!
//!     let inbox = MailboxId::generate();
//!     let command = AclCommand::parse("bob", "+lrs").unwrap();
//!     mapper.update_acl(&inbox, &command).await.unwrap();
//!
//!     let acl = mapper.get_acl(&inbox).await.unwrap();
//!     let shared_with_bob = mapper.list_rights_for_user("bob").await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `mailacl::core` - Rights, entry keys, ACLs, commands, diffs, codecs
//! - `mailacl::store` - Storage traits, SQLite and in-memory stores

pub mod config;
pub mod error;
pub mod events;
pub mod hook;
pub mod index;
pub mod mapper;

// Re-export component crates
pub use mailacl_core as core;
pub use mailacl_store as store;

pub use config::{AclConfig, DEFAULT_MAX_RETRIES};
pub use error::{AclError, Result};
pub use events::{AclChangedEvent, AclListener, BroadcastListener};
pub use hook::CasHook;
pub use index::RightsIndex;
pub use mapper::{AclMapper, AclUpdated, VersionedAcl};

// Re-export commonly used core types
pub use mailacl_core::{
    AclCommand, AclDiff, EditMode, EntryKey, MailboxAcl, MailboxId, NameType, Right, Rights,
};
