//! # Mailacl Store
//!
//! Storage abstraction for mailbox ACLs. Provides trait-based interfaces for
//! the versioned ACL record and the rights index, with SQLite and in-memory
//! implementations.
//!
//! ## Key Types
//!
//! - [`AclStore`] - Versioned ACL records with insert-if-absent and compare-and-swap
//! - [`RightsIndexStore`] - Rows of the `(identity, mailbox) -> rights` index
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`StoredAcl`] - Encoded ACL bytes plus version
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mailacl_core::MailboxId;
//! use mailacl_store::{AclStore, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("acl.db").unwrap();
//!     let mailbox = MailboxId::generate();
//!
//!     if store.insert_acl_if_absent(&mailbox, b"{\"entries\":{}}").await.unwrap() {
//!         let stored = store.read_acl(&mailbox).await.unwrap().unwrap();
//!         assert_eq!(stored.version, 0);
//!     }
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Single-row atomicity only**: every write touches one row
//! - **Conflicts are values**: a lost compare-and-swap returns `Ok(false)`
//! - **Opaque records**: stores never decode ACL bytes

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{AclStore, RightsIndexStore, StoredAcl, INITIAL_VERSION};
