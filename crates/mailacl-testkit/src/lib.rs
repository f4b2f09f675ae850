//! # Mailacl Testkit
//!
//! Testing utilities for mailbox ACLs.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Pinned byte layouts of the stored ACL encodings
//! - **Generators**: Proptest strategies for rights, keys, ACLs and commands
//! - **Fixtures**: A mapper on a fresh store, plus a hook that forces version
//!   conflicts on demand
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use mailacl_testkit::generators::{acl_command, mailbox_acl};
//!
//! proptest! {
//!     #[test]
//!     fn add_is_idempotent(acl in mailbox_acl(), command in acl_command()) {
//!         let once = acl.apply(&command);
//!         prop_assert_eq!(once.apply(&command), once);
//!     }
//! }
//! ```
//!
//! ## Forcing Conflicts
//!
//! ```rust,no_run
//! use mailacl_testkit::fixtures::{rights, user, TestFixture};
//! use mailacl_core::{AclCommand, MailboxId};
//!
//! async fn example() {
//!     let (fixture, injector) = TestFixture::new()
//!         .with_conflicts(vec![AclCommand::add(user("alice"), rights("l"))]);
//!
//!     let mailbox = MailboxId::generate();
//!     fixture
//!         .mapper
//!         .update_acl(&mailbox, &AclCommand::add(user("bob"), rights("r")))
//!         .await
//!         .unwrap();
//!     assert_eq!(injector.injected(), 1);
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{init_tracing, ConflictInjector, FullStore, TestFixture};
pub use vectors::{acl_from_vector, all_vectors, verify_all_vectors, GoldenVector};
