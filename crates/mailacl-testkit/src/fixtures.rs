//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use mailacl::{AclConfig, AclMapper, CasHook, Result};
use mailacl_core::{AclCommand, EntryKey, MailboxId, Rights};
use mailacl_store::{AclStore, MemoryStore, RightsIndexStore, SqliteStore, StoreError};

/// A store that holds both the ACL records and the rights index.
pub trait FullStore: AclStore + RightsIndexStore + 'static {}

impl<T: AclStore + RightsIndexStore + 'static> FullStore for T {}

/// A test fixture with a shared store and a mapper on it.
pub struct TestFixture<S: FullStore = MemoryStore> {
    pub store: Arc<S>,
    pub mapper: AclMapper<S, S>,
}

impl TestFixture<MemoryStore> {
    /// Create a fixture on a fresh in-memory store.
    pub fn new() -> Self {
        Self::on(Arc::new(MemoryStore::new()))
    }
}

impl TestFixture<SqliteStore> {
    /// Create a fixture on a fresh in-memory SQLite database.
    pub fn sqlite() -> Self {
        let store = SqliteStore::open_memory().expect("open in-memory SQLite store");
        Self::on(Arc::new(store))
    }
}

impl<S: FullStore> TestFixture<S> {
    /// Create a fixture on an existing store with the default configuration.
    pub fn on(store: Arc<S>) -> Self {
        Self::with_config(store, AclConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: AclConfig) -> Self {
        let mapper = AclMapper::new(store.clone(), store.clone(), config)
            .expect("fixture configuration is valid");
        Self { store, mapper }
    }

    /// Another, independent mapper on the same store, standing in for a
    /// second server process.
    pub fn rival(&self) -> AclMapper<S, S> {
        AclMapper::new(self.store.clone(), self.store.clone(), self.mapper.config().clone())
            .expect("fixture configuration is valid")
    }

    /// Install a [`ConflictInjector`] whose rival commits `commands`, one per
    /// attempt, ahead of the fixture's mapper.
    pub fn with_conflicts(self, commands: Vec<AclCommand>) -> (Self, Arc<ConflictInjector<S>>) {
        let injector = Arc::new(ConflictInjector::new(self.rival(), commands));
        let mapper = self.mapper.with_hook(injector.clone());
        (
            Self {
                store: self.store,
                mapper,
            },
            injector,
        )
    }
}

impl Default for TestFixture<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`CasHook`] that makes attempts lose by committing a rival update first.
///
/// Each time the hooked mapper is about to write, the injector takes the next
/// queued command and commits it through its own mapper on the same mailbox.
/// The hooked attempt then sees a version (or an existing record) it did not
/// read, and has to retry. Once the queue is empty, attempts go through.
pub struct ConflictInjector<S: FullStore> {
    rival: AclMapper<S, S>,
    pending: Mutex<VecDeque<AclCommand>>,
    injected: AtomicU32,
}

impl<S: FullStore> ConflictInjector<S> {
    pub fn new(rival: AclMapper<S, S>, commands: Vec<AclCommand>) -> Self {
        Self {
            rival,
            pending: Mutex::new(commands.into()),
            injected: AtomicU32::new(0),
        }
    }

    /// Number of rival updates committed so far.
    pub fn injected(&self) -> u32 {
        self.injected.load(Ordering::SeqCst)
    }

    fn next_command(&self) -> Result<Option<AclCommand>> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(pending.pop_front())
    }
}

#[async_trait]
impl<S: FullStore> CasHook for ConflictInjector<S> {
    async fn before_cas(&self, mailbox_id: &MailboxId, _attempt: u32) -> Result<()> {
        if let Some(command) = self.next_command()? {
            self.rival.update_acl(mailbox_id, &command).await?;
            self.injected.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Shorthand for a positive user key. Panics on reserved names.
pub fn user(name: &str) -> EntryKey {
    EntryKey::user(name).expect("valid user name")
}

/// Shorthand for canonical rights. Panics on malformed input.
pub fn rights(s: &str) -> Rights {
    Rights::parse(s).expect("canonical rights string")
}

/// Route `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_round_trip() {
        let fixture = TestFixture::new();
        let mailbox = MailboxId::generate();

        fixture
            .mapper
            .update_acl(&mailbox, &AclCommand::add(user("bob"), rights("lr")))
            .await
            .unwrap();

        let acl = fixture.rival().get_acl(&mailbox).await.unwrap();
        assert_eq!(acl.get(&user("bob")), Some(rights("lr")));
    }

    #[tokio::test]
    async fn test_injector_forces_one_retry_per_command() {
        let (fixture, injector) = TestFixture::new().with_conflicts(vec![
            AclCommand::add(user("alice"), rights("l")),
            AclCommand::add(user("carol"), rights("l")),
        ]);
        let mailbox = MailboxId::generate();

        let updated = fixture
            .mapper
            .update_acl(&mailbox, &AclCommand::add(user("bob"), rights("r")))
            .await
            .unwrap();

        assert_eq!(injector.injected(), 2);
        // alice inserted at 0, carol at 1, bob on top.
        assert_eq!(updated.version, 2);
        assert_eq!(fixture.mapper.get_acl(&mailbox).await.unwrap().len(), 3);
    }
}
