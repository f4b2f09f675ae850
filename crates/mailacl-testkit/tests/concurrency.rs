//! Concurrent writers on one mailbox converge through compare-and-swap.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use mailacl::{AclConfig, AclMapper, AclUpdated};
use mailacl_core::{AclCommand, EntryKey, MailboxAcl, MailboxId, Right, Rights};
use mailacl_store::{MemoryStore, Result as StoreResult, RightsIndexStore, SqliteStore};
use mailacl_testkit::fixtures::{rights, user};
use mailacl_testkit::{FullStore, TestFixture};

/// Commit every command from its own mapper, all at once.
async fn race<S: FullStore>(
    fixture: &TestFixture<S>,
    mailbox: MailboxId,
    commands: Vec<AclCommand>,
) -> Vec<(AclCommand, AclUpdated)> {
    let handles: Vec<_> = commands
        .into_iter()
        .map(|command| {
            let mapper = fixture.rival();
            tokio::spawn(async move {
                let updated = mapper.update_acl(&mailbox, &command).await.unwrap();
                (command, updated)
            })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results.sort_by_key(|(_, updated)| updated.version);
    results
}

/// Versions are 0..n with no gaps, and replaying the commands in version
/// order reproduces the stored ACL.
async fn assert_converged<S: FullStore>(
    fixture: &TestFixture<S>,
    mailbox: MailboxId,
    results: &[(AclCommand, AclUpdated)],
) -> MailboxAcl {
    let versions: Vec<u64> = results.iter().map(|(_, updated)| updated.version).collect();
    let expected: Vec<u64> = (0..results.len() as u64).collect();
    assert_eq!(versions, expected);

    let replayed = results
        .iter()
        .fold(MailboxAcl::empty(), |acl, (command, _)| acl.apply(command));

    let stored = fixture.mapper.get_versioned(&mailbox).await.unwrap().unwrap();
    assert_eq!(stored.version, results.len() as u64 - 1);
    assert_eq!(stored.acl, replayed);
    replayed
}

async fn index_rows<S: FullStore>(fixture: &TestFixture<S>, mailbox: MailboxId) -> MailboxAcl {
    MailboxAcl::from_entries(fixture.store.list_rights_for_mailbox(&mailbox).await.unwrap())
}

fn distinct_users(n: usize) -> Vec<AclCommand> {
    (0..n)
        .map(|i| AclCommand::add(user(&format!("user{i}")), rights("lr")))
        .collect()
}

/// Writers fighting over the same key with every edit mode.
fn contended_commands() -> Vec<AclCommand> {
    let bob = user("bob");
    Right::ALL
        .iter()
        .enumerate()
        .map(|(i, right)| match i % 3 {
            0 => AclCommand::add(bob.clone(), Rights::from(*right)),
            1 => AclCommand::remove(bob.clone(), rights("lr")),
            _ => AclCommand::replace(bob.clone(), Rights::of(&[*right, Right::Lookup])),
        })
        .chain([
            AclCommand::add(EntryKey::anyone(), rights("l")),
            AclCommand::add(bob.negate(), rights("w")),
        ])
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_writers_on_distinct_keys_all_land() {
    let fixture = TestFixture::new();
    let mailbox = MailboxId::generate();

    let results = race(&fixture, mailbox, distinct_users(32)).await;
    let acl = assert_converged(&fixture, mailbox, &results).await;
    assert_eq!(acl.len(), 32);

    // Each key is written once, so index writes cannot overtake each other.
    assert_eq!(index_rows(&fixture, mailbox).await, acl);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_writers_on_one_key_serialize() {
    let fixture = TestFixture::on(Arc::new(MemoryStore::new()));
    let mailbox = MailboxId::generate();

    let results = race(&fixture, mailbox, contended_commands()).await;
    let acl = assert_converged(&fixture, mailbox, &results).await;

    assert_eq!(index_rows(&fixture, mailbox).await, acl);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sqlite_writers_converge() {
    let fixture = TestFixture::sqlite();
    let mailbox = MailboxId::generate();

    let mut commands = distinct_users(8);
    commands.extend(contended_commands());
    let results = race(&fixture, mailbox, commands).await;
    let acl = assert_converged(&fixture, mailbox, &results).await;

    for i in 0..8 {
        assert_eq!(acl.get(&user(&format!("user{i}"))), Some(rights("lr")));
    }
    assert_eq!(acl.get(&EntryKey::anyone()), Some(rights("l")));
    assert_eq!(acl.get(&user("bob").negate()), Some(rights("w")));
    assert_eq!(index_rows(&fixture, mailbox).await, acl);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn separate_sqlite_connections_converge() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("acl.db");
    let first = TestFixture::on(Arc::new(SqliteStore::open(&path).unwrap()));
    let second = TestFixture::on(Arc::new(SqliteStore::open(&path).unwrap()));
    let mailbox = MailboxId::generate();

    let commands = distinct_users(12);
    let (left, right) = commands.split_at(6);
    let (mut results, others) = tokio::join!(
        race(&first, mailbox, left.to_vec()),
        race(&second, mailbox, right.to_vec()),
    );
    results.extend(others);
    results.sort_by_key(|(_, updated)| updated.version);

    let acl = assert_converged(&first, mailbox, &results).await;
    assert_eq!(second.mapper.get_acl(&mailbox).await.unwrap(), acl);
    assert_eq!(index_rows(&second, mailbox).await, acl);
}

/// Index store whose first upsert parks until released.
struct StalledIndex {
    inner: Arc<MemoryStore>,
    armed: AtomicBool,
    reached: Notify,
    release: Notify,
}

impl StalledIndex {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(true),
            reached: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl RightsIndexStore for StalledIndex {
    async fn upsert_rights(
        &self,
        identity: &EntryKey,
        mailbox_id: &MailboxId,
        rights: Rights,
    ) -> StoreResult<()> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.reached.notify_one();
            self.release.notified().await;
        }
        self.inner.upsert_rights(identity, mailbox_id, rights).await
    }

    async fn delete_rights(&self, identity: &EntryKey, mailbox_id: &MailboxId) -> StoreResult<()> {
        self.inner.delete_rights(identity, mailbox_id).await
    }

    async fn retrieve_rights(
        &self,
        identity: &EntryKey,
        mailbox_id: &MailboxId,
    ) -> StoreResult<Option<Rights>> {
        self.inner.retrieve_rights(identity, mailbox_id).await
    }

    async fn list_rights_for_identity(
        &self,
        identity: &EntryKey,
    ) -> StoreResult<BTreeMap<MailboxId, Rights>> {
        self.inner.list_rights_for_identity(identity).await
    }

    async fn list_rights_for_mailbox(
        &self,
        mailbox_id: &MailboxId,
    ) -> StoreResult<BTreeMap<EntryKey, Rights>> {
        self.inner.list_rights_for_mailbox(mailbox_id).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn late_index_write_does_not_resurrect_removed_entry() {
    let store = Arc::new(MemoryStore::new());
    let stalled = Arc::new(StalledIndex::new(store.clone()));
    let fixture = TestFixture::on(store.clone());
    let mailbox = MailboxId::generate();

    let slow = AclMapper::new(store.clone(), stalled.clone(), AclConfig::default()).unwrap();
    let adding = tokio::spawn(async move {
        slow.update_acl(&mailbox, &AclCommand::add(user("bob"), rights("r")))
            .await
            .unwrap()
    });

    // The add has committed and its index write is parked.
    stalled.reached.notified().await;
    let removed = fixture
        .rival()
        .update_acl(&mailbox, &AclCommand::remove(user("bob"), rights("r")))
        .await
        .unwrap();
    assert_eq!(removed.version, 1);

    stalled.release.notify_one();
    let added = adding.await.unwrap();
    assert_eq!(added.version, 0);

    assert!(fixture.mapper.get_acl(&mailbox).await.unwrap().is_empty());
    assert_eq!(store.retrieve_rights(&user("bob"), &mailbox).await.unwrap(), None);
    assert!(index_rows(&fixture, mailbox).await.is_empty());
}
