//! SQLite implementation of the store traits.
//!
//! This is the persistent storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking. Compare-and-swap is a
//! conditional `UPDATE` judged by its affected-row count, so several
//! processes may share one database file.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};

use mailacl_core::{EntryKey, MailboxId, Rights};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{AclStore, RightsIndexStore, StoredAcl, INITIAL_VERSION};

/// How long a connection waits on another process's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(format!("connection mutex: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

fn to_sql_version(version: u64) -> Result<i64> {
    i64::try_from(version)
        .map_err(|_| StoreError::InvalidData(format!("version {} out of range", version)))
}

fn from_sql_version(version: i64) -> Result<u64> {
    u64::try_from(version)
        .map_err(|_| StoreError::InvalidData(format!("negative version {}", version)))
}

fn parse_mailbox_id(bytes: &[u8]) -> Result<MailboxId> {
    MailboxId::try_from(bytes)
        .map_err(|_| StoreError::InvalidData(format!("mailbox id of {} bytes", bytes.len())))
}

fn parse_identity(s: &str) -> Result<EntryKey> {
    EntryKey::parse(s).map_err(|e| StoreError::InvalidData(e.to_string()))
}

fn parse_rights(s: &str) -> Result<Rights> {
    Rights::parse(s).map_err(|e| StoreError::InvalidData(e.to_string()))
}

#[async_trait]
impl AclStore for SqliteStore {
    async fn read_acl(&self, mailbox_id: &MailboxId) -> Result<Option<StoredAcl>> {
        let mailbox_id = *mailbox_id;

        self.blocking(move |conn| {
            let row: Option<(Vec<u8>, i64)> = conn
                .query_row(
                    "SELECT acl, version FROM mailbox_acl WHERE mailbox_id = ?1",
                    params![mailbox_id.as_bytes().as_slice()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            row.map(|(acl, version)| -> Result<StoredAcl> {
                Ok(StoredAcl {
                    acl: Bytes::from(acl),
                    version: from_sql_version(version)?,
                })
            })
            .transpose()
        })
        .await
    }

    async fn insert_acl_if_absent(&self, mailbox_id: &MailboxId, acl: &[u8]) -> Result<bool> {
        let mailbox_id = *mailbox_id;
        let acl = acl.to_vec();

        self.blocking(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO mailbox_acl (mailbox_id, acl, version)
                 VALUES (?1, ?2, ?3)",
                params![
                    mailbox_id.as_bytes().as_slice(),
                    acl,
                    to_sql_version(INITIAL_VERSION)?
                ],
            )?;
            Ok(inserted == 1)
        })
        .await
    }

    async fn compare_and_swap_acl(
        &self,
        mailbox_id: &MailboxId,
        acl: &[u8],
        new_version: u64,
        expected_version: u64,
    ) -> Result<bool> {
        let mailbox_id = *mailbox_id;
        let acl = acl.to_vec();

        self.blocking(move |conn| {
            let updated = conn.execute(
                "UPDATE mailbox_acl SET acl = ?1, version = ?2
                 WHERE mailbox_id = ?3 AND version = ?4",
                params![
                    acl,
                    to_sql_version(new_version)?,
                    mailbox_id.as_bytes().as_slice(),
                    to_sql_version(expected_version)?,
                ],
            )?;
            Ok(updated == 1)
        })
        .await
    }

    async fn overwrite_acl(&self, mailbox_id: &MailboxId, acl: &[u8]) -> Result<()> {
        let mailbox_id = *mailbox_id;
        let acl = acl.to_vec();

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO mailbox_acl (mailbox_id, acl, version) VALUES (?1, ?2, ?3)
                 ON CONFLICT(mailbox_id) DO UPDATE SET
                    acl = excluded.acl,
                    version = excluded.version",
                params![
                    mailbox_id.as_bytes().as_slice(),
                    acl,
                    to_sql_version(INITIAL_VERSION)?
                ],
            )?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl RightsIndexStore for SqliteStore {
    async fn upsert_rights(
        &self,
        identity: &EntryKey,
        mailbox_id: &MailboxId,
        rights: Rights,
    ) -> Result<()> {
        let identity = identity.to_string();
        let mailbox_id = *mailbox_id;

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO mailbox_rights (identity, mailbox_id, rights) VALUES (?1, ?2, ?3)
                 ON CONFLICT(identity, mailbox_id) DO UPDATE SET rights = excluded.rights",
                params![identity, mailbox_id.as_bytes().as_slice(), rights.serialize()],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_rights(&self, identity: &EntryKey, mailbox_id: &MailboxId) -> Result<()> {
        let identity = identity.to_string();
        let mailbox_id = *mailbox_id;

        self.blocking(move |conn| {
            conn.execute(
                "DELETE FROM mailbox_rights WHERE identity = ?1 AND mailbox_id = ?2",
                params![identity, mailbox_id.as_bytes().as_slice()],
            )?;
            Ok(())
        })
        .await
    }

    async fn retrieve_rights(
        &self,
        identity: &EntryKey,
        mailbox_id: &MailboxId,
    ) -> Result<Option<Rights>> {
        let identity = identity.to_string();
        let mailbox_id = *mailbox_id;

        self.blocking(move |conn| {
            let rights: Option<String> = conn
                .query_row(
                    "SELECT rights FROM mailbox_rights WHERE identity = ?1 AND mailbox_id = ?2",
                    params![identity, mailbox_id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            rights.as_deref().map(parse_rights).transpose()
        })
        .await
    }

    async fn list_rights_for_identity(
        &self,
        identity: &EntryKey,
    ) -> Result<BTreeMap<MailboxId, Rights>> {
        let identity = identity.to_string();

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT mailbox_id, rights FROM mailbox_rights WHERE identity = ?1",
            )?;

            let rows = stmt
                .query_map(params![identity], |row| {
                    Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.iter()
                .map(|(mailbox_id, rights)| -> Result<(MailboxId, Rights)> {
                    Ok((parse_mailbox_id(mailbox_id)?, parse_rights(rights)?))
                })
                .collect::<Result<BTreeMap<_, _>>>()
        })
        .await
    }

    async fn list_rights_for_mailbox(
        &self,
        mailbox_id: &MailboxId,
    ) -> Result<BTreeMap<EntryKey, Rights>> {
        let mailbox_id = *mailbox_id;

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT identity, rights FROM mailbox_rights WHERE mailbox_id = ?1",
            )?;

            let rows = stmt
                .query_map(params![mailbox_id.as_bytes().as_slice()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.iter()
                .map(|(identity, rights)| -> Result<(EntryKey, Rights)> {
                    Ok((parse_identity(identity)?, parse_rights(rights)?))
                })
                .collect::<Result<BTreeMap<_, _>>>()
        })
        .await
    }
}
