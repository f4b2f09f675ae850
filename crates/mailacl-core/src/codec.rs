//! Byte encodings for stored ACLs.
//!
//! Both codecs share one document model, a map from the textual entry key to
//! the canonical rights string:
//!
//! ```json
//! {"entries":{"$staff":"lr","-bob":"r","owner":"aeiklprstwx"}}
//! ```
//!
//! Keys come out in sorted order, so encoding is deterministic. Decoding
//! validates every key and rights string and prunes empty entries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::acl::MailboxAcl;
use crate::entry::EntryKey;
use crate::error::{CoreError, Result};
use crate::rights::Rights;

/// Converts ACLs to and from stored bytes.
pub trait AclCodec: Send + Sync {
    fn encode(&self, acl: &MailboxAcl) -> Result<Vec<u8>>;

    /// Fails with [`CoreError::Serialization`] on malformed input.
    fn decode(&self, bytes: &[u8]) -> Result<MailboxAcl>;
}

#[derive(Serialize, Deserialize)]
struct AclDocument {
    entries: BTreeMap<String, String>,
}

impl AclDocument {
    fn from_acl(acl: &MailboxAcl) -> Self {
        Self {
            entries: acl
                .entries()
                .map(|(key, rights)| (key.to_string(), Rights::serialize(*rights)))
                .collect(),
        }
    }

    fn into_acl(self) -> Result<MailboxAcl> {
        let entries = self
            .entries
            .into_iter()
            .map(|(key, rights)| {
                let key = EntryKey::parse(&key).map_err(serialization)?;
                let rights = Rights::parse(&rights).map_err(serialization)?;
                Ok((key, rights))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(MailboxAcl::from_entries(entries))
    }
}

fn serialization(e: impl std::fmt::Display) -> CoreError {
    CoreError::Serialization(e.to_string())
}

/// JSON encoding. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl AclCodec for JsonCodec {
    fn encode(&self, acl: &MailboxAcl) -> Result<Vec<u8>> {
        serde_json::to_vec(&AclDocument::from_acl(acl)).map_err(serialization)
    }

    fn decode(&self, bytes: &[u8]) -> Result<MailboxAcl> {
        serde_json::from_slice::<AclDocument>(bytes)
            .map_err(serialization)?
            .into_acl()
    }
}

/// CBOR encoding, for stores where compactness matters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborCodec;

impl AclCodec for CborCodec {
    fn encode(&self, acl: &MailboxAcl) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(&AclDocument::from_acl(acl), &mut buf).map_err(serialization)?;
        Ok(buf)
    }

    fn decode(&self, bytes: &[u8]) -> Result<MailboxAcl> {
        ciborium::from_reader::<AclDocument, _>(bytes)
            .map_err(serialization)?
            .into_acl()
    }
}
