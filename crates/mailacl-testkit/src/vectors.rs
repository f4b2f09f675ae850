//! Golden vectors for the stored ACL encodings.
//!
//! Stored records outlive the code that wrote them, so the byte layout of
//! both codecs is pinned here. Any change that breaks a vector breaks every
//! existing database.

use mailacl_core::{AclCodec, CborCodec, EntryKey, JsonCodec, MailboxAcl, Rights};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Entries as (textual key, canonical rights).
    pub entries: &'static [(&'static str, &'static str)],
    /// Expected JSON encoding.
    pub expected_json: &'static str,
    /// Expected CBOR encoding (hex).
    pub expected_cbor: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "empty ACL",
            entries: &[],
            expected_json: r#"{"entries":{}}"#,
            expected_cbor: "a167656e7472696573a0",
        },
        GoldenVector {
            name: "single user",
            entries: &[("bob", "lr")],
            expected_json: r#"{"entries":{"bob":"lr"}}"#,
            expected_cbor: "a167656e7472696573a163626f62626c72",
        },
        GoldenVector {
            name: "personal mailbox default",
            entries: &[("owner", "aeiklprstwx")],
            expected_json: r#"{"entries":{"owner":"aeiklprstwx"}}"#,
            expected_cbor: "a167656e7472696573a1656f776e65726b6165696b6c707273747778",
        },
        GoldenVector {
            name: "mixed keys sort by text",
            entries: &[
                ("owner", "aeiklprstwx"),
                ("bob", "lr"),
                ("-bob", "r"),
                ("$staff", "lrs"),
            ],
            expected_json: r#"{"entries":{"$staff":"lrs","-bob":"r","bob":"lr","owner":"aeiklprstwx"}}"#,
            expected_cbor: concat!(
                "a167656e7472696573a4",
                "66247374616666636c7273",
                "642d626f626172",
                "63626f62626c72",
                "656f776e65726b6165696b6c707273747778",
            ),
        },
        GoldenVector {
            name: "special identifiers",
            entries: &[
                ("anyone", "l"),
                ("authenticated", "lr"),
                ("-anyone", "p"),
            ],
            expected_json: r#"{"entries":{"-anyone":"p","anyone":"l","authenticated":"lr"}}"#,
            expected_cbor: concat!(
                "a167656e7472696573a3",
                "672d616e796f6e656170",
                "66616e796f6e65616c",
                "6d61757468656e74696361746564626c72",
            ),
        },
    ]
}

/// Build the ACL a vector describes.
///
/// Panics if the vector itself is malformed.
pub fn acl_from_vector(vector: &GoldenVector) -> MailboxAcl {
    MailboxAcl::from_entries(vector.entries.iter().map(|(key, rights)| {
        (
            EntryKey::parse(key).expect("vector key"),
            Rights::parse(rights).expect("vector rights"),
        )
    }))
}

/// Encode every vector and compare against the pinned bytes.
///
/// Returns `(name, matches, json, cbor hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let acl = acl_from_vector(v);
            let json = JsonCodec
                .encode(&acl)
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default();
            let cbor = CborCodec.encode(&acl).map(hex::encode).unwrap_or_default();

            let matches = json == v.expected_json && cbor == v.expected_cbor;

            (v.name.to_string(), matches, json, cbor)
        })
        .collect()
}
