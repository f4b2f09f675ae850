//! Proptest generators for property-based testing.

use proptest::prelude::*;

use mailacl_core::{AclCommand, EditMode, EntryKey, MailboxAcl, MailboxId, NameType, Right, Rights};

/// Generate a single right.
pub fn right() -> impl Strategy<Value = Right> {
    prop::sample::select(Right::ALL.to_vec())
}

/// Generate any rights set, empty included.
pub fn rights() -> impl Strategy<Value = Rights> {
    any::<u16>().prop_map(|bits| -> Rights {
        Right::ALL
            .iter()
            .enumerate()
            .filter(|(i, _)| bits & (1 << i) != 0)
            .map(|(_, right)| *right)
            .collect()
    })
}

/// Generate a non-empty rights set.
pub fn non_empty_rights() -> impl Strategy<Value = Rights> {
    rights().prop_filter("non-empty", |r| !r.is_empty())
}

/// Generate a random MailboxId.
pub fn mailbox_id() -> impl Strategy<Value = MailboxId> {
    any::<[u8; 16]>().prop_map(MailboxId::from_bytes)
}

/// Generate a user or group name from a small pool, so that independently
/// generated ACLs share keys.
pub fn principal_name() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => prop::sample::select(vec!["alice", "bob", "carol", "dave", "staff"])
            .prop_map(String::from),
        1 => "[a-z][a-z0-9.@]{0,15}".prop_map(String::from),
    ]
}

/// Generate an entry key of any type and polarity.
pub fn entry_key() -> impl Strategy<Value = EntryKey> {
    let special = prop::sample::select(vec![
        EntryKey::owner(),
        EntryKey::anyone(),
        EntryKey::authenticated(),
    ]);
    let named = (principal_name(), any::<bool>()).prop_filter_map(
        "reserved name",
        |(name, group)| {
            let name_type = if group { NameType::Group } else { NameType::User };
            EntryKey::new(name, name_type, false).ok()
        },
    );

    (prop_oneof![1 => special, 4 => named], any::<bool>())
        .prop_map(|(key, negative)| if negative { key.negate() } else { key })
}

/// Generate an ACL with up to 8 entries.
pub fn mailbox_acl() -> impl Strategy<Value = MailboxAcl> {
    prop::collection::vec((entry_key(), rights()), 0..=8).prop_map(MailboxAcl::from_entries)
}

/// Generate an edit mode.
pub fn edit_mode() -> impl Strategy<Value = EditMode> {
    prop_oneof![
        Just(EditMode::Add),
        Just(EditMode::Remove),
        Just(EditMode::Replace),
    ]
}

/// Generate an ACL command.
pub fn acl_command() -> impl Strategy<Value = AclCommand> {
    (entry_key(), edit_mode(), rights())
        .prop_map(|(key, mode, rights)| AclCommand::new(key, mode, rights))
}
