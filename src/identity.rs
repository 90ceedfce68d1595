//! Per-connection identity and the durable token store.
//!
//! Every live connection has a display name and a current ownership token.
//! The token starts out as the connection id and is replaced by a
//! caller-chosen secret on export/import.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::{ConnectionId, RoomId, Token};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub token: Token,
    pub room: Option<RoomId>,
    /// Set once the client has chosen a name: `register`, `rename` or a
    /// successful `import`.
    pub registered: bool,
}

/// `User-` followed by the last four characters of the connection id.
pub fn placeholder_name(conn: &str) -> String {
    let suffix: String = {
        let chars: Vec<char> = conn.chars().collect();
        chars[chars.len().saturating_sub(4)..].iter().collect()
    };
    format!("User-{suffix}")
}

fn name_or_placeholder(conn: &str, name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => placeholder_name(conn),
    }
}

#[derive(Debug, Default)]
pub struct IdentityRegistry {
    identities: IndexMap<ConnectionId, Identity>,
}

impl IdentityRegistry {
    /// Allocates an identity for a fresh connection with its id as token.
    pub fn connect(&mut self, conn: &str) -> &Identity {
        self.identities
            .entry(conn.to_owned())
            .or_insert_with(|| Identity {
                name: placeholder_name(conn),
                token: conn.to_owned(),
                room: None,
                registered: false,
            })
    }

    pub fn register(&mut self, conn: &str, name: Option<&str>) -> Option<&Identity> {
        let identity = self.identities.get_mut(conn)?;
        identity.name = name_or_placeholder(conn, name);
        identity.registered = true;
        Some(&*identity)
    }

    /// Returns the new name, or `None` if the connection is unknown.
    pub fn rename(&mut self, conn: &str, name: Option<&str>) -> Option<String> {
        let identity = self.identities.get_mut(conn)?;
        identity.name = name_or_placeholder(conn, name);
        identity.registered = true;
        Some(identity.name.clone())
    }

    pub fn bind(&mut self, conn: &str, token: &str, name: &str) {
        if let Some(identity) = self.identities.get_mut(conn) {
            identity.token = token.to_owned();
            identity.name = name.to_owned();
        }
    }

    pub fn mark_registered(&mut self, conn: &str) {
        if let Some(identity) = self.identities.get_mut(conn) {
            identity.registered = true;
        }
    }

    pub fn set_room(&mut self, conn: &str, room: Option<RoomId>) {
        if let Some(identity) = self.identities.get_mut(conn) {
            identity.room = room;
        }
    }

    pub fn get(&self, conn: &str) -> Option<&Identity> {
        self.identities.get(conn)
    }

    pub fn token_of(&self, conn: &str) -> Option<&str> {
        self.identities.get(conn).map(|identity| identity.token.as_str())
    }

    pub fn room_of(&self, conn: &str) -> Option<&RoomId> {
        self.identities.get(conn).and_then(|identity| identity.room.as_ref())
    }

    pub fn remove(&mut self, conn: &str) -> Option<Identity> {
        self.identities.shift_remove(conn)
    }

    pub fn connections(&self) -> impl Iterator<Item = &ConnectionId> {
        self.identities.keys()
    }

    /// Display names of every connection that has chosen a name, in connect
    /// order.
    pub fn registered_names(&self) -> Vec<String> {
        self.identities
            .values()
            .filter(|identity| identity.registered)
            .map(|identity| identity.name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub name: String,
    /// Clock time of the export that wrote this record, in milliseconds.
    pub exported_at: i64,
}

/// Exported secrets and the name captured when they were bound.
///
/// Entries are never evicted.
#[derive(Debug, Default)]
pub struct TokenStore {
    records: HashMap<Token, TokenRecord>,
}

impl TokenStore {
    /// Last writer wins.
    pub fn bind(&mut self, secret: &str, name: &str, now_ms: i64) {
        self.records.insert(
            secret.to_owned(),
            TokenRecord { name: name.to_owned(), exported_at: now_ms },
        );
    }

    pub fn lookup(&self, secret: &str) -> Option<&TokenRecord> {
        self.records.get(secret)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_uses_connection_id_as_token() {
        let mut registry = IdentityRegistry::default();
        let identity = registry.connect("0192abcd");
        assert_eq!(identity.token, "0192abcd");
        assert_eq!(identity.name, "User-abcd");
        assert!(!identity.registered);
    }

    #[test]
    fn register_replaces_blank_names_with_placeholder() {
        let mut registry = IdentityRegistry::default();
        registry.connect("conn-9f3e");
        assert_eq!(registry.register("conn-9f3e", Some("   ")).unwrap().name, "User-9f3e");
        assert_eq!(registry.register("conn-9f3e", Some("alice")).unwrap().name, "alice");
        assert_eq!(registry.registered_names(), vec!["alice".to_owned()]);
    }

    #[test]
    fn placeholder_handles_short_ids() {
        assert_eq!(placeholder_name("ab"), "User-ab");
    }

    #[test]
    fn rename_of_unknown_connection_is_none() {
        let mut registry = IdentityRegistry::default();
        assert_eq!(registry.rename("nobody", Some("x")), None);
    }

    #[test]
    fn only_registered_connections_are_listed() {
        let mut registry = IdentityRegistry::default();
        registry.connect("a");
        registry.connect("b");
        registry.register("b", Some("bob"));
        assert_eq!(registry.registered_names(), vec!["bob".to_owned()]);
        registry.remove("b");
        assert!(registry.registered_names().is_empty());
    }

    #[test]
    fn rename_and_import_also_list_a_connection() {
        let mut registry = IdentityRegistry::default();
        registry.connect("a");
        registry.connect("b");
        registry.connect("c");
        registry.rename("a", Some("renamed"));
        registry.bind("b", "secret", "exported");
        assert_eq!(registry.registered_names(), vec!["renamed".to_owned()]);

        registry.mark_registered("b");
        assert_eq!(
            registry.registered_names(),
            vec!["renamed".to_owned(), "exported".to_owned()]
        );
    }

    #[test]
    fn token_store_is_last_writer_wins() {
        let mut store = TokenStore::default();
        store.bind("s3cret", "alice", 1);
        store.bind("s3cret", "bob", 2);
        assert_eq!(store.len(), 1);
        let record = store.lookup("s3cret").unwrap();
        assert_eq!(record.name, "bob");
        assert_eq!(record.exported_at, 2);
        assert!(store.lookup("other").is_none());
    }
}
