mod msg;
mod presence;

pub use msg::{Message, MessageView, ReplyPreview};
pub use presence::Participant;

use indexmap::IndexMap;
use serde::Serialize;
use uuid::Uuid;

use crate::{ConnectionId, RoomId};

pub const DEFAULT_ROOM_ID: &str = "room-1";
pub const NEW_ROOM_NAME: &str = "New Room";

#[derive(Debug, Clone)]
pub struct Room {
    pub name: String,
    pub messages: Vec<Message>,
    /// Member connection -> display name shown in presence.
    pub members: IndexMap<ConnectionId, String>,
}

impl Room {
    pub fn new(name: String) -> Self {
        Self { name, messages: Vec::new(), members: IndexMap::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub name: String,
}

#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: IndexMap<RoomId, Room>,
}

impl RoomStore {
    /// A store holding only the default room.
    pub fn with_default_room(name: &str) -> Self {
        let mut rooms = IndexMap::new();
        rooms.insert(DEFAULT_ROOM_ID.to_owned(), Room::new(name.to_owned()));
        Self { rooms }
    }

    pub fn create(&mut self, name: Option<&str>) -> RoomId {
        let name = match name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => NEW_ROOM_NAME.to_owned(),
        };
        let id = loop {
            let id = format!("room-{}", Uuid::now_v7().simple());
            if !self.rooms.contains_key(&id) {
                break id;
            }
        };
        self.rooms.insert(id.clone(), Room::new(name));
        id
    }

    pub fn rename(&mut self, id: &str, name: &str) -> bool {
        match self.rooms.get_mut(id) {
            Some(room) => {
                room.name = name.to_owned();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Room> {
        self.rooms.shift_remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Room> {
        self.rooms.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rooms.contains_key(id)
    }

    pub fn list(&self) -> Vec<RoomSummary> {
        self.rooms
            .iter()
            .map(|(id, room)| RoomSummary { room_id: id.clone(), name: room.name.clone() })
            .collect()
    }

    /// Members of a room, or nobody if it does not exist.
    pub fn members(&self, id: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(id)
            .map(|room| room.members.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn add_member(&mut self, id: &str, conn: &str, name: &str) -> bool {
        match self.rooms.get_mut(id) {
            Some(room) => {
                room.members.insert(conn.to_owned(), name.to_owned());
                true
            }
            None => false,
        }
    }

    pub fn remove_member(&mut self, id: &str, conn: &str) -> bool {
        self.rooms
            .get_mut(id)
            .is_some_and(|room| room.members.shift_remove(conn).is_some())
    }

    /// Updates the name shown for `conn` in every room it is a member of.
    pub fn set_member_name(&mut self, conn: &str, name: &str) {
        for room in self.rooms.values_mut() {
            if let Some(shown) = room.members.get_mut(conn) {
                *shown = name.to_owned();
            }
        }
    }

    /// Moves every message owned by `old` over to `new`, stamping `name` as
    /// the author. Covers all rooms in one pass; returns how many changed.
    ///
    /// With `old == new` this is a pure author rename.
    pub fn retarget(&mut self, old: &str, new: &str, name: &str) -> usize {
        let mut changed = 0;
        for room in self.rooms.values_mut() {
            for msg in room.messages.iter_mut().filter(|msg| msg.owner_token == old) {
                msg.owner_token = new.to_owned();
                msg.author = name.to_owned();
                changed += 1;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_the_default_room() {
        let store = RoomStore::with_default_room("General");
        assert_eq!(
            store.list(),
            vec![RoomSummary { room_id: DEFAULT_ROOM_ID.to_owned(), name: "General".to_owned() }]
        );
    }

    #[test]
    fn create_defaults_the_name_and_never_reuses_ids() {
        let mut store = RoomStore::default();
        let a = store.create(None);
        let b = store.create(Some(""));
        let c = store.create(Some("Team"));
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_eq!(store.get(&a).unwrap().name, NEW_ROOM_NAME);
        assert_eq!(store.get(&b).unwrap().name, NEW_ROOM_NAME);
        assert_eq!(store.get(&c).unwrap().name, "Team");
    }

    #[test]
    fn list_keeps_creation_order() {
        let mut store = RoomStore::with_default_room("General");
        let team = store.create(Some("Team"));
        let ids: Vec<_> = store.list().into_iter().map(|s| s.room_id).collect();
        assert_eq!(ids, vec![DEFAULT_ROOM_ID.to_owned(), team]);
    }

    #[test]
    fn remove_twice_is_harmless() {
        let mut store = RoomStore::with_default_room("General");
        let id = store.create(Some("tmp"));
        assert!(store.remove(&id).is_some());
        let after_first = store.list();
        assert!(store.remove(&id).is_none());
        assert_eq!(store.list(), after_first);
    }

    #[test]
    fn retarget_spans_every_room() {
        let mut store = RoomStore::with_default_room("General");
        let other = store.create(Some("Other"));
        store.get_mut(DEFAULT_ROOM_ID).unwrap().append("alice", "old", "a".into(), None, 1);
        store.get_mut(&other).unwrap().append("alice", "old", "b".into(), None, 2);
        store.get_mut(&other).unwrap().append("bob", "bob-tok", "c".into(), None, 3);

        assert_eq!(store.retarget("old", "secret", "Alice"), 2);

        for room_id in [DEFAULT_ROOM_ID, other.as_str()] {
            for msg in &store.get(room_id).unwrap().messages {
                if msg.author == "bob" {
                    assert_eq!(msg.owner_token, "bob-tok");
                } else {
                    assert_eq!(msg.owner_token, "secret");
                    assert_eq!(msg.author, "Alice");
                }
            }
        }
        assert_eq!(store.retarget("old", "secret", "Alice"), 0);
    }

    #[test]
    fn membership_edits_on_missing_room_report_false() {
        let mut store = RoomStore::default();
        assert!(!store.add_member("nope", "c1", "x"));
        assert!(!store.remove_member("nope", "c1"));
        assert!(store.members("nope").is_empty());
    }
}
