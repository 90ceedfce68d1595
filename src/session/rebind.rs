//! Token export/import: moving authorship from one token to another.

use tracing::info;

use crate::{
    error::{ChatError, ChatResult},
    protocol::{Event, Outbound},
};

use super::{Coordinator, State};

const EXPORT_OK: &str = "export complete";
const IMPORT_OK: &str = "import complete";
const SECRET_REQUIRED: &str = "a secret is required";
const INVALID_SECRET: &str = "invalid secret";

/// What a rebind changed, for the events that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rebind {
    pub old_token: String,
    pub new_token: String,
    pub name: String,
    pub messages: usize,
}

impl State {
    /// Points `conn` at `new_token` under `name` and moves every message
    /// owned by its current token across all rooms, together with its
    /// membership display names. Nothing is emitted until this returns.
    pub fn rebind(&mut self, conn: &str, new_token: &str, name: &str) -> ChatResult<Rebind> {
        let old_token = self
            .identities
            .token_of(conn)
            .map(str::to_owned)
            .ok_or_else(|| ChatError::UnknownConnection(conn.to_owned()))?;

        let messages = self.rooms.retarget(&old_token, new_token, name);
        self.identities.bind(conn, new_token, name);
        self.rooms.set_member_name(conn, name);

        Ok(Rebind {
            old_token,
            new_token: new_token.to_owned(),
            name: name.to_owned(),
            messages,
        })
    }
}

impl Coordinator {
    pub(super) fn export(
        &mut self,
        conn: &str,
        secret: Option<&str>,
        out: &mut Vec<Outbound>,
    ) -> ChatResult<()> {
        let event = match self.try_export(conn, secret, out) {
            Ok(()) => Event::ExportResult { success: true, message: EXPORT_OK.to_owned() },
            Err(ChatError::InvalidInput(why)) => {
                Event::ExportResult { success: false, message: why.to_owned() }
            }
            Err(err) => return Err(err),
        };
        self.emit_to(conn, event, out);
        Ok(())
    }

    fn try_export(&mut self, conn: &str, secret: Option<&str>, out: &mut Vec<Outbound>) -> ChatResult<()> {
        let secret = secret
            .filter(|s| !s.is_empty())
            .ok_or(ChatError::InvalidInput(SECRET_REQUIRED))?;
        let name = self
            .state
            .identities
            .get(conn)
            .map(|identity| identity.name.clone())
            .ok_or_else(|| ChatError::UnknownConnection(conn.to_owned()))?;

        self.state.tokens.bind(secret, &name, self.clock.now_ms());
        let rebind = self.state.rebind(conn, secret, &name)?;
        info!(
            conn = %conn,
            secret_len = secret.len(),
            messages = rebind.messages,
            "exported identity"
        );

        if let Some(room_id) = self.state.identities.room_of(conn).cloned() {
            self.emit_room(&room_id, retargeted(rebind), out);
            self.broadcast_presence(&room_id, out);
        }
        Ok(())
    }

    pub(super) fn import(
        &mut self,
        conn: &str,
        secret: Option<&str>,
        out: &mut Vec<Outbound>,
    ) -> ChatResult<()> {
        let event = match self.try_import(conn, secret, out) {
            Ok(name) => Event::ImportResult {
                success: true,
                message: IMPORT_OK.to_owned(),
                new_name: Some(name),
            },
            Err(ChatError::InvalidInput(why)) => Event::ImportResult {
                success: false,
                message: why.to_owned(),
                new_name: None,
            },
            Err(err) => return Err(err),
        };
        self.emit_to(conn, event, out);
        Ok(())
    }

    fn try_import(&mut self, conn: &str, secret: Option<&str>, out: &mut Vec<Outbound>) -> ChatResult<String> {
        let (secret, record) = secret
            .filter(|s| !s.is_empty())
            .and_then(|s| self.state.tokens.lookup(s).map(|record| (s, record.clone())))
            .ok_or(ChatError::InvalidInput(INVALID_SECRET))?;

        let rebind = self.state.rebind(conn, secret, &record.name)?;
        self.state.identities.mark_registered(conn);
        info!(
            conn = %conn,
            secret_len = secret.len(),
            messages = rebind.messages,
            exported_at = record.exported_at,
            age_ms = self.clock.now_ms() - record.exported_at,
            "imported identity"
        );

        if let Some(room_id) = self.state.identities.room_of(conn).cloned() {
            self.emit_room(&room_id, retargeted(rebind), out);
            self.broadcast_presence(&room_id, out);
        }
        Ok(record.name)
    }
}

fn retargeted(rebind: Rebind) -> Event {
    Event::OwnershipRetargeted {
        old_token: rebind.old_token,
        new_token: rebind.new_token,
        new_name: rebind.name,
    }
}

#[cfg(test)]
mod tests {
    use crate::{config::Config, rooms::DEFAULT_ROOM_ID};

    use super::*;

    #[test]
    fn rebind_moves_messages_and_membership_together() {
        let mut state = State::new(&Config::default());
        state.identities.connect("c1");
        state.rooms.add_member(DEFAULT_ROOM_ID, "c1", "old name");
        state.identities.set_room("c1", Some(DEFAULT_ROOM_ID.into()));
        let room = state.rooms.get_mut(DEFAULT_ROOM_ID).unwrap();
        room.append("old name", "c1", "one".into(), None, 1);
        room.append("someone", "c2", "two".into(), None, 2);

        let rebind = state.rebind("c1", "abc123", "Alice").unwrap();

        assert_eq!(rebind.old_token, "c1");
        assert_eq!(rebind.messages, 1);
        assert_eq!(state.identities.token_of("c1"), Some("abc123"));
        let room = state.rooms.get(DEFAULT_ROOM_ID).unwrap();
        assert_eq!(room.members["c1"], "Alice");
        assert_eq!(room.messages[0].owner_token, "abc123");
        assert_eq!(room.messages[0].author, "Alice");
        assert_eq!(room.messages[1].owner_token, "c2");
    }

    #[test]
    fn rebind_of_unknown_connection_changes_nothing() {
        let mut state = State::new(&Config::default());
        state
            .rooms
            .get_mut(DEFAULT_ROOM_ID)
            .unwrap()
            .append("x", "ghost", "boo".into(), None, 1);

        assert_eq!(
            state.rebind("ghost", "abc", "X").unwrap_err(),
            ChatError::UnknownConnection("ghost".into())
        );
        assert_eq!(state.rooms.get(DEFAULT_ROOM_ID).unwrap().messages[0].owner_token, "ghost");
    }
}
