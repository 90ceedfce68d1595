//! Connection lifecycle and action sequencing.
//!
//! The [`Coordinator`] owns the whole chat [`State`] and applies one action at
//! a time: refresh activity, mutate, then compute the events that follow from
//! the committed state. It never talks to sockets; it hands back [`Outbound`]
//! batches for the transport to deliver in order.

mod rebind;

pub use rebind::Rebind;

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    ConnectionId,
    activity::{ActivityTracker, Clock},
    config::Config,
    error::{ChatError, ChatResult},
    identity::{IdentityRegistry, TokenStore},
    protocol::{Action, Event, Outbound},
    rooms::{Participant, RoomStore, RoomSummary},
};

/// Everything the chat server knows. Lives for the life of the process.
#[derive(Debug)]
pub struct State {
    pub identities: IdentityRegistry,
    pub tokens: TokenStore,
    pub rooms: RoomStore,
    pub activity: ActivityTracker,
}

impl State {
    pub fn new(config: &Config) -> Self {
        Self {
            identities: IdentityRegistry::default(),
            tokens: TokenStore::default(),
            rooms: RoomStore::with_default_room(&config.default_room_name),
            activity: ActivityTracker::default(),
        }
    }
}

pub struct Coordinator {
    state: State,
    clock: Arc<dyn Clock>,
    idle_threshold_ms: i64,
    history_limit: usize,
}

impl Coordinator {
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: State::new(config),
            clock,
            idle_threshold_ms: config.idle_threshold_ms(),
            history_limit: config.history_limit,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn room_list(&self) -> Vec<RoomSummary> {
        self.state.rooms.list()
    }

    pub fn is_connected(&self, conn: &str) -> bool {
        self.state.identities.get(conn).is_some()
    }

    pub fn connect(&mut self, conn: &str) {
        let now = self.clock.now_ms();
        self.state.identities.connect(conn);
        self.state.activity.touch(conn, now);
        info!(conn = %conn, "connected");
    }

    pub fn disconnect(&mut self, conn: &str) -> Vec<Outbound> {
        let mut out = Vec::new();
        if !self.is_connected(conn) {
            return out;
        }
        self.leave_current(conn, &mut out);
        self.state.identities.remove(conn);
        self.state.activity.forget(conn);
        info!(conn = %conn, "disconnected");
        out
    }

    /// Applies one client action. Unknown connections are ignored.
    pub fn handle(&mut self, conn: &str, action: Action) -> Vec<Outbound> {
        let mut out = Vec::new();
        if !self.is_connected(conn) {
            debug!(conn = %conn, action = action.name(), "action from unknown connection");
            return out;
        }
        let now = self.clock.now_ms();
        self.state.activity.touch(conn, now);

        let action_name = action.name();
        let result = match action {
            Action::Register { name } => self.register(conn, name.as_deref(), &mut out),
            Action::Rename { name } => self.rename(conn, name.as_deref(), &mut out),
            Action::Export { secret } => self.export(conn, secret.as_deref(), &mut out),
            Action::Import { secret } => self.import(conn, secret.as_deref(), &mut out),
            Action::RequestAllNames => {
                let names = self.state.identities.registered_names();
                self.emit_to(conn, Event::AllNames { names }, &mut out);
                Ok(())
            }
            Action::ListRooms => {
                self.emit_to(conn, Event::RoomList { rooms: self.room_list() }, &mut out);
                Ok(())
            }
            Action::CreateRoom { name } => self.create_room(conn, name.as_deref(), &mut out),
            Action::RenameRoom { room_id, name } => {
                self.rename_room(room_id.as_deref(), name.as_deref(), &mut out)
            }
            Action::DeleteRoom { room_id } => self.delete_room(room_id.as_deref(), &mut out),
            Action::JoinRoom { room_id } => self.join(conn, room_id.as_deref(), &mut out),
            Action::LeaveRoom => {
                self.leave_current(conn, &mut out);
                Ok(())
            }
            Action::SendMessage { room_id, body, reply_to } => {
                self.send_message(conn, &room_id, body, reply_to, &mut out)
            }
            Action::EditMessage { room_id, message_id, body } => {
                self.edit_message(conn, &room_id, message_id, body, &mut out)
            }
            Action::DeleteMessage { room_id, message_id } => {
                self.delete_message(conn, &room_id, message_id, &mut out)
            }
            Action::Disconnect => return self.disconnect(conn),
        };

        if let Err(err) = result {
            debug!(conn = %conn, action = action_name, error = %err, "action dropped");
        }
        out
    }

    fn register(&mut self, conn: &str, name: Option<&str>, out: &mut Vec<Outbound>) -> ChatResult<()> {
        let identity = self
            .state
            .identities
            .register(conn, name)
            .ok_or_else(|| ChatError::UnknownConnection(conn.to_owned()))?;
        info!(conn = %conn, name = %identity.name, "registered");
        self.emit_to(conn, Event::RoomList { rooms: self.room_list() }, out);
        Ok(())
    }

    fn rename(&mut self, conn: &str, name: Option<&str>, out: &mut Vec<Outbound>) -> ChatResult<()> {
        let name = self
            .state
            .identities
            .rename(conn, name)
            .ok_or_else(|| ChatError::UnknownConnection(conn.to_owned()))?;
        let token = self.current_token(conn)?;

        self.state.rooms.set_member_name(conn, &name);
        let changed = self.state.rooms.retarget(&token, &token, &name);
        info!(conn = %conn, name = %name, messages = changed, "renamed");

        if let Some(room_id) = self.state.identities.room_of(conn).cloned() {
            self.broadcast_presence(&room_id, out);
            self.emit_room(&room_id, Event::UserNameUpdated { token, new_name: name }, out);
        }
        Ok(())
    }

    fn create_room(&mut self, conn: &str, name: Option<&str>, out: &mut Vec<Outbound>) -> ChatResult<()> {
        let room_id = self.state.rooms.create(name);
        info!(conn = %conn, room = %room_id, "room created");

        self.join(conn, Some(room_id.as_str()), out)?;
        let name = self.room_name(&room_id)?;
        self.emit_to(conn, Event::CreatedRoom { room_id, name }, out);
        self.emit_all(Event::RoomList { rooms: self.room_list() }, out);
        Ok(())
    }

    fn rename_room(
        &mut self,
        room_id: Option<&str>,
        name: Option<&str>,
        out: &mut Vec<Outbound>,
    ) -> ChatResult<()> {
        let room_id = required(room_id, "room id is required")?;
        let name = required(name, "room name is required")?;
        if !self.state.rooms.rename(room_id, name) {
            return Err(ChatError::NoSuchRoom(room_id.to_owned()));
        }
        info!(room = %room_id, name = %name, "room renamed");
        self.emit_all(Event::RoomList { rooms: self.room_list() }, out);
        Ok(())
    }

    /// Evicts every member, one presence broadcast per eviction, then drops
    /// the room. Deleting a missing room does nothing.
    fn delete_room(&mut self, room_id: Option<&str>, out: &mut Vec<Outbound>) -> ChatResult<()> {
        let room_id = required(room_id, "room id is required")?;
        if !self.state.rooms.contains(room_id) {
            return Err(ChatError::NoSuchRoom(room_id.to_owned()));
        }

        for member in self.state.rooms.members(room_id) {
            self.state.rooms.remove_member(room_id, &member);
            self.state.identities.set_room(&member, None);
            self.broadcast_presence(room_id, out);
        }
        self.state.rooms.remove(room_id);
        info!(room = %room_id, "room deleted");

        self.emit_all(Event::RoomList { rooms: self.room_list() }, out);
        Ok(())
    }

    /// Leaves the current room (if any) before entering the new one, so the
    /// connection is never listed in two rooms at once.
    fn join(&mut self, conn: &str, room_id: Option<&str>, out: &mut Vec<Outbound>) -> ChatResult<()> {
        let room_id = required(room_id, "room id is required")?;
        self.leave_current(conn, out);

        let name = self
            .state
            .identities
            .get(conn)
            .map(|identity| identity.name.clone())
            .ok_or_else(|| ChatError::UnknownConnection(conn.to_owned()))?;
        if !self.state.rooms.add_member(room_id, conn, &name) {
            return Err(ChatError::NoSuchRoom(room_id.to_owned()));
        }
        self.state.identities.set_room(conn, Some(room_id.to_owned()));
        self.state.activity.touch(conn, self.clock.now_ms());

        let room = self
            .state
            .rooms
            .get(room_id)
            .ok_or_else(|| ChatError::NoSuchRoom(room_id.to_owned()))?;
        let history = Event::RoomHistory {
            room_id: room_id.to_owned(),
            name: room.name.clone(),
            messages: room.history(self.history_limit),
        };
        self.emit_to(conn, history, out);
        self.broadcast_presence(room_id, out);
        Ok(())
    }

    fn leave_current(&mut self, conn: &str, out: &mut Vec<Outbound>) {
        let Some(room_id) = self.state.identities.room_of(conn).cloned() else {
            return;
        };
        self.state.rooms.remove_member(&room_id, conn);
        self.state.identities.set_room(conn, None);
        self.broadcast_presence(&room_id, out);
    }

    fn send_message(
        &mut self,
        conn: &str,
        room_id: &str,
        body: String,
        reply_to: Option<Uuid>,
        out: &mut Vec<Outbound>,
    ) -> ChatResult<()> {
        let (author, token) = self
            .state
            .identities
            .get(conn)
            .map(|identity| (identity.name.clone(), identity.token.clone()))
            .ok_or_else(|| ChatError::UnknownConnection(conn.to_owned()))?;
        let now = self.clock.now_ms();

        let room = self
            .state
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| ChatError::NoSuchRoom(room_id.to_owned()))?;
        let message = room.append(&author, &token, body, reply_to, now).clone();
        let message = room.view(&message);

        self.emit_room(room_id, Event::NewMessage { room_id: room_id.to_owned(), message }, out);
        Ok(())
    }

    fn edit_message(
        &mut self,
        conn: &str,
        room_id: &str,
        message_id: Uuid,
        body: String,
        out: &mut Vec<Outbound>,
    ) -> ChatResult<()> {
        let token = self.current_token(conn)?;
        let room = self
            .state
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| ChatError::NoSuchRoom(room_id.to_owned()))?;
        let message = room.edit(message_id, &token, body)?.clone();
        let message = room.view(&message);

        self.emit_room(room_id, Event::MessageEdited { room_id: room_id.to_owned(), message }, out);
        Ok(())
    }

    fn delete_message(
        &mut self,
        conn: &str,
        room_id: &str,
        message_id: Uuid,
        out: &mut Vec<Outbound>,
    ) -> ChatResult<()> {
        let token = self.current_token(conn)?;
        self.state
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| ChatError::NoSuchRoom(room_id.to_owned()))?
            .remove(message_id, &token)?;

        self.emit_room(
            room_id,
            Event::MessageDeleted { room_id: room_id.to_owned(), message_id },
            out,
        );
        Ok(())
    }

    fn current_token(&self, conn: &str) -> ChatResult<String> {
        self.state
            .identities
            .token_of(conn)
            .map(str::to_owned)
            .ok_or_else(|| ChatError::UnknownConnection(conn.to_owned()))
    }

    fn room_name(&self, room_id: &str) -> ChatResult<String> {
        self.state
            .rooms
            .get(room_id)
            .map(|room| room.name.clone())
            .ok_or_else(|| ChatError::NoSuchRoom(room_id.to_owned()))
    }

    /// Fresh participant list for a room, idle flags computed against now.
    pub fn participants(&self, room_id: &str) -> Option<Vec<Participant>> {
        let room = self.state.rooms.get(room_id)?;
        Some(room.participants(
            &self.state.identities,
            &self.state.activity,
            self.clock.now_ms(),
            self.idle_threshold_ms,
        ))
    }

    fn broadcast_presence(&self, room_id: &str, out: &mut Vec<Outbound>) {
        if let Some(participants) = self.participants(room_id) {
            let event = Event::RoomParticipants { room_id: room_id.to_owned(), participants };
            self.emit_room(room_id, event, out);
        }
    }

    fn emit_to(&self, conn: &str, event: Event, out: &mut Vec<Outbound>) {
        out.push(Outbound { recipients: vec![conn.to_owned()], event });
    }

    fn emit_room(&self, room_id: &str, event: Event, out: &mut Vec<Outbound>) {
        let recipients = self.state.rooms.members(room_id);
        if !recipients.is_empty() {
            out.push(Outbound { recipients, event });
        }
    }

    fn emit_all(&self, event: Event, out: &mut Vec<Outbound>) {
        let recipients: Vec<ConnectionId> = self.state.identities.connections().cloned().collect();
        if !recipients.is_empty() {
            out.push(Outbound { recipients, event });
        }
    }
}

fn required<'a>(value: Option<&'a str>, what: &'static str) -> ChatResult<&'a str> {
    value.filter(|v| !v.is_empty()).ok_or(ChatError::InvalidInput(what))
}
