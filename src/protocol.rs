//! JSON frames exchanged with clients.
//!
//! Every frame is an object with a `type` tag; field names are camelCase.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    ConnectionId, RoomId, Token,
    rooms::{MessageView, Participant, RoomSummary},
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Action {
    Register {
        #[serde(default)]
        name: Option<String>,
    },
    Rename {
        #[serde(default)]
        name: Option<String>,
    },
    Export {
        #[serde(default)]
        secret: Option<String>,
    },
    Import {
        #[serde(default)]
        secret: Option<String>,
    },
    RequestAllNames,
    ListRooms,
    CreateRoom {
        #[serde(default)]
        name: Option<String>,
    },
    RenameRoom {
        #[serde(default)]
        room_id: Option<RoomId>,
        #[serde(default)]
        name: Option<String>,
    },
    DeleteRoom {
        #[serde(default)]
        room_id: Option<RoomId>,
    },
    JoinRoom {
        #[serde(default)]
        room_id: Option<RoomId>,
    },
    LeaveRoom,
    SendMessage {
        room_id: RoomId,
        body: String,
        #[serde(default)]
        reply_to: Option<Uuid>,
    },
    EditMessage {
        room_id: RoomId,
        message_id: Uuid,
        body: String,
    },
    DeleteMessage {
        room_id: RoomId,
        message_id: Uuid,
    },
    Disconnect,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Rename { .. } => "rename",
            Self::Export { .. } => "export",
            Self::Import { .. } => "import",
            Self::RequestAllNames => "requestAllNames",
            Self::ListRooms => "listRooms",
            Self::CreateRoom { .. } => "createRoom",
            Self::RenameRoom { .. } => "renameRoom",
            Self::DeleteRoom { .. } => "deleteRoom",
            Self::JoinRoom { .. } => "joinRoom",
            Self::LeaveRoom => "leaveRoom",
            Self::SendMessage { .. } => "sendMessage",
            Self::EditMessage { .. } => "editMessage",
            Self::DeleteMessage { .. } => "deleteMessage",
            Self::Disconnect => "disconnect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Event {
    RoomList {
        rooms: Vec<RoomSummary>,
    },
    CreatedRoom {
        room_id: RoomId,
        name: String,
    },
    RoomHistory {
        room_id: RoomId,
        name: String,
        messages: Vec<MessageView>,
    },
    RoomParticipants {
        room_id: RoomId,
        participants: Vec<Participant>,
    },
    NewMessage {
        room_id: RoomId,
        message: MessageView,
    },
    MessageEdited {
        room_id: RoomId,
        message: MessageView,
    },
    MessageDeleted {
        room_id: RoomId,
        message_id: Uuid,
    },
    UserNameUpdated {
        token: Token,
        new_name: String,
    },
    OwnershipRetargeted {
        old_token: Token,
        new_token: Token,
        new_name: String,
    },
    ExportResult {
        success: bool,
        message: String,
    },
    ImportResult {
        success: bool,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        new_name: Option<String>,
    },
    AllNames {
        names: Vec<String>,
    },
}

/// An event together with the connections it is addressed to, resolved at
/// the moment it was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub recipients: Vec<ConnectionId>,
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn actions_parse_from_camel_case() {
        let action: Action = serde_json::from_value(json!({
            "type": "sendMessage",
            "roomId": "room-1",
            "body": "hi",
        }))
        .unwrap();
        assert_eq!(
            action,
            Action::SendMessage { room_id: "room-1".into(), body: "hi".into(), reply_to: None }
        );

        let action: Action = serde_json::from_value(json!({ "type": "export" })).unwrap();
        assert_eq!(action, Action::Export { secret: None });
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(serde_json::from_value::<Action>(json!({ "type": "selfDestruct" })).is_err());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let value = serde_json::to_value(Event::OwnershipRetargeted {
            old_token: "c1".into(),
            new_token: "abc123".into(),
            new_name: "alice".into(),
        })
        .unwrap();
        assert_eq!(
            value,
            json!({
                "type": "ownershipRetargeted",
                "oldToken": "c1",
                "newToken": "abc123",
                "newName": "alice",
            })
        );

        let value = serde_json::to_value(Event::ImportResult {
            success: false,
            message: "invalid secret".into(),
            new_name: None,
        })
        .unwrap();
        assert!(value.get("newName").is_none());
    }
}
