use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Token,
    error::{ChatError, ChatResult},
};

use super::Room;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// UUIDv7, so ids sort in creation order.
    pub id: Uuid,
    pub author: String,
    pub owner_token: Token,
    pub body: String,
    pub timestamp: i64,
    /// Weak reference; the target may have been deleted since.
    pub reply_to: Option<Uuid>,
    #[serde(default)]
    pub edited: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyPreview {
    pub message_id: Uuid,
    pub author: String,
    pub body: String,
}

/// A message as sent to clients, with its reply reference resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_preview: Option<ReplyPreview>,
}

impl Room {
    pub fn append(
        &mut self,
        author: &str,
        owner_token: &str,
        body: String,
        reply_to: Option<Uuid>,
        now_ms: i64,
    ) -> &Message {
        self.messages.push(Message {
            id: Uuid::now_v7(),
            author: author.to_owned(),
            owner_token: owner_token.to_owned(),
            body,
            timestamp: now_ms,
            reply_to,
            edited: false,
        });
        let last = self.messages.len() - 1;
        &self.messages[last]
    }

    pub fn message(&self, id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|msg| msg.id == id)
    }

    fn owned_position(&self, id: Uuid, requester_token: &str) -> ChatResult<usize> {
        let idx = self
            .messages
            .iter()
            .position(|msg| msg.id == id)
            .ok_or(ChatError::NoSuchMessage(id))?;
        if self.messages[idx].owner_token != requester_token {
            return Err(ChatError::NotAuthorized);
        }
        Ok(idx)
    }

    pub fn edit(&mut self, id: Uuid, requester_token: &str, body: String) -> ChatResult<&Message> {
        let idx = self.owned_position(id, requester_token)?;
        let msg = &mut self.messages[idx];
        msg.body = body;
        msg.edited = true;
        Ok(&*msg)
    }

    pub fn remove(&mut self, id: Uuid, requester_token: &str) -> ChatResult<Message> {
        let idx = self.owned_position(id, requester_token)?;
        Ok(self.messages.remove(idx))
    }

    /// Resolves `reply_to` at read time; a missing referent yields no preview.
    pub fn view(&self, message: &Message) -> MessageView {
        let reply_preview = message
            .reply_to
            .and_then(|id| self.message(id))
            .map(|target| ReplyPreview {
                message_id: target.id,
                author: target.author.clone(),
                body: target.body.clone(),
            });
        MessageView { message: message.clone(), reply_preview }
    }

    /// The newest `limit` messages, oldest first.
    pub fn history(&self, limit: usize) -> Vec<MessageView> {
        let start = self.messages.len().saturating_sub(limit);
        self.messages[start..].iter().map(|msg| self.view(msg)).collect()
    }
}
