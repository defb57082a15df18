use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ChatError, Result};
use crate::models::{ChatMessage, ReactionAction};

pub const EVENT_MESSAGE_NEW: &str = "message:new";
pub const EVENT_TYPING_START: &str = "typing:start";
pub const EVENT_TYPING_STOP: &str = "typing:stop";
pub const EVENT_USER_ONLINE: &str = "user:online";
pub const EVENT_USER_OFFLINE: &str = "user:offline";
pub const EVENT_ONLINE_USERS: &str = "users:online";
pub const EVENT_MESSAGES_READ: &str = "messages:read";
pub const EVENT_MESSAGE_REACTION: &str = "message:reaction";

pub const EVENT_MESSAGE_SEND: &str = "message:send";
pub const EVENT_TYPING: &str = "typing";
pub const EVENT_CHAT_JOIN: &str = "chat:join";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewMessagePayload {
    pub message: ChatMessage,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub user_id: i64,
    pub chat_uid: String,
    #[serde(default)]
    pub is_typing: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUsersPayload {
    pub user_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesReadPayload {
    pub chat_uid: String,
    pub read_by: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionPayload {
    pub message_uid: String,
    pub emoji: String,
    pub user_id: i64,
    pub action: ReactionAction,
}

/// Events pushed by the server over the live channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    NewMessage(ChatMessage),
    TypingStarted { user_id: i64, chat_uid: String },
    TypingStopped { user_id: i64, chat_uid: String },
    UserOnline(i64),
    UserOffline(i64),
    OnlineUsers(Vec<i64>),
    MessagesRead(MessagesReadPayload),
    Reaction(ReactionPayload),
}

impl ServerEvent {
    /// Maps a named event frame to a typed event. Unknown names yield `None`.
    pub fn from_frame(name: &str, payload: Value) -> Result<Option<ServerEvent>> {
        let event = match name {
            EVENT_MESSAGE_NEW => {
                ServerEvent::NewMessage(parse::<NewMessagePayload>(name, payload)?.message)
            }
            EVENT_TYPING_START | EVENT_TYPING_STOP => {
                let p: TypingPayload = parse(name, payload)?;
                // An explicit flag wins over the event name.
                let typing = p.is_typing.unwrap_or(name == EVENT_TYPING_START);
                if typing {
                    ServerEvent::TypingStarted {
                        user_id: p.user_id,
                        chat_uid: p.chat_uid,
                    }
                } else {
                    ServerEvent::TypingStopped {
                        user_id: p.user_id,
                        chat_uid: p.chat_uid,
                    }
                }
            }
            EVENT_USER_ONLINE => ServerEvent::UserOnline(parse::<UserPayload>(name, payload)?.user_id),
            EVENT_USER_OFFLINE => {
                ServerEvent::UserOffline(parse::<UserPayload>(name, payload)?.user_id)
            }
            EVENT_ONLINE_USERS => {
                ServerEvent::OnlineUsers(parse::<OnlineUsersPayload>(name, payload)?.user_ids)
            }
            EVENT_MESSAGES_READ => ServerEvent::MessagesRead(parse(name, payload)?),
            EVENT_MESSAGE_REACTION => ServerEvent::Reaction(parse(name, payload)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

fn parse<T: serde::de::DeserializeOwned>(name: &str, payload: Value) -> Result<T> {
    serde_json::from_value(payload)
        .map_err(|e| ChatError::Packet(format!("bad payload for '{name}': {e}")))
}

/// Events the client emits over the live channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    SendMessage {
        to_user_uid: String,
        chat_uid: String,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Typing {
        to_user_id: i64,
        is_typing: bool,
        chat_uid: String,
    },
    #[serde(rename_all = "camelCase")]
    JoinChat { chat_uid: String },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::SendMessage { .. } => EVENT_MESSAGE_SEND,
            ClientEvent::Typing { .. } => EVENT_TYPING,
            ClientEvent::JoinChat { .. } => EVENT_CHAT_JOIN,
        }
    }

    pub fn payload(&self) -> Value {
        // Plain structs and strings never fail to serialize.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
