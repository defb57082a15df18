use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A participant reference as embedded in a [`Chat`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: i64,
    pub uid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// A 1:1 conversation as seen by the logged-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub uid: String,
    pub user1: ChatUser,
    pub user2: ChatUser,
    #[serde(default)]
    pub unread_count: u32,
    /// Holds at most the latest message, never the history.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Chat {
    /// The participant that is not `self_id`.
    pub fn other_user(&self, self_id: i64) -> &ChatUser {
        if self.user1.id == self_id {
            &self.user2
        } else {
            &self.user1
        }
    }

    pub fn summary(&self) -> Option<&ChatMessage> {
        self.messages.first()
    }

    pub fn summary_mut(&mut self) -> Option<&mut ChatMessage> {
        self.messages.first_mut()
    }

    /// Recency used for list ordering: summary message time, then
    /// `updated_at`, then `created_at`.
    pub fn activity_at(&self) -> DateTime<Utc> {
        self.summary()
            .map(|m| m.created_at)
            .or(self.updated_at)
            .unwrap_or(self.created_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionAction {
    Add,
    Remove,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub uid: String,
    #[serde(rename = "chatId")]
    pub chat_id: i64,
    #[serde(rename = "fromUserId")]
    pub from_user_id: i64,
    #[serde(rename = "toUserId")]
    pub to_user_id: i64,
    pub message: String,
    #[serde(rename = "isRead", default)]
    pub is_read: bool,
    /// Emoji -> reacting user ids, in reaction order.
    #[serde(default)]
    pub reactions: HashMap<String, Vec<i64>>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn is_unread_for(&self, user_id: i64) -> bool {
        !self.is_read && self.to_user_id == user_id && self.from_user_id != user_id
    }

    /// Applies a reaction change. Returns whether anything changed.
    pub fn react(&mut self, emoji: &str, user_id: i64, action: ReactionAction) -> bool {
        match action {
            ReactionAction::Add => {
                let ids = self.reactions.entry(emoji.to_string()).or_default();
                if ids.contains(&user_id) {
                    return false;
                }
                ids.push(user_id);
                true
            }
            ReactionAction::Remove => {
                let Some(ids) = self.reactions.get_mut(emoji) else {
                    return false;
                };
                let before = ids.len();
                ids.retain(|id| *id != user_id);
                let changed = ids.len() != before;
                if ids.is_empty() {
                    self.reactions.remove(emoji);
                }
                changed
            }
        }
    }
}

// ── REST envelopes ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ChatPage {
    pub chats: Vec<Chat>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: usize,
}

/// Messages come back newest-first.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagePage {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserPage {
    pub users: Vec<ChatUser>,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartChatRequest {
    pub user_uid: String,
}

/// Request body for `POST chat/send`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub to_user_uid: String,
    pub chat_uid: String,
    pub message: String,
}
