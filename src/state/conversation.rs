//! Message history of the single open conversation.

use crate::models::{Chat, ChatMessage, ReactionAction};

use super::dedup;

/// Load state of the open conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPhase {
    Empty,
    LoadingInitial,
    Ready,
    LoadingMore,
}

/// A page request issued for a specific activation of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTicket {
    pub epoch: u64,
    pub chat_uid: String,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct ConversationBuffer {
    chat: Option<Chat>,
    /// Bumped on every activation; page results from older epochs are dropped.
    epoch: u64,
    messages: Vec<ChatMessage>,
    offset: usize,
    has_more: bool,
    phase: BufferPhase,
    auto_read_triggered: bool,
}

impl Default for ConversationBuffer {
    fn default() -> Self {
        Self {
            chat: None,
            epoch: 0,
            messages: Vec::new(),
            offset: 0,
            has_more: false,
            phase: BufferPhase::Empty,
            auto_read_triggered: false,
        }
    }
}

impl ConversationBuffer {
    pub fn chat(&self) -> Option<&Chat> {
        self.chat.as_ref()
    }

    pub fn chat_uid(&self) -> Option<&str> {
        self.chat.as_ref().map(|c| c.uid.as_str())
    }

    pub fn is_open(&self, chat_uid: &str) -> bool {
        self.chat_uid() == Some(chat_uid)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn phase(&self) -> BufferPhase {
        self.phase
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Resets everything for `chat` and returns the ticket for its first page.
    pub fn open(&mut self, chat: Chat, limit: usize) -> PageTicket {
        self.epoch += 1;
        let chat_uid = chat.uid.clone();
        *self = Self {
            chat: Some(chat),
            epoch: self.epoch,
            phase: BufferPhase::LoadingInitial,
            ..Self::default()
        };
        PageTicket {
            epoch: self.epoch,
            chat_uid,
            offset: 0,
            limit,
        }
    }

    pub fn close(&mut self) {
        let epoch = self.epoch + 1;
        *self = Self {
            epoch,
            ..Self::default()
        };
    }

    /// Ticket for the next older page, if the buffer is idle and more exist.
    pub fn begin_load_more(&mut self, limit: usize) -> Option<PageTicket> {
        if self.phase != BufferPhase::Ready || !self.has_more {
            return None;
        }
        let chat_uid = self.chat_uid()?.to_string();
        self.phase = BufferPhase::LoadingMore;
        Some(PageTicket {
            epoch: self.epoch,
            chat_uid,
            offset: self.offset,
            limit,
        })
    }

    /// Applies a newest-first page. Returns `false` if the ticket is stale.
    ///
    /// Messages pushed while the first page was in flight stay at the tail.
    pub fn apply_page(&mut self, ticket: &PageTicket, page: Vec<ChatMessage>) -> bool {
        if ticket.epoch != self.epoch {
            return false;
        }
        let fetched = page.len();
        let mut chronological = page;
        chronological.reverse();

        if ticket.offset == 0 {
            let pushed = std::mem::take(&mut self.messages);
            let mut messages = dedup::unseen(&[], chronological);
            let late = dedup::unseen(&messages, pushed);
            messages.extend(late);
            self.messages = messages;
        } else {
            let mut older = dedup::unseen(&self.messages, chronological);
            older.append(&mut self.messages);
            self.messages = older;
        }
        self.offset = ticket.offset + fetched;
        self.has_more = fetched == ticket.limit;
        self.phase = BufferPhase::Ready;
        true
    }

    /// Returns to the last settled phase after a failed fetch.
    pub fn fail_page(&mut self, ticket: &PageTicket) -> bool {
        if ticket.epoch != self.epoch {
            return false;
        }
        self.phase = match self.phase {
            BufferPhase::LoadingInitial => BufferPhase::Empty,
            BufferPhase::LoadingMore => BufferPhase::Ready,
            other => other,
        };
        true
    }

    /// Appends a pushed message if it belongs to the open conversation and
    /// is not already buffered.
    pub fn append_incoming(&mut self, message: &ChatMessage) -> bool {
        let Some(chat) = &self.chat else {
            return false;
        };
        if chat.id != message.chat_id || dedup::contains_uid(&self.messages, &message.uid) {
            return false;
        }
        self.messages.push(message.clone());
        true
    }

    /// Marks every message addressed to `reader_id` (and not sent by them)
    /// as read. Returns how many flipped.
    pub fn apply_read_receipt(&mut self, reader_id: i64) -> usize {
        let mut flipped = 0;
        for m in &mut self.messages {
            if !m.is_read && m.to_user_id == reader_id && m.from_user_id != reader_id {
                m.is_read = true;
                flipped += 1;
            }
        }
        flipped
    }

    pub fn apply_reaction(
        &mut self,
        message_uid: &str,
        emoji: &str,
        user_id: i64,
        action: ReactionAction,
    ) -> bool {
        self.messages
            .iter_mut()
            .find(|m| m.uid == message_uid)
            .is_some_and(|m| m.react(emoji, user_id, action))
    }

    pub fn unread_for(&self, user_id: i64) -> usize {
        self.messages.iter().filter(|m| m.is_unread_for(user_id)).count()
    }

    /// Claims the one automatic mark-as-read allowed per activation.
    pub fn claim_auto_read(&mut self) -> bool {
        if self.auto_read_triggered {
            return false;
        }
        self.auto_read_triggered = true;
        true
    }

    /// Each message paired with whether it continues a run from the same sender.
    pub fn grouped(&self) -> impl Iterator<Item = (&ChatMessage, bool)> {
        self.messages.iter().enumerate().map(|(i, m)| {
            let continues = i > 0 && self.messages[i - 1].from_user_id == m.from_user_id;
            (m, continues)
        })
    }
}
