//! The signed-in user's conversation list, most recent activity first.

use crate::models::{Chat, ChatMessage};

use super::dedup;

#[derive(Debug, Clone)]
pub struct ChatListCache {
    self_id: i64,
    chats: Vec<Chat>,
    /// Number of rows fetched from the server so far.
    offset: usize,
    has_more: bool,
    loading: bool,
}

impl ChatListCache {
    pub fn new(self_id: i64) -> Self {
        Self {
            self_id,
            chats: Vec::new(),
            offset: 0,
            has_more: true,
            loading: false,
        }
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn get(&self, chat_uid: &str) -> Option<&Chat> {
        self.chats.iter().find(|c| c.uid == chat_uid)
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn next_offset(&self) -> usize {
        self.offset
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn begin_load(&mut self) {
        self.loading = true;
    }

    pub fn fail_load(&mut self) {
        self.loading = false;
    }

    /// Merges a fetched page: `offset == 0` replaces the cache, anything
    /// else appends chats not already present. A full page means more may
    /// exist.
    pub fn apply_page(&mut self, offset: usize, limit: usize, page: Vec<Chat>) {
        let fetched = page.len();
        if offset == 0 {
            self.chats = dedup::unseen(&[], page);
        } else {
            let fresh = dedup::unseen(&self.chats, page);
            self.chats.extend(fresh);
        }
        self.offset = offset + fetched;
        self.has_more = fetched == limit;
        self.loading = false;
        self.sort();
    }

    /// Folds a pushed message into its conversation's summary. Messages for
    /// conversations not in the cache are ignored until the next refresh.
    pub fn apply_incoming_message(&mut self, message: &ChatMessage) -> bool {
        let Some(chat) = self.chats.iter_mut().find(|c| c.id == message.chat_id) else {
            return false;
        };
        chat.messages = vec![message.clone()];
        chat.updated_at = Some(message.created_at);
        if message.is_unread_for(self.self_id) {
            chat.unread_count += 1;
        }
        self.sort();
        true
    }

    pub fn apply_read_receipt(&mut self, chat_uid: &str, reader_id: i64) -> bool {
        let Some(chat) = self.chats.iter_mut().find(|c| c.uid == chat_uid) else {
            return false;
        };
        if reader_id == self.self_id {
            chat.unread_count = 0;
        }
        if let Some(summary) = chat.summary_mut() {
            if summary.to_user_id == reader_id && summary.from_user_id != reader_id {
                summary.is_read = true;
            }
        }
        true
    }

    /// Inserts or replaces a conversation, keeping the list sorted.
    pub fn upsert(&mut self, chat: Chat) {
        match self.chats.iter_mut().find(|c| c.uid == chat.uid) {
            Some(existing) => *existing = chat,
            None => self.chats.push(chat),
        }
        self.sort();
    }

    pub fn remove(&mut self, chat_uid: &str) -> Option<Chat> {
        let idx = self.chats.iter().position(|c| c.uid == chat_uid)?;
        Some(self.chats.remove(idx))
    }

    pub fn unread_total(&self) -> u32 {
        self.chats.iter().map(|c| c.unread_count).sum()
    }

    fn sort(&mut self) {
        self.chats
            .sort_by(|a, b| b.activity_at().cmp(&a.activity_at()));
    }
}
