#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use peoplecore_chat::errors::{ChatError, Result};
use peoplecore_chat::models::{
    Chat, ChatMessage, ChatPage, ChatUser, MessagePage, SendMessageRequest, UserPage,
};
use peoplecore_chat::{ChatApi, ChatClient, ClientConfig, ClientEvent, LiveChannel};

pub const ME: i64 = 1;

pub fn at(second: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap() + chrono::Duration::seconds(second)
}

pub fn user(id: i64) -> ChatUser {
    ChatUser {
        id,
        uid: format!("u-{id}"),
        name: format!("User {id}"),
        email: None,
        avatar: None,
    }
}

/// Chat `c-{id}` between [`ME`] and user `100 + id`.
pub fn chat(id: i64, second: i64, unread: u32) -> Chat {
    Chat {
        id,
        uid: format!("c-{id}"),
        user1: user(ME),
        user2: user(100 + id),
        unread_count: unread,
        messages: Vec::new(),
        created_at: at(second),
        updated_at: None,
    }
}

pub fn peer_of(chat_id: i64) -> i64 {
    100 + chat_id
}

pub fn incoming(chat_id: i64, n: i64) -> ChatMessage {
    ChatMessage {
        uid: format!("m-{chat_id}-{n}"),
        chat_id,
        from_user_id: peer_of(chat_id),
        to_user_id: ME,
        message: format!("hello {n}"),
        is_read: false,
        reactions: HashMap::new(),
        created_at: at(1000 + n),
    }
}

pub fn outgoing(chat_id: i64, n: i64) -> ChatMessage {
    ChatMessage {
        from_user_id: ME,
        to_user_id: peer_of(chat_id),
        ..incoming(chat_id, n)
    }
}

/// In-memory backend with per-call counters and optional latency.
#[derive(Default)]
pub struct FakeApi {
    pub chats: Mutex<Vec<Chat>>,
    /// Newest first, per chat uid.
    pub messages: Mutex<HashMap<String, Vec<ChatMessage>>>,
    pub users: Mutex<Vec<ChatUser>>,
    pub page_delay: Mutex<HashMap<String, Duration>>,
    pub read_delay: Mutex<Duration>,
    pub fail_read: AtomicBool,
    pub list_error: Mutex<Option<fn() -> ChatError>>,
    pub read_all_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub search_queries: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<SendMessageRequest>>,
}

impl FakeApi {
    pub fn with_chats(chats: Vec<Chat>) -> Arc<Self> {
        let api = Self::default();
        *api.chats.lock().unwrap() = chats;
        Arc::new(api)
    }

    pub fn set_messages(&self, chat_uid: &str, newest_first: Vec<ChatMessage>) {
        self.messages
            .lock()
            .unwrap()
            .insert(chat_uid.to_string(), newest_first);
    }

    pub fn read_all_calls(&self) -> usize {
        self.read_all_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatApi for FakeApi {
    async fn list_chats(&self, offset: usize, limit: usize) -> Result<ChatPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(make_err) = *self.list_error.lock().unwrap() {
            return Err(make_err());
        }
        let chats: Vec<Chat> = self
            .chats
            .lock()
            .unwrap()
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok(ChatPage {
            count: chats.len() as u64,
            chats,
            offset,
            limit,
        })
    }

    async fn list_messages(
        &self,
        chat_uid: &str,
        offset: usize,
        limit: usize,
    ) -> Result<MessagePage> {
        let delay = self.page_delay.lock().unwrap().get(chat_uid).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let messages: Vec<ChatMessage> = self
            .messages
            .lock()
            .unwrap()
            .get(chat_uid)
            .map(|all| all.iter().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default();
        Ok(MessagePage {
            count: messages.len() as u64,
            messages,
            offset,
            limit,
        })
    }

    async fn send_message(&self, request: &SendMessageRequest) -> Result<ChatMessage> {
        self.sent.lock().unwrap().push(request.clone());
        let chat_id = request.chat_uid.trim_start_matches("c-").parse().unwrap_or(0);
        Ok(ChatMessage {
            uid: format!("sent-{}", self.sent.lock().unwrap().len()),
            message: request.message.clone(),
            ..outgoing(chat_id, 500)
        })
    }

    async fn mark_all_read(&self, _chat_uid: &str) -> Result<()> {
        self.read_all_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.read_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        if self.fail_read.load(Ordering::SeqCst) {
            return Err(ChatError::Server {
                status: 500,
                message: "read failed".into(),
            });
        }
        Ok(())
    }

    async fn start_chat(&self, user_uid: &str) -> Result<Chat> {
        let id: i64 = user_uid.trim_start_matches("u-").parse().unwrap_or(0) - 100;
        let chat = chat(id, 5000, 0);
        self.chats.lock().unwrap().insert(0, chat.clone());
        Ok(chat)
    }

    async fn delete_chat(&self, chat_uid: &str) -> Result<()> {
        self.chats.lock().unwrap().retain(|c| c.uid != chat_uid);
        Ok(())
    }

    async fn search_users(&self, query: &str, _offset: usize, limit: usize) -> Result<UserPage> {
        self.search_queries.lock().unwrap().push(query.to_string());
        let users: Vec<ChatUser> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.name.to_lowercase().contains(&query.to_lowercase()))
            .take(limit)
            .cloned()
            .collect();
        Ok(UserPage {
            count: users.len() as u64,
            users,
        })
    }
}

/// Records every emitted event, optionally taking `emit_delay` per emit.
pub struct RecordingChannel {
    pub emitted: Mutex<Vec<ClientEvent>>,
    pub connected: AtomicBool,
    pub emit_delay: Mutex<Duration>,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            emitted: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            emit_delay: Mutex::new(Duration::ZERO),
        })
    }

    pub fn emitted(&self) -> Vec<ClientEvent> {
        self.emitted.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.emitted.lock().unwrap().clear();
    }
}

#[async_trait]
impl LiveChannel for RecordingChannel {
    async fn emit(&self, event: ClientEvent) -> Result<()> {
        let delay = *self.emit_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if !self.is_connected() {
            return Err(ChatError::ChannelClosed);
        }
        self.emitted.lock().unwrap().push(event);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

pub fn config() -> ClientConfig {
    ClientConfig {
        user_id: ME,
        access_token: "test-token".into(),
        chat_page_size: 10,
        message_page_size: 10,
        ..ClientConfig::default()
    }
}

pub fn client(api: &Arc<FakeApi>, channel: &Arc<RecordingChannel>) -> ChatClient {
    ChatClient::new(&config(), api.clone(), channel.clone())
}
