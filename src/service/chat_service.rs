use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use super::outbound::ComposeTimer;
use crate::api::ChatApi;
use crate::bus::{EventBus, UiEvent};
use crate::config::{ClientConfig, TYPING_TIMEOUT};
use crate::errors::{ChatError, Result};
use crate::models::{Chat, ChatMessage};
use crate::socket::{ClientEvent, LiveChannel, ServerEvent};
use crate::state::{BufferPhase, ChatListCache, ConversationBuffer, PageTicket, PresenceSet, TypingTracker};

/// Everything the engine mutates, behind one lock that is never held
/// across an await.
pub struct ChatState {
    pub chats: ChatListCache,
    pub conversation: ConversationBuffer,
    pub presence: PresenceSet,
    pub(super) marking_read: HashSet<String>,
    pub(super) sending: bool,
}

impl ChatState {
    fn new(self_id: i64) -> Self {
        Self {
            chats: ChatListCache::new(self_id),
            conversation: ConversationBuffer::default(),
            presence: PresenceSet::default(),
            marking_read: HashSet::new(),
            sending: false,
        }
    }

    /// True only when every source we hold says nothing is unread for `self_id`.
    pub(super) fn known_read(&self, chat_uid: &str, self_id: i64) -> bool {
        let listed = self.chats.get(chat_uid).map(|c| c.unread_count == 0);
        let buffered = self
            .conversation
            .is_open(chat_uid)
            .then(|| self.conversation.unread_for(self_id) == 0);
        match (listed, buffered) {
            (None, None) => false,
            (listed, buffered) => listed.unwrap_or(true) && buffered.unwrap_or(true),
        }
    }
}

/// Handle to the chat engine. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct ChatClient {
    pub(super) self_id: i64,
    pub(super) chat_page_size: usize,
    pub(super) message_page_size: usize,
    pub(super) api: Arc<dyn ChatApi>,
    pub(super) channel: Arc<dyn LiveChannel>,
    pub(super) state: Arc<Mutex<ChatState>>,
    pub(super) typing: TypingTracker,
    pub(super) compose: ComposeTimer,
    pub(super) bus: EventBus,
}

impl ChatClient {
    pub fn new(config: &ClientConfig, api: Arc<dyn ChatApi>, channel: Arc<dyn LiveChannel>) -> Self {
        Self {
            self_id: config.user_id,
            chat_page_size: config.chat_page_size,
            message_page_size: config.message_page_size,
            api,
            channel,
            state: Arc::new(Mutex::new(ChatState::new(config.user_id))),
            typing: TypingTracker::new(TYPING_TIMEOUT),
            compose: ComposeTimer::default(),
            bus: EventBus::new(&config.billing_path),
        }
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Read access ──────────────────────────────────────────────────────────

    pub fn self_id(&self) -> i64 {
        self.self_id
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&ChatState) -> R) -> R {
        f(&self.lock())
    }

    pub fn chats(&self) -> Vec<Chat> {
        self.lock().chats.chats().to_vec()
    }

    pub fn active_chat(&self) -> Option<Chat> {
        self.lock().conversation.chat().cloned()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().conversation.messages().to_vec()
    }

    pub fn phase(&self) -> BufferPhase {
        self.lock().conversation.phase()
    }

    pub fn is_online(&self, user_id: i64) -> bool {
        self.lock().presence.is_online(user_id)
    }

    pub fn unread_total(&self) -> u32 {
        self.lock().chats.unread_total()
    }

    pub fn typing_users(&self) -> Vec<i64> {
        self.typing.typing_users()
    }

    pub fn subscribe_typing(&self) -> watch::Receiver<Vec<i64>> {
        self.typing.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.bus.subscribe()
    }

    // ── Chat list ────────────────────────────────────────────────────────────

    /// Fetches one page of conversations. `offset == 0` replaces the list.
    pub async fn load_chats(&self, offset: usize, limit: usize) -> Result<()> {
        self.lock().chats.begin_load();
        match self.api.list_chats(offset, limit).await {
            Ok(page) => {
                debug!(offset, fetched = page.chats.len(), "Loaded chats");
                self.lock().chats.apply_page(offset, limit, page.chats);
                Ok(())
            }
            Err(e) => {
                self.lock().chats.fail_load();
                warn!("Failed to load chats: {e}");
                self.bus.report(&e);
                Err(e)
            }
        }
    }

    pub async fn refresh_chats(&self) -> Result<()> {
        self.load_chats(0, self.chat_page_size).await
    }

    /// Loads the next page if the last one came back full. Returns whether
    /// a request was made.
    pub async fn load_more_chats(&self) -> Result<bool> {
        let offset = {
            let st = self.lock();
            if !st.chats.has_more() || st.chats.is_loading() {
                return Ok(false);
            }
            st.chats.next_offset()
        };
        self.load_chats(offset, self.chat_page_size).await?;
        Ok(true)
    }

    pub async fn start_chat(&self, user_uid: &str) -> Result<Chat> {
        match self.api.start_chat(user_uid).await {
            Ok(chat) => {
                info!(chat_uid = %chat.uid, "Chat started");
                self.lock().chats.upsert(chat.clone());
                Ok(chat)
            }
            Err(e) => {
                warn!(user_uid, "Failed to start chat: {e}");
                self.bus.report(&e);
                Err(e)
            }
        }
    }

    /// Deletes on the server, then refetches the list.
    pub async fn delete_chat(&self, chat_uid: &str) -> Result<()> {
        if let Err(e) = self.api.delete_chat(chat_uid).await {
            warn!(chat_uid, "Failed to delete chat: {e}");
            self.bus.report(&e);
            return Err(e);
        }
        {
            let mut st = self.lock();
            st.chats.remove(chat_uid);
            if st.conversation.is_open(chat_uid) {
                st.conversation.close();
                self.typing.set_active(None);
            }
        }
        self.refresh_chats().await
    }

    // ── Active conversation ──────────────────────────────────────────────────

    /// Makes `chat` the open conversation and loads its newest page.
    /// Results of loads still in flight for a previous activation are
    /// discarded when they arrive.
    pub async fn open_conversation(&self, chat: Chat) -> Result<()> {
        let chat_uid = chat.uid.clone();
        let ticket = self.lock().conversation.open(chat, self.message_page_size);
        self.typing.set_active(Some(&chat_uid));
        info!(%chat_uid, epoch = ticket.epoch, "Opened conversation");

        let join = ClientEvent::JoinChat {
            chat_uid: chat_uid.clone(),
        };
        if let Err(e) = self.channel.emit(join).await {
            warn!(%chat_uid, "Failed to join chat room: {e}");
        }

        if self.fetch_page(ticket).await? {
            self.auto_mark_read().await;
        }
        Ok(())
    }

    /// Opens a conversation already present in the list cache.
    pub async fn open_conversation_by_uid(&self, chat_uid: &str) -> Result<()> {
        let chat = self.lock().chats.get(chat_uid).cloned();
        match chat {
            Some(chat) => self.open_conversation(chat).await,
            None => Err(ChatError::Api {
                message: format!("Chat '{chat_uid}' is not in the list"),
                code: None,
            }),
        }
    }

    /// Backward pagination. Returns whether a request was made.
    pub async fn load_older(&self) -> Result<bool> {
        let ticket = self.lock().conversation.begin_load_more(self.message_page_size);
        let Some(ticket) = ticket else {
            return Ok(false);
        };
        if self.fetch_page(ticket).await? {
            self.auto_mark_read().await;
        }
        Ok(true)
    }

    pub fn close_conversation(&self) {
        self.lock().conversation.close();
        self.typing.set_active(None);
        self.compose.cancel();
    }

    /// Returns whether the page landed in the buffer.
    async fn fetch_page(&self, ticket: PageTicket) -> Result<bool> {
        let result = self
            .api
            .list_messages(&ticket.chat_uid, ticket.offset, ticket.limit)
            .await;
        match result {
            Ok(page) => {
                let fetched = page.messages.len();
                let applied = self.lock().conversation.apply_page(&ticket, page.messages);
                if applied {
                    debug!(chat_uid = %ticket.chat_uid, offset = ticket.offset, fetched, "Loaded messages");
                } else {
                    debug!(chat_uid = %ticket.chat_uid, "Discarding page for inactive conversation");
                }
                Ok(applied)
            }
            Err(e) => {
                let current = self.lock().conversation.fail_page(&ticket);
                warn!(chat_uid = %ticket.chat_uid, "Failed to load messages: {e}");
                if current {
                    self.bus.report(&e);
                }
                Err(e)
            }
        }
    }

    // ── Live events ──────────────────────────────────────────────────────────

    /// Applies one pushed event. Must run inside a tokio runtime.
    pub fn handle_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::NewMessage(message) => {
                let buffered = {
                    let mut st = self.lock();
                    let buffered = st.conversation.append_incoming(&message);
                    let listed = st.chats.apply_incoming_message(&message);
                    debug!(uid = %message.uid, buffered, listed, "New message");
                    buffered
                };
                if buffered && message.is_unread_for(self.self_id) {
                    let client = self.clone();
                    tokio::spawn(async move { client.auto_mark_read().await });
                }
            }
            ServerEvent::TypingStarted { user_id, chat_uid } if user_id != self.self_id => {
                self.typing.mark_typing(user_id, &chat_uid);
            }
            ServerEvent::TypingStopped { user_id, chat_uid } if user_id != self.self_id => {
                self.typing.mark_stopped(user_id, &chat_uid);
            }
            ServerEvent::TypingStarted { .. } | ServerEvent::TypingStopped { .. } => {}
            ServerEvent::UserOnline(user_id) => {
                self.lock().presence.add(user_id);
            }
            ServerEvent::UserOffline(user_id) => {
                self.lock().presence.remove(user_id);
            }
            ServerEvent::OnlineUsers(ids) => {
                debug!(count = ids.len(), "Online users snapshot");
                self.lock().presence.set_all(ids);
            }
            ServerEvent::MessagesRead(receipt) => {
                {
                    let mut st = self.lock();
                    st.chats.apply_read_receipt(&receipt.chat_uid, receipt.read_by);
                    if st.conversation.is_open(&receipt.chat_uid) {
                        st.conversation.apply_read_receipt(receipt.read_by);
                    }
                }
                if receipt.read_by == self.self_id {
                    self.bus.chat_read(&receipt.chat_uid);
                }
            }
            ServerEvent::Reaction(r) => {
                let changed = self.lock().conversation.apply_reaction(
                    &r.message_uid,
                    &r.emoji,
                    r.user_id,
                    r.action,
                );
                debug!(message_uid = %r.message_uid, changed, "Reaction");
            }
        }
    }

    /// Pumps live events into the engine until the channel closes.
    pub async fn run(self, mut events: mpsc::Receiver<ServerEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        warn!("Live event stream ended");
        self.bus.notice("Disconnected from the chat server");
    }
}
