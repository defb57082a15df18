//! Write path: composing (typing indicators) and sending messages.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::chat_service::ChatClient;
use crate::config::COMPOSE_IDLE;
use crate::errors::{ChatError, Result};
use crate::models::SendMessageRequest;
use crate::socket::ClientEvent;

/// The pending "typing stop" of the local composer.
#[derive(Clone, Default)]
pub struct ComposeTimer {
    pending: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ComposeTimer {
    fn replace(&self, timer: JoinHandle<()>) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.replace(timer) {
            previous.abort();
        }
    }

    pub fn cancel(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = pending.take() {
            timer.abort();
        }
    }
}

/// Clears the `sending` flag when the send attempt ends, however it ends.
struct SendingFlag<'a>(&'a ChatClient);

impl Drop for SendingFlag<'_> {
    fn drop(&mut self) {
        self.0.lock().sending = false;
    }
}

impl ChatClient {
    /// Emits the local typing state to the peer.
    pub async fn set_typing(&self, to_user_id: i64, is_typing: bool, chat_uid: &str) -> Result<()> {
        self.channel
            .emit(ClientEvent::Typing {
                to_user_id,
                is_typing,
                chat_uid: chat_uid.to_string(),
            })
            .await
    }

    /// Call on every keystroke in the composer: (re)emits "typing" and
    /// schedules "stopped" after a quiet second.
    pub async fn on_keystroke(&self) {
        let Some((to_user_id, chat_uid)) = self.typing_target() else {
            return;
        };
        if let Err(e) = self.set_typing(to_user_id, true, &chat_uid).await {
            debug!("Typing start not delivered: {e}");
            return;
        }

        let client = self.clone();
        self.compose.replace(tokio::spawn(async move {
            tokio::time::sleep(COMPOSE_IDLE).await;
            if let Err(e) = client.set_typing(to_user_id, false, &chat_uid).await {
                debug!("Typing stop not delivered: {e}");
            }
        }));
    }

    /// Emits "stopped" now and cancels the pending debounce.
    pub async fn stop_typing(&self) {
        self.compose.cancel();
        if let Some((to_user_id, chat_uid)) = self.typing_target() {
            if let Err(e) = self.set_typing(to_user_id, false, &chat_uid).await {
                debug!("Typing stop not delivered: {e}");
            }
        }
    }

    fn typing_target(&self) -> Option<(i64, String)> {
        let st = self.lock();
        let chat = st.conversation.chat()?;
        Some((chat.other_user(self.self_id).id, chat.uid.clone()))
    }

    /// Sends `text` to the peer of the open conversation.
    pub async fn reply(&self, text: &str) -> Result<()> {
        let to_user_uid = self
            .lock()
            .conversation
            .chat()
            .map(|c| c.other_user(self.self_id).uid.clone());
        match to_user_uid {
            Some(uid) => self.send(&uid, text).await,
            None => {
                let err = ChatError::NoActiveConversation;
                self.bus.report(&err);
                Err(err)
            }
        }
    }

    /// Emits a message over the live channel. The message is not inserted
    /// locally; it shows up when the server echoes it as `message:new`.
    ///
    /// If the live channel is down the REST endpoint is used instead and the
    /// returned message is applied directly (the later echo is deduplicated).
    pub async fn send(&self, to_user_uid: &str, text: &str) -> Result<()> {
        let request = match self.begin_send(to_user_uid, text) {
            Ok(request) => request,
            Err(e) => {
                debug!("Send rejected: {e}");
                self.bus.report(&e);
                return Err(e);
            }
        };
        let _sending = SendingFlag(self);

        self.stop_typing().await;

        let event = ClientEvent::SendMessage {
            to_user_uid: request.to_user_uid.clone(),
            chat_uid: request.chat_uid.clone(),
            message: request.message.clone(),
        };
        let result = match self.channel.emit(event).await {
            Err(ChatError::ChannelClosed) => {
                warn!(chat_uid = %request.chat_uid, "Live channel down, sending over REST");
                self.send_over_rest(&request).await
            }
            other => other,
        };

        match result {
            Ok(()) => {
                info!(chat_uid = %request.chat_uid, "Message sent");
                Ok(())
            }
            Err(e) => {
                warn!(chat_uid = %request.chat_uid, "Failed to send message: {e}");
                self.bus.report(&e);
                Err(e)
            }
        }
    }

    fn begin_send(&self, to_user_uid: &str, text: &str) -> Result<SendMessageRequest> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let mut st = self.lock();
        let chat_uid = st
            .conversation
            .chat_uid()
            .ok_or(ChatError::NoActiveConversation)?
            .to_string();
        if st.sending {
            return Err(ChatError::AlreadySending);
        }
        st.sending = true;
        Ok(SendMessageRequest {
            to_user_uid: to_user_uid.to_string(),
            chat_uid,
            message: text.to_string(),
        })
    }

    async fn send_over_rest(&self, request: &SendMessageRequest) -> Result<()> {
        let message = self.api.send_message(request).await?;
        let mut st = self.lock();
        st.conversation.append_incoming(&message);
        st.chats.apply_incoming_message(&message);
        Ok(())
    }

    pub fn is_sending(&self) -> bool {
        self.lock().sending
    }
}
