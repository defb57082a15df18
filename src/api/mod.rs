//! REST collaborator boundary.

mod http_client;

use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{Chat, ChatMessage, ChatPage, MessagePage, SendMessageRequest, UserPage};

pub use http_client::HttpChatApi;

/// The backend's chat endpoints.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `GET chat?offset&limit`
    async fn list_chats(&self, offset: usize, limit: usize) -> Result<ChatPage>;

    /// `GET chat/{uid}/messages?offset&limit`, newest first.
    async fn list_messages(&self, chat_uid: &str, offset: usize, limit: usize)
        -> Result<MessagePage>;

    /// `POST chat/send`
    async fn send_message(&self, request: &SendMessageRequest) -> Result<ChatMessage>;

    /// `GET chat/{uid}/messages/readAll`
    async fn mark_all_read(&self, chat_uid: &str) -> Result<()>;

    /// `POST chat` — creates the conversation or returns the existing one.
    async fn start_chat(&self, user_uid: &str) -> Result<Chat>;

    /// `DELETE chat/{uid}`
    async fn delete_chat(&self, chat_uid: &str) -> Result<()>;

    /// `GET user?search&offset&limit`
    async fn search_users(&self, query: &str, offset: usize, limit: usize) -> Result<UserPage>;
}
