use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::ChatApi;
use crate::errors::{ChatError, Result};
use crate::models::{
    Chat, ChatMessage, ChatPage, MessagePage, SendMessageRequest, StartChatRequest, UserPage,
};

/// `reqwest`-backed implementation of [`ChatApi`].
#[derive(Clone)]
pub struct HttpChatApi {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl HttpChatApi {
    pub fn new(base_url: &str, access_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{path}", self.base_url))
            .bearer_auth(&self.access_token)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        what: &'static str,
        request: RequestBuilder,
    ) -> Result<T> {
        let resp = request.send().await.map_err(ChatError::Network)?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(ChatError::Network)?;
        debug!(what, status = status.as_u16(), bytes = body.len(), "REST response");
        decode_body(what, status, &body)
    }
}

/// Unwraps an optional `{success, data}` envelope and classifies failures.
fn decode_body<T: DeserializeOwned>(what: &'static str, status: StatusCode, body: &[u8]) -> Result<T> {
    let value: Value = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) if status.is_success() => return Err(ChatError::decode(what, e)),
            Err(_) => Value::String(String::from_utf8_lossy(body).into_owned()),
        }
    };

    let flagged_failure = value.get("success").and_then(Value::as_bool) == Some(false);
    if !status.is_success() || flagged_failure {
        let (message, code) = error_details(&value, status);
        warn!(what, status = status.as_u16(), %message, "REST call failed");
        return Err(ChatError::from_response(status.as_u16(), message, code));
    }

    let payload = match value {
        Value::Object(mut map) if map.contains_key("success") && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };
    serde_json::from_value(payload).map_err(|e| ChatError::decode(what, e))
}

fn error_details(value: &Value, status: StatusCode) -> (String, Option<String>) {
    let code = value
        .get("code")
        .and_then(Value::as_str)
        .map(str::to_string);
    let message = match value {
        Value::String(text) if !text.is_empty() => text.clone(),
        _ => value
            .get("message")
            .or_else(|| value.get("error"))
            .and_then(|v| v.as_str().or_else(|| v.get("message").and_then(Value::as_str)))
            .map(str::to_string)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            }),
    };
    (message, code)
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn list_chats(&self, offset: usize, limit: usize) -> Result<ChatPage> {
        let req = self
            .request(Method::GET, "chat")
            .query(&[("offset", offset), ("limit", limit)]);
        self.execute("chat list", req).await
    }

    async fn list_messages(
        &self,
        chat_uid: &str,
        offset: usize,
        limit: usize,
    ) -> Result<MessagePage> {
        let req = self
            .request(Method::GET, &format!("chat/{chat_uid}/messages"))
            .query(&[("offset", offset), ("limit", limit)]);
        self.execute("message page", req).await
    }

    async fn send_message(&self, request: &SendMessageRequest) -> Result<ChatMessage> {
        let req = self.request(Method::POST, "chat/send").json(request);
        self.execute("sent message", req).await
    }

    async fn mark_all_read(&self, chat_uid: &str) -> Result<()> {
        let req = self.request(Method::GET, &format!("chat/{chat_uid}/messages/readAll"));
        let _: Value = self.execute("read receipt", req).await?;
        Ok(())
    }

    async fn start_chat(&self, user_uid: &str) -> Result<Chat> {
        let body = StartChatRequest {
            user_uid: user_uid.to_string(),
        };
        let req = self.request(Method::POST, "chat").json(&body);
        self.execute("chat", req).await
    }

    async fn delete_chat(&self, chat_uid: &str) -> Result<()> {
        let req = self.request(Method::DELETE, &format!("chat/{chat_uid}"));
        let _: Value = self.execute("chat deletion", req).await?;
        Ok(())
    }

    async fn search_users(&self, query: &str, offset: usize, limit: usize) -> Result<UserPage> {
        let req = self.request(Method::GET, "user").query(&[
            ("search", query.to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
        ]);
        self.execute("user search", req).await
    }
}
