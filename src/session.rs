//! Connection lifecycle for one authenticated session.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::api::HttpChatApi;
use crate::config::ClientConfig;
use crate::errors::Result;
use crate::service::ChatClient;
use crate::socket::SocketIoChannel;

/// Owns the live channel and the event pump feeding a [`ChatClient`].
///
/// Create with [`ChatSession::connect`] once the user is authenticated and
/// end with [`ChatSession::disconnect`] on logout.
pub struct ChatSession {
    client: ChatClient,
    channel: Arc<SocketIoChannel>,
    pump: JoinHandle<()>,
}

impl ChatSession {
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let api = Arc::new(HttpChatApi::new(&config.api_url, &config.access_token));
        let (channel, events) =
            SocketIoChannel::connect(&config.socket_url, &config.access_token).await?;
        let channel = Arc::new(channel);

        let client = ChatClient::new(config, api, channel.clone());
        let pump = tokio::spawn(client.clone().run(events));

        info!(user_id = config.user_id, "Chat session started");
        Ok(Self {
            client,
            channel,
            pump,
        })
    }

    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    pub async fn disconnect(self) {
        self.client.close_conversation();
        self.channel.disconnect().await;
        self.pump.abort();
        info!("Chat session ended");
    }
}
