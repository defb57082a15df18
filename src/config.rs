//! Client configuration loaded from environment variables.
//!
//! Everything except the access token and user id has a default suitable
//! for a local backend.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::errors::ChatError;

/// How long a remote typing indicator lives without a refresh.
pub const TYPING_TIMEOUT: Duration = Duration::from_secs(3);

/// Quiet period after the last keystroke before "typing stop" is emitted.
pub const COMPOSE_IDLE: Duration = Duration::from_secs(1);

/// Debounce applied to search-as-you-type user lookups.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Delay before the billing redirect after a subscription error.
pub const SUBSCRIPTION_REDIRECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST backend.
    /// Env: `PEOPLECORE_API_URL`
    pub api_url: String,

    /// Socket.IO endpoint (http(s) or ws(s) scheme).
    /// Env: `PEOPLECORE_SOCKET_URL`
    pub socket_url: String,

    /// Bearer token for REST and live channel auth.
    /// Env: `PEOPLECORE_ACCESS_TOKEN`
    pub access_token: String,

    /// Numeric id of the logged-in user.
    /// Env: `PEOPLECORE_USER_ID`
    pub user_id: i64,

    /// Env: `PEOPLECORE_CHAT_PAGE_SIZE`
    pub chat_page_size: usize,

    /// Env: `PEOPLECORE_MESSAGE_PAGE_SIZE`
    pub message_page_size: usize,

    /// Where the UI should go when the backend demands a subscription.
    /// Env: `PEOPLECORE_BILLING_PATH`
    pub billing_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:4000/api".to_string(),
            socket_url: "http://localhost:4000".to_string(),
            access_token: String::new(),
            user_id: 0,
            chat_page_size: 20,
            message_page_size: 30,
            billing_path: "/billing".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ChatError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("PEOPLECORE_API_URL") {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(url) = std::env::var("PEOPLECORE_SOCKET_URL") {
            config.socket_url = url;
        }
        if let Ok(path) = std::env::var("PEOPLECORE_BILLING_PATH") {
            config.billing_path = path;
        }

        config.access_token = std::env::var("PEOPLECORE_ACCESS_TOKEN")
            .map_err(|_| ChatError::Config("PEOPLECORE_ACCESS_TOKEN must be set".into()))?;

        let user_id = std::env::var("PEOPLECORE_USER_ID")
            .map_err(|_| ChatError::Config("PEOPLECORE_USER_ID must be set".into()))?;
        config.user_id = user_id
            .parse()
            .map_err(|_| ChatError::Config(format!("PEOPLECORE_USER_ID is not a number: {user_id}")))?;

        config.chat_page_size = env_or("PEOPLECORE_CHAT_PAGE_SIZE", config.chat_page_size).max(1);
        config.message_page_size =
            env_or("PEOPLECORE_MESSAGE_PAGE_SIZE", config.message_page_size).max(1);

        Ok(config)
    }
}

fn env_or<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}
