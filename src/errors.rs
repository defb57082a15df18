use thiserror::Error;

/// Marker code the backend attaches to errors caused by a missing or lapsed plan.
pub const SUBSCRIPTION_REQUIRED_CODE: &str = "SUBSCRIPTION_REQUIRED";

/// Top-level chat engine error.
/// All variants carry a human-readable message for display/logging.
#[derive(Debug, Error)]
pub enum ChatError {
    // ── Transport errors ─────────────────────────────────────────────────────
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Live channel error: {0}")]
    Socket(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("Live channel is closed")]
    ChannelClosed,

    // ── Domain errors returned with a success flag ───────────────────────────
    #[error("{message}")]
    Api { message: String, code: Option<String> },

    #[error("Subscription required: {message}")]
    SubscriptionRequired { message: String },

    // ── Decoding errors ──────────────────────────────────────────────────────
    #[error("Failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed live channel packet: {0}")]
    Packet(String),

    // ── Send pipeline rejections ─────────────────────────────────────────────
    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("No conversation is open")]
    NoActiveConversation,

    #[error("A message is already being sent")]
    AlreadySending,

    // ── Configuration ────────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ChatError {
    pub fn decode(what: &'static str, source: serde_json::Error) -> Self {
        ChatError::Decode { what, source }
    }

    /// Builds the error for a failed REST response, routing the
    /// subscription marker to its own variant.
    pub fn from_response(status: u16, message: String, code: Option<String>) -> Self {
        let by_code = code.as_deref() == Some(SUBSCRIPTION_REQUIRED_CODE);
        let by_message = message.to_lowercase().contains("subscription");
        if status == 402 || by_code || by_message {
            return ChatError::SubscriptionRequired { message };
        }
        if (200..300).contains(&status) {
            ChatError::Api { message, code }
        } else {
            ChatError::Server { status, message }
        }
    }

    pub fn is_subscription_required(&self) -> bool {
        matches!(self, ChatError::SubscriptionRequired { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ChatError::Network(_)
                | ChatError::Server { .. }
                | ChatError::Socket(_)
                | ChatError::ChannelClosed
        )
    }

    /// Rejections raised by the send pipeline before anything leaves the client.
    pub fn is_rejected_send(&self) -> bool {
        matches!(
            self,
            ChatError::EmptyMessage | ChatError::NoActiveConversation | ChatError::AlreadySending
        )
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
