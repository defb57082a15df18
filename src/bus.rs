//! In-process UI event bus.
//!
//! Independent consumers (an unread badge, a toast area, a router) subscribe
//! here instead of being called directly by the chat engine.

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::trace;

use crate::config::SUBSCRIPTION_REDIRECT_DELAY;
use crate::errors::ChatError;

const BUS_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// Read state of a conversation changed for the signed-in user.
    ChatRead { chat_uid: String },
    /// Transient, non-fatal notice for the user.
    Notice { message: String },
    /// The backend requires a subscription; navigate to billing after `after`.
    SubscriptionRequired {
        message: String,
        redirect_to: String,
        after: Duration,
    },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<UiEvent>,
    billing_path: String,
}

impl EventBus {
    pub fn new(billing_path: &str) -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            tx,
            billing_path: billing_path.to_string(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: UiEvent) {
        // No subscribers is fine.
        if self.tx.send(event).is_err() {
            trace!("UI event dropped, nobody listening");
        }
    }

    pub fn chat_read(&self, chat_uid: &str) {
        self.publish(UiEvent::ChatRead {
            chat_uid: chat_uid.to_string(),
        });
    }

    pub fn notice(&self, message: impl Into<String>) {
        self.publish(UiEvent::Notice {
            message: message.into(),
        });
    }

    /// Turns a failed operation into the matching user-facing event.
    pub fn report(&self, err: &ChatError) {
        match err {
            ChatError::SubscriptionRequired { message } => {
                self.publish(UiEvent::SubscriptionRequired {
                    message: message.clone(),
                    redirect_to: self.billing_path.clone(),
                    after: SUBSCRIPTION_REDIRECT_DELAY,
                })
            }
            other => self.notice(other.to_string()),
        }
    }
}
