//! Client-side real-time chat engine for PeopleCore.
//!
//! Reconciles paginated REST history with Socket.IO push events into a
//! consistent view: the conversation list, the open conversation's
//! messages, presence, typing indicators, read receipts and reactions.

pub mod api;
pub mod bus;
pub mod config;
pub mod errors;
pub mod models;
pub mod service;
pub mod session;
pub mod socket;
pub mod state;

pub use api::{ChatApi, HttpChatApi};
pub use bus::{EventBus, UiEvent};
pub use config::ClientConfig;
pub use errors::ChatError;
pub use service::{ChatClient, SearchState, UserSearch};
pub use session::ChatSession;
pub use socket::{ClientEvent, LiveChannel, ServerEvent, SocketIoChannel};
