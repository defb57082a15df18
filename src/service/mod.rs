pub mod chat_service;
pub mod outbound;
pub mod read_receipts;
pub mod user_search;

pub use chat_service::{ChatClient, ChatState};
pub use user_search::{SearchState, UserSearch};
