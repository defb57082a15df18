//! Client-side chat state: pure data structures mutated by the service layer.

pub mod chat_list;
pub mod conversation;
pub mod dedup;
pub mod presence;

pub use chat_list::ChatListCache;
pub use conversation::{BufferPhase, ConversationBuffer, PageTicket};
pub use presence::{PresenceSet, TypingTracker};
