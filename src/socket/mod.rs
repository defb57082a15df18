//! Live channel: Socket.IO push events in, client events out.

mod connection;
pub mod events;
pub mod packet;

use async_trait::async_trait;

use crate::errors::Result;

pub use connection::SocketIoChannel;
pub use events::{ClientEvent, ServerEvent};

/// Emit side of the live channel. Delivery is fire-and-forget.
#[async_trait]
pub trait LiveChannel: Send + Sync {
    async fn emit(&self, event: ClientEvent) -> Result<()>;

    fn is_connected(&self) -> bool;
}
