use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::events::{ClientEvent, ServerEvent};
use super::packet::Packet;
use super::LiveChannel;
use crate::errors::{ChatError, Result};

type RawWs = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsStream = SplitStream<RawWs>;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_BUFFER: usize = 256;
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// An owned Socket.IO connection.
///
/// Created once per authenticated session and closed with
/// [`SocketIoChannel::disconnect`]. Inbound events are delivered on the
/// receiver returned by [`SocketIoChannel::connect`].
pub struct SocketIoChannel {
    /// Taken on disconnect; the writer stops once it drains.
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    connected: Arc<AtomicBool>,
    writer: Mutex<Option<JoinHandle<()>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

fn take<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

impl SocketIoChannel {
    /// Opens the websocket, completes the Engine.IO and namespace
    /// handshakes, and starts the reader and writer tasks.
    pub async fn connect(
        url: &str,
        access_token: &str,
    ) -> Result<(Self, mpsc::Receiver<ServerEvent>)> {
        let url = websocket_url(url);
        info!(%url, "Connecting live channel");

        let (ws, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(ChatError::Socket)?;
        let (mut sink, mut stream) = ws.split();

        let open = tokio::time::timeout(HANDSHAKE_TIMEOUT, next_packet(&mut stream))
            .await
            .map_err(|_| ChatError::Packet("timed out waiting for engine open".into()))??;
        let Packet::Open(info) = open else {
            return Err(ChatError::Packet(format!("expected engine open, got {open:?}")));
        };
        debug!(sid = %info.sid, ping_interval = info.ping_interval, "Engine open");

        let auth = serde_json::json!({ "token": access_token });
        sink.send(Message::text(Packet::Connect(Some(auth)).encode()))
            .await
            .map_err(ChatError::Socket)?;

        loop {
            let packet = tokio::time::timeout(HANDSHAKE_TIMEOUT, next_packet(&mut stream))
                .await
                .map_err(|_| ChatError::Packet("timed out waiting for namespace connect".into()))??;
            match packet {
                Packet::Connect(_) => break,
                Packet::ConnectError(data) => {
                    let message = data
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("connection refused")
                        .to_string();
                    return Err(ChatError::from_response(401, message, None));
                }
                Packet::Ping => {
                    sink.send(Message::text(Packet::Pong.encode()))
                        .await
                        .map_err(ChatError::Socket)?;
                }
                other => debug!(?other, "Ignoring packet during handshake"),
            }
        }

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (events_tx, events_rx) = mpsc::channel::<ServerEvent>(EVENT_BUFFER);
        let connected = Arc::new(AtomicBool::new(true));

        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::text(frame)).await {
                    warn!("Live channel send error: {e}");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader = tokio::spawn(read_loop(
            stream,
            outbound_tx.downgrade(),
            events_tx,
            connected.clone(),
        ));

        info!("Live channel connected");
        Ok((
            Self {
                outbound: Mutex::new(Some(outbound_tx)),
                connected,
                writer: Mutex::new(Some(writer)),
                reader: Mutex::new(Some(reader)),
            },
            events_rx,
        ))
    }

    /// Leaves the namespace and tears down the connection. Queued frames
    /// and the goodbye frames are flushed before the socket closes.
    pub async fn disconnect(&self) {
        let was_connected = self.connected.swap(false, Ordering::SeqCst);
        if let Some(outbound) = take(&self.outbound) {
            if was_connected {
                for packet in [Packet::Disconnect, Packet::Close] {
                    if outbound.send(packet.encode()).is_err() {
                        debug!("Writer already stopped, goodbye not sent");
                        break;
                    }
                }
            }
        }

        if let Some(mut writer) = take(&self.writer) {
            match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Live channel writer failed: {e}"),
                Err(_) => {
                    warn!("Live channel writer did not drain in time");
                    writer.abort();
                }
            }
        }
        if let Some(reader) = take(&self.reader) {
            reader.abort();
        }
        info!("Live channel disconnected");
    }

    fn sender(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<String>>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LiveChannel for SocketIoChannel {
    async fn emit(&self, event: ClientEvent) -> Result<()> {
        if !self.is_connected() {
            return Err(ChatError::ChannelClosed);
        }
        debug!(event = event.name(), "Emitting");
        let frame = Packet::event(event.name(), event.payload()).encode();
        let outbound = self.sender().clone();
        match outbound {
            Some(outbound) => outbound.send(frame).map_err(|_| ChatError::ChannelClosed),
            None => Err(ChatError::ChannelClosed),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

async fn read_loop(
    mut stream: WsStream,
    outbound: mpsc::WeakUnboundedSender<String>,
    events: mpsc::Sender<ServerEvent>,
    connected: Arc<AtomicBool>,
) {
    loop {
        let packet = match next_packet(&mut stream).await {
            Ok(p) => p,
            Err(ChatError::ChannelClosed) => break,
            Err(e @ ChatError::Socket(_)) => {
                warn!("Live channel read error: {e}");
                break;
            }
            Err(e) => {
                warn!("Dropping live channel frame: {e}");
                continue;
            }
        };

        match packet {
            Packet::Ping => {
                let sent = outbound
                    .upgrade()
                    .is_some_and(|tx| tx.send(Packet::Pong.encode()).is_ok());
                if !sent {
                    debug!("Writer gone, pong not sent");
                }
            }
            Packet::Event { name, payload } => match ServerEvent::from_frame(&name, payload) {
                Ok(Some(event)) => {
                    if events.send(event).await.is_err() {
                        debug!("Event receiver dropped, stopping reader");
                        break;
                    }
                }
                Ok(None) => debug!(%name, "Ignoring unknown event"),
                Err(e) => warn!(%name, "Failed to decode event: {e}"),
            },
            Packet::Disconnect | Packet::Close => {
                info!("Server closed the live channel");
                break;
            }
            Packet::ConnectError(data) => {
                error!(%data, "Live channel connect error");
                break;
            }
            _ => {}
        }
    }
    connected.store(false, Ordering::SeqCst);
}

/// Reads frames until a text frame decodes into a packet.
/// Returns `ChannelClosed` once the stream ends.
async fn next_packet(stream: &mut WsStream) -> Result<Packet> {
    while let Some(msg) = stream.next().await {
        match msg.map_err(ChatError::Socket)? {
            Message::Text(text) => return Packet::decode(text.as_str()),
            Message::Close(_) => return Err(ChatError::ChannelClosed),
            _ => continue,
        }
    }
    Err(ChatError::ChannelClosed)
}

/// Accepts an http(s)/ws(s) base URL and appends the Engine.IO websocket path.
fn websocket_url(base: &str) -> String {
    let url = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    if url.contains("/socket.io") {
        url
    } else {
        format!("{}/socket.io/?EIO=4&transport=websocket", url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_url_rewrites_scheme_and_appends_path() {
        assert_eq!(
            websocket_url("https://chat.example.com/"),
            "wss://chat.example.com/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            websocket_url("http://localhost:4000"),
            "ws://localhost:4000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            websocket_url("ws://host/socket.io/?EIO=4&transport=websocket"),
            "ws://host/socket.io/?EIO=4&transport=websocket"
        );
    }
}
