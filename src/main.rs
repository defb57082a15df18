use peoplecore_chat::bus::UiEvent;
use peoplecore_chat::{ChatSession, ClientConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "peoplecore_chat=debug".into()),
        )
        .init();

    let config = ClientConfig::from_env()?;

    // ── Session ───────────────────────────────────────────────────────────────
    let session = ChatSession::connect(&config).await?;
    let client = session.client().clone();

    let mut ui_events = client.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = ui_events.recv().await {
            match event {
                UiEvent::ChatRead { chat_uid } => info!(%chat_uid, "Chat read"),
                UiEvent::Notice { message } => warn!("{message}"),
                UiEvent::SubscriptionRequired {
                    message,
                    redirect_to,
                    after,
                } => warn!(%redirect_to, ?after, "{message}"),
            }
        }
    });

    // ── Chat list ─────────────────────────────────────────────────────────────
    client.refresh_chats().await?;
    for chat in client.chats() {
        let other = chat.other_user(client.self_id());
        println!(
            "{}  {:<24} unread={} {}",
            chat.uid,
            other.name,
            chat.unread_count,
            chat.summary().map(|m| m.message.as_str()).unwrap_or("")
        );
    }

    // ── Conversation ──────────────────────────────────────────────────────────
    let Ok(chat_uid) = std::env::var("PEOPLECORE_OPEN_CHAT") else {
        session.disconnect().await;
        return Ok(());
    };
    client.open_conversation_by_uid(&chat_uid).await?;

    let mut typing = client.subscribe_typing();
    tokio::spawn(async move {
        while typing.changed().await.is_ok() {
            let users = typing.borrow_and_update().clone();
            if users.is_empty() {
                info!("Nobody is typing");
            } else {
                info!(?users, "Typing");
            }
        }
    });

    for (message, continues) in client.with_state(|st| {
        st.conversation
            .grouped()
            .map(|(m, c)| (m.clone(), c))
            .collect::<Vec<_>>()
    }) {
        let who = if continues {
            String::new()
        } else {
            format!("[{}]", message.from_user_id)
        };
        println!("{who:>8} {}", message.message);
    }

    info!("Type a message and press enter; Ctrl-D to quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        client.on_keystroke().await;
        match client.reply(&line).await {
            Err(e) if e.is_rejected_send() => debug!("Nothing sent: {e}"),
            // Other failures are surfaced on the UI bus.
            _ => {}
        }
    }

    session.disconnect().await;
    Ok(())
}
