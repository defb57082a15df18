use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use peoplecore_chat::errors::ChatError;
use peoplecore_chat::{ChatApi, HttpChatApi};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Default)]
struct Backend {
    /// `(method path, authorization header)` of every request.
    seen: Mutex<Vec<(String, String)>>,
    read_all: Mutex<Vec<String>>,
}

impl Backend {
    fn record(&self, what: String, headers: &HeaderMap) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.seen.lock().unwrap().push((what, auth));
    }
}

#[derive(Deserialize)]
struct Paging {
    offset: usize,
    limit: usize,
}

fn chat_json(id: i64) -> Value {
    json!({
        "id": id,
        "uid": format!("c-{id}"),
        "user1": { "id": 1, "uid": "u-1", "name": "Me" },
        "user2": { "id": 100 + id, "uid": format!("u-{}", 100 + id), "name": "Peer" },
        "unread_count": 2,
        "messages": [],
        "created_at": "2026-05-04T12:00:00Z"
    })
}

async fn list_chats(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Query(paging): Query<Paging>,
) -> impl IntoResponse {
    backend.record(format!("GET chat {} {}", paging.offset, paging.limit), &headers);
    Json(json!({
        "success": true,
        "data": { "chats": [chat_json(1), chat_json(2)], "count": 2 }
    }))
}

async fn list_messages(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Path(chat_uid): Path<String>,
    Query(paging): Query<Paging>,
) -> impl IntoResponse {
    backend.record(format!("GET messages {chat_uid} {}", paging.offset), &headers);
    if chat_uid == "locked" {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "success": false,
                "message": "An active plan is needed",
                "code": "SUBSCRIPTION_REQUIRED"
            })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": {
                "messages": [{
                    "uid": "m-2",
                    "chatId": 1,
                    "fromUserId": 101,
                    "toUserId": 1,
                    "message": "hi",
                    "isRead": false,
                    "reactions": { "🔥": [101] },
                    "created_at": "2026-05-04T12:01:00Z"
                }],
                "count": 1
            }
        })),
    )
}

async fn read_all(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Path(chat_uid): Path<String>,
) -> impl IntoResponse {
    backend.record(format!("GET readAll {chat_uid}"), &headers);
    if chat_uid == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "Chat not found" })),
        );
    }
    backend.read_all.lock().unwrap().push(chat_uid);
    (StatusCode::OK, Json(json!({ "success": true, "data": null })))
}

async fn serve() -> (HttpChatApi, Arc<Backend>) {
    let backend = Arc::new(Backend::default());
    let app = Router::new()
        .route("/api/chat", get(list_chats))
        .route("/api/chat/{chat_uid}/messages", get(list_messages))
        .route("/api/chat/{chat_uid}/messages/readAll", get(read_all))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let api = HttpChatApi::new(&format!("http://{addr}/api/"), "secret-token");
    (api, backend)
}

#[tokio::test]
async fn lists_chats_with_paging_and_bearer_token() {
    let (api, backend) = serve().await;

    let page = api.list_chats(20, 10).await.unwrap();
    assert_eq!(page.chats.len(), 2);
    assert_eq!(page.chats[1].uid, "c-2");
    assert_eq!(page.chats[0].other_user(1).uid, "u-101");

    let seen = backend.seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![("GET chat 20 10".to_string(), "Bearer secret-token".to_string())]
    );
}

#[tokio::test]
async fn decodes_message_page() {
    let (api, _backend) = serve().await;

    let page = api.list_messages("c-1", 0, 30).await.unwrap();
    let message = &page.messages[0];
    assert_eq!(message.from_user_id, 101);
    assert!(message.is_unread_for(1));
    assert_eq!(message.reactions["🔥"], vec![101]);
}

#[tokio::test]
async fn mark_all_read_hits_read_all_endpoint() {
    let (api, backend) = serve().await;

    api.mark_all_read("c-7").await.unwrap();
    assert_eq!(*backend.read_all.lock().unwrap(), vec!["c-7".to_string()]);

    match api.mark_all_read("missing").await.unwrap_err() {
        ChatError::Server { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Chat not found");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn subscription_marker_is_classified() {
    let (api, _backend) = serve().await;

    let err = api.list_messages("locked", 0, 30).await.unwrap_err();
    assert!(err.is_subscription_required());
    assert!(!err.is_transport());
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = HttpChatApi::new(&format!("http://{addr}"), "t");
    let err = api.list_chats(0, 20).await.unwrap_err();
    assert!(matches!(err, ChatError::Network(_)));
    assert!(err.is_transport());
}
