//! Search-as-you-type user lookup (used to start new chats).

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::chat_service::ChatClient;
use crate::api::ChatApi;
use crate::config::SEARCH_DEBOUNCE;
use crate::models::ChatUser;

const SEARCH_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SearchState {
    #[default]
    Idle,
    Pending { query: String },
    Results { query: String, users: Vec<ChatUser> },
    Failed { query: String, message: String },
}

/// Debounced lookup. Each new query aborts the previous one, whether it is
/// still waiting out the debounce or already on the wire.
pub struct UserSearch {
    api: Arc<dyn ChatApi>,
    debounce: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
    state: watch::Sender<SearchState>,
}

impl UserSearch {
    pub fn new(api: Arc<dyn ChatApi>, debounce: Duration) -> Self {
        let (state, _) = watch::channel(SearchState::Idle);
        Self {
            api,
            debounce,
            pending: Mutex::new(None),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> SearchState {
        self.state.borrow().clone()
    }

    pub fn query(&self, text: &str) {
        self.cancel();
        let query = text.trim().to_string();
        if query.is_empty() {
            self.state.send_replace(SearchState::Idle);
            return;
        }
        self.state.send_replace(SearchState::Pending {
            query: query.clone(),
        });

        let api = self.api.clone();
        let state = self.state.clone();
        let debounce = self.debounce;
        let task = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            debug!(%query, "Searching users");
            let next = match api.search_users(&query, 0, SEARCH_LIMIT).await {
                Ok(page) => SearchState::Results {
                    query,
                    users: page.users,
                },
                Err(e) => {
                    warn!(%query, "User search failed: {e}");
                    SearchState::Failed {
                        query,
                        message: e.to_string(),
                    }
                }
            };
            state.send_replace(next);
        });
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    pub fn cancel(&self) {
        if let Some(task) = self.pending.lock().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
    }
}

impl Drop for UserSearch {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl ChatClient {
    pub fn user_search(&self) -> UserSearch {
        UserSearch::new(self.api.clone(), SEARCH_DEBOUNCE)
    }
}
