//! Online users and remote typing indicators.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

/// Users the server reports as online. Purely event driven, no expiry.
#[derive(Debug, Clone, Default)]
pub struct PresenceSet {
    online: HashSet<i64>,
}

impl PresenceSet {
    /// Replaces the whole set with a server snapshot.
    pub fn set_all(&mut self, ids: impl IntoIterator<Item = i64>) {
        self.online = ids.into_iter().collect();
    }

    pub fn add(&mut self, id: i64) -> bool {
        self.online.insert(id)
    }

    pub fn remove(&mut self, id: i64) -> bool {
        self.online.remove(&id)
    }

    pub fn is_online(&self, id: i64) -> bool {
        self.online.contains(&id)
    }
}

struct TypingEntry {
    token: u64,
    expiry: JoinHandle<()>,
}

#[derive(Default)]
struct TypingInner {
    active_chat: Option<String>,
    typing: HashMap<i64, TypingEntry>,
    next_token: u64,
}

impl TypingInner {
    fn snapshot(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.typing.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Users typing in the active conversation. Every entry expires after
/// `timeout` unless refreshed; an explicit stop removes it at once.
///
/// Scheduling expiries needs a tokio runtime.
#[derive(Clone)]
pub struct TypingTracker {
    inner: Arc<Mutex<TypingInner>>,
    changes: watch::Sender<Vec<i64>>,
    timeout: Duration,
}

fn lock(inner: &Mutex<TypingInner>) -> MutexGuard<'_, TypingInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TypingTracker {
    pub fn new(timeout: Duration) -> Self {
        let (changes, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(Mutex::new(TypingInner::default())),
            changes,
            timeout,
        }
    }

    /// Switches the conversation being tracked, dropping every indicator.
    pub fn set_active(&self, chat_uid: Option<&str>) {
        let mut inner = lock(&self.inner);
        inner.active_chat = chat_uid.map(str::to_string);
        let cleared = !inner.typing.is_empty();
        for (_, entry) in inner.typing.drain() {
            entry.expiry.abort();
        }
        if cleared {
            self.changes.send_replace(Vec::new());
        }
    }

    pub fn mark_typing(&self, user_id: i64, chat_uid: &str) -> bool {
        let mut inner = lock(&self.inner);
        if inner.active_chat.as_deref() != Some(chat_uid) {
            return false;
        }
        inner.next_token += 1;
        let token = inner.next_token;
        let expiry = tokio::spawn(expire(
            Arc::downgrade(&self.inner),
            self.changes.clone(),
            user_id,
            token,
            self.timeout,
        ));
        let fresh = match inner.typing.insert(user_id, TypingEntry { token, expiry }) {
            Some(previous) => {
                previous.expiry.abort();
                false
            }
            None => true,
        };
        if fresh {
            self.changes.send_replace(inner.snapshot());
        }
        true
    }

    pub fn mark_stopped(&self, user_id: i64, chat_uid: &str) -> bool {
        let mut inner = lock(&self.inner);
        if inner.active_chat.as_deref() != Some(chat_uid) {
            return false;
        }
        match inner.typing.remove(&user_id) {
            Some(entry) => {
                entry.expiry.abort();
                self.changes.send_replace(inner.snapshot());
                true
            }
            None => false,
        }
    }

    pub fn is_typing(&self, user_id: i64) -> bool {
        lock(&self.inner).typing.contains_key(&user_id)
    }

    pub fn typing_users(&self) -> Vec<i64> {
        lock(&self.inner).snapshot()
    }

    /// Receives the sorted typing set after every change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<i64>> {
        self.changes.subscribe()
    }
}

async fn expire(
    inner: Weak<Mutex<TypingInner>>,
    changes: watch::Sender<Vec<i64>>,
    user_id: i64,
    token: u64,
    timeout: Duration,
) {
    tokio::time::sleep(timeout).await;
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut inner = lock(&inner);
    // A refresh may have replaced this entry after the sleep finished.
    if inner.typing.get(&user_id).is_some_and(|e| e.token == token) {
        inner.typing.remove(&user_id);
        trace!(user_id, "Typing indicator expired");
        changes.send_replace(inner.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(3);

    #[test]
    fn presence_snapshot_replaces_and_events_adjust() {
        let mut presence = PresenceSet::default();
        presence.add(9);
        presence.set_all([1, 2, 3]);
        assert!(!presence.is_online(9));
        assert!([1, 2, 3].iter().all(|id| presence.is_online(*id)));

        assert!(presence.add(4));
        assert!(!presence.add(4));
        assert!(presence.remove(1));
        assert!(!presence.remove(1));
        assert!(presence.is_online(4));
        assert!(!presence.is_online(1));
    }

    #[tokio::test(start_paused = true)]
    async fn typing_expires_after_timeout() {
        let tracker = TypingTracker::new(TIMEOUT);
        tracker.set_active(Some("c1"));
        assert!(tracker.mark_typing(5, "c1"));
        assert!(tracker.is_typing(5));

        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert!(tracker.is_typing(5));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!tracker.is_typing(5));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_reschedules_expiry() {
        let tracker = TypingTracker::new(TIMEOUT);
        tracker.set_active(Some("c1"));
        tracker.mark_typing(5, "c1");
        tokio::time::sleep(Duration::from_secs(2)).await;
        tracker.mark_typing(5, "c1");
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(tracker.is_typing(5), "refresh should have pushed expiry out");
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(!tracker.is_typing(5));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_removes_immediately_and_other_chats_are_ignored() {
        let tracker = TypingTracker::new(TIMEOUT);
        tracker.set_active(Some("c1"));
        assert!(!tracker.mark_typing(5, "other"));
        assert!(!tracker.is_typing(5));

        tracker.mark_typing(5, "c1");
        tracker.mark_typing(6, "c1");
        assert_eq!(tracker.typing_users(), vec![5, 6]);
        assert!(tracker.mark_stopped(5, "c1"));
        assert_eq!(tracker.typing_users(), vec![6]);
        assert!(!tracker.mark_stopped(5, "c1"));
    }

    #[tokio::test(start_paused = true)]
    async fn switching_conversation_clears_indicators() {
        let tracker = TypingTracker::new(TIMEOUT);
        let mut changes = tracker.subscribe();
        tracker.set_active(Some("c1"));
        tracker.mark_typing(5, "c1");
        assert_eq!(*changes.borrow_and_update(), vec![5]);

        tracker.set_active(Some("c2"));
        assert!(tracker.typing_users().is_empty());
        assert!(changes.has_changed().unwrap());
        tokio::time::sleep(TIMEOUT * 2).await;
        assert!(tracker.typing_users().is_empty());
    }
}
