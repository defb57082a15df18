//! Mark-as-read coordination across REST, the open buffer and the list.

use tracing::{debug, info, warn};

use super::chat_service::ChatClient;
use crate::errors::Result;
use crate::state::BufferPhase;

/// Holds a chat uid in the in-flight set until dropped, so a cancelled
/// call cannot wedge the guard.
struct InFlight<'a> {
    client: &'a ChatClient,
    chat_uid: &'a str,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.client.lock().marking_read.remove(self.chat_uid);
    }
}

impl ChatClient {
    /// Marks every message addressed to the signed-in user in `chat_uid` as
    /// read. Returns `Ok(false)` without calling the backend when a call for
    /// the same chat is already in flight or nothing is known to be unread.
    ///
    /// State is only touched after the backend confirms, so a failure
    /// leaves everything as it was.
    pub async fn mark_as_read(&self, chat_uid: &str) -> Result<bool> {
        let _in_flight = {
            let mut st = self.lock();
            if st.known_read(chat_uid, self.self_id) {
                debug!(chat_uid, "Nothing unread, skipping mark-as-read");
                return Ok(false);
            }
            if !st.marking_read.insert(chat_uid.to_string()) {
                debug!(chat_uid, "Mark-as-read already in flight");
                return Ok(false);
            }
            InFlight {
                client: self,
                chat_uid,
            }
        };

        if let Err(e) = self.api.mark_all_read(chat_uid).await {
            warn!(chat_uid, "Failed to mark chat as read: {e}");
            self.bus.report(&e);
            return Err(e);
        }

        let flipped = {
            let mut st = self.lock();
            let flipped = if st.conversation.is_open(chat_uid) {
                st.conversation.apply_read_receipt(self.self_id)
            } else {
                0
            };
            st.chats.apply_read_receipt(chat_uid, self.self_id);
            flipped
        };
        info!(chat_uid, flipped, "Marked chat as read");
        self.bus.chat_read(chat_uid);
        Ok(true)
    }

    /// Fires the single automatic mark-as-read of this activation once the
    /// buffer holds unread messages addressed to the signed-in user.
    pub(super) async fn auto_mark_read(&self) {
        let target = {
            let mut st = self.lock();
            let buffer = &mut st.conversation;
            let eligible =
                buffer.phase() == BufferPhase::Ready && buffer.unread_for(self.self_id) > 0;
            if eligible && buffer.claim_auto_read() {
                buffer.chat_uid().map(str::to_string)
            } else {
                None
            }
        };
        if let Some(chat_uid) = target {
            // Failures are already logged and reported.
            let _ = self.mark_as_read(&chat_uid).await;
        }
    }
}
