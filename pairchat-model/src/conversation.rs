//! Derived per-counterparty conversation summaries.
//!
//! A [`Conversation`] is never persisted: the set of conversations for a
//! viewer is a pure projection of the message log, recomputed on refresh
//! and patched in place for the known-safe cases (new send, mark-read).

use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageId, Timestamp, UserId};
use crate::profile::ProfileRole;

/// Per-counterparty summary shown in the inbox sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// The other party.
    pub counterparty_id: UserId,
    /// Display name; the raw id when the directory lookup missed.
    pub counterparty_name: String,
    /// Role tag of the counterparty, when known.
    pub counterparty_role: ProfileRole,
    /// Id of the most recent message between the pair.
    pub last_message_id: MessageId,
    /// Body preview of the most recent message.
    pub last_message: String,
    /// Timestamp of the most recent message.
    pub last_message_at: Timestamp,
    /// Subject of the most recent message, if any.
    pub subject: Option<String>,
    /// Count of inbound messages the viewer has not read yet.
    pub unread_count: u32,
}

impl Conversation {
    /// Whether the conversation has unread inbound messages.
    #[must_use]
    pub const fn has_unread(&self) -> bool {
        self.unread_count > 0
    }

    /// Updates the last-message fields from a newer message, leaving the
    /// unread counter alone.
    pub fn note_last_message(&mut self, message: &Message, preview: String) {
        self.last_message_id = message.id;
        self.last_message = preview;
        self.last_message_at = message.created_at;
        self.subject = message.subject.clone();
    }
}
