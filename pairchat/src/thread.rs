//! Thread loader: the ordered message history between exactly two parties.
//!
//! A [`ThreadView`] is loaded once from the store and then reconciled with
//! live inserts via [`ThreadView::apply_live`], which suppresses duplicate
//! ids — the initial fetch and the first live notification can race, and
//! the viewer's own optimistic append can be echoed back by the feed.
//!
//! Stale-selection discard is handled one level up (the session tags each
//! load with a generation and drops results for superseded selections).

use pairchat_model::message::{Message, MessageId, PairKey, UserId};

use crate::store::{MessageQuery, MessageStore, StoreError};

/// Resolves the display subject for a thread: the newest non-null subject
/// wins, which keeps "Re:" chains showing the latest hop even when older
/// messages in the pair had a different or absent subject.
#[must_use]
pub fn resolve_subject(messages: &[Message]) -> Option<String> {
    messages.iter().rev().find_map(|m| m.subject.clone())
}

/// The loaded, ordered history between a viewer and one counterparty.
#[derive(Debug, Clone)]
pub struct ThreadView {
    viewer: UserId,
    counterparty: UserId,
    pair: PairKey,
    messages: Vec<Message>,
    subject: Option<String>,
}

impl ThreadView {
    /// Fetches the full thread between `viewer` and `counterparty`,
    /// ascending by `(created_at, id)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store query fails.
    pub async fn load<S: MessageStore>(
        store: &S,
        viewer: UserId,
        counterparty: UserId,
    ) -> Result<Self, StoreError> {
        let pair = PairKey::new(viewer.clone(), counterparty.clone());
        let mut messages = store.query(MessageQuery::thread(pair.clone())).await?;
        // Display order is (created_at, id) whatever the backend returned.
        messages.sort_by_key(Message::ordering_key);
        let subject = resolve_subject(&messages);
        Ok(Self {
            viewer,
            counterparty,
            pair,
            messages,
            subject,
        })
    }

    /// The viewing party.
    #[must_use]
    pub const fn viewer(&self) -> &UserId {
        &self.viewer
    }

    /// The other party.
    #[must_use]
    pub const fn counterparty(&self) -> &UserId {
        &self.counterparty
    }

    /// The pair identity of this thread.
    #[must_use]
    pub const fn pair(&self) -> &PairKey {
        &self.pair
    }

    /// Messages in display order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Current display subject (newest non-null subject in the thread).
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Whether a message id is already present.
    #[must_use]
    pub fn contains(&self, id: MessageId) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    /// Reconciles a live-arrived message into the thread.
    ///
    /// Returns `true` if the message was appended; `false` when it belongs
    /// to a different pair or its id is already present.
    pub fn apply_live(&mut self, message: Message) -> bool {
        if !self.pair.matches(&message) {
            return false;
        }
        if self.contains(message.id) {
            tracing::debug!(message_id = %message.id, "duplicate live message suppressed");
            return false;
        }
        let key = message.ordering_key();
        let pos = self
            .messages
            .partition_point(|m| m.ordering_key() <= key);
        self.messages.insert(pos, message);
        self.subject = resolve_subject(&self.messages);
        true
    }

    /// Appends the viewer's own just-sent message (the store-returned row,
    /// so the id is authoritative). Duplicate-safe like `apply_live`.
    pub fn append_sent(&mut self, message: Message) {
        let _ = self.apply_live(message);
    }

    /// Removes a message (admin delete). Returns `true` if it was present.
    pub fn remove(&mut self, id: MessageId) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.id != id);
        let removed = self.messages.len() != before;
        if removed {
            self.subject = resolve_subject(&self.messages);
        }
        removed
    }

    /// Ids of inbound messages the viewer has not read yet — the batch the
    /// read-state tracker marks when this thread is opened or refreshed.
    #[must_use]
    pub fn unread_inbound_ids(&self) -> Vec<MessageId> {
        self.messages
            .iter()
            .filter(|m| m.is_unread_inbound_for(&self.viewer))
            .map(|m| m.id)
            .collect()
    }

    /// Flips the local read flag on inbound messages after the store batch
    /// update succeeded.
    pub(crate) fn mark_inbound_read(&mut self) {
        for m in &mut self.messages {
            if m.receiver_id == self.viewer {
                m.is_read = true;
            }
        }
    }
}
