//! Message store adapter: the collaborator seam over the persistence layer.
//!
//! Defines the [`MessageStore`] trait (CRUD over directed messages plus a
//! subscribe-to-inserts primitive) and the [`MessageQuery`] filter language
//! the engine components speak. The [`memory::MemoryStore`] implementation
//! is the reference backend used by tests and fixtures.
//!
//! Body-column normalization happens below this seam: every [`Message`]
//! handed out by a store already went through
//! [`RawMessageRow::normalize`](pairchat_model::message::RawMessageRow::normalize).

pub mod memory;

use std::future::Future;

use pairchat_model::message::{Message, MessageId, NewMessage, PairKey, UserId};

/// Errors that can occur during message store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend is unreachable or unavailable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A read query failed.
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// A write operation failed.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// The requested message does not exist.
    #[error("message not found: {0}")]
    NotFound(MessageId),

    /// The draft failed validation before any backend call.
    #[error(transparent)]
    InvalidDraft(#[from] pairchat_model::message::ValidationError),
}

/// Sort direction for query results. Ties on `created_at` are always broken
/// by message id, in the same direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Oldest first — thread display order.
    #[default]
    CreatedAsc,
    /// Newest first — latest-message lookups.
    CreatedDesc,
}

/// Filter, order, and limit for a message query.
///
/// All filter fields are conjunctive; `None` means "don't care".
#[derive(Debug, Clone, Default)]
pub struct MessageQuery {
    /// Match messages where this user is sender **or** receiver.
    pub participant: Option<UserId>,
    /// Match messages between exactly this pair, either direction.
    pub pair: Option<PairKey>,
    /// Match a specific sender.
    pub sender: Option<UserId>,
    /// Match a specific receiver.
    pub receiver: Option<UserId>,
    /// Only messages the receiver has not read.
    pub unread_only: bool,
    /// Result ordering.
    pub order: SortOrder,
    /// Maximum number of rows to return.
    pub limit: Option<usize>,
}

impl MessageQuery {
    /// All messages involving `user`, oldest first.
    #[must_use]
    pub fn involving(user: UserId) -> Self {
        Self {
            participant: Some(user),
            ..Self::default()
        }
    }

    /// The full thread between a pair, in display order.
    #[must_use]
    pub fn thread(pair: PairKey) -> Self {
        Self {
            pair: Some(pair),
            ..Self::default()
        }
    }

    /// The single most recent message between a pair.
    #[must_use]
    pub fn latest_in(pair: PairKey) -> Self {
        Self {
            pair: Some(pair),
            order: SortOrder::CreatedDesc,
            limit: Some(1),
            ..Self::default()
        }
    }

    /// Unread messages sent by `sender` to `receiver`.
    #[must_use]
    pub fn unread_from(sender: UserId, receiver: UserId) -> Self {
        Self {
            sender: Some(sender),
            receiver: Some(receiver),
            unread_only: true,
            ..Self::default()
        }
    }

    /// Whether a message passes this query's filter portion (order and
    /// limit are applied by the store, not here).
    #[must_use]
    pub fn matches(&self, message: &Message) -> bool {
        if let Some(p) = &self.participant {
            if !message.involves(p) {
                return false;
            }
        }
        if let Some(pair) = &self.pair {
            if !pair.matches(message) {
                return false;
            }
        }
        if let Some(s) = &self.sender {
            if message.sender_id != *s {
                return false;
            }
        }
        if let Some(r) = &self.receiver {
            if message.receiver_id != *r {
                return false;
            }
        }
        if self.unread_only && message.is_read {
            return false;
        }
        true
    }
}

/// Server-side filter for an insert subscription.
///
/// The live channel is per-viewer: a subscriber only ever sees rows where
/// the viewer is the receiver, so one user never observes another user's
/// notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertFilter {
    receiver: UserId,
}

impl InsertFilter {
    /// Notifications for messages addressed to `viewer`.
    #[must_use]
    pub const fn inbound_for(viewer: UserId) -> Self {
        Self { receiver: viewer }
    }

    /// Whether an inserted row should be delivered to this subscriber.
    #[must_use]
    pub fn accepts(&self, message: &Message) -> bool {
        message.receiver_id == self.receiver
    }

    /// The subscribing viewer.
    #[must_use]
    pub const fn viewer(&self) -> &UserId {
        &self.receiver
    }
}

/// Live insert feed handle.
///
/// Dropping the subscription unsubscribes from the store; holding it scoped
/// to a session guarantees no leaked subscriptions across view switches.
pub struct Subscription {
    rx: tokio::sync::mpsc::Receiver<Message>,
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wraps a receiver plus an unsubscribe action run on drop.
    #[must_use]
    pub fn new(
        rx: tokio::sync::mpsc::Receiver<Message>,
        on_drop: Box<dyn FnOnce() + Send>,
    ) -> Self {
        Self {
            rx,
            on_drop: Some(on_drop),
        }
    }

    /// Waits for the next live insert. Returns `None` once the store side
    /// has gone away.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Non-blocking poll for a pending live insert.
    pub fn try_next(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.on_drop.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Collaborator contract over the persistent message log.
///
/// Every method is an asynchronous suspension point; callers must not
/// assume same-tick completion.
pub trait MessageStore: Send + Sync {
    /// Inserts a validated draft and returns the stored row with its
    /// authoritative id and timestamp.
    ///
    /// Matching insert subscriptions are notified after the row is durable.
    fn insert(
        &self,
        draft: NewMessage,
    ) -> impl Future<Output = Result<Message, StoreError>> + Send;

    /// Runs a filtered, ordered, limited query over the message log.
    fn query(
        &self,
        query: MessageQuery,
    ) -> impl Future<Output = Result<Vec<Message>, StoreError>> + Send;

    /// Sets `is_read = true` on every listed message in one batch.
    ///
    /// Ids that are already read or missing are skipped, so the call is
    /// idempotent and safe to retry.
    fn mark_read_by_ids(
        &self,
        ids: &[MessageId],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Physically removes a message (admin delete).
    fn delete(&self, id: MessageId) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Registers a live insert subscription matching `filter`.
    fn subscribe_inserts(
        &self,
        filter: InsertFilter,
    ) -> impl Future<Output = Result<Subscription, StoreError>> + Send;
}
