//! In-memory [`MessageStore`] implementation.
//!
//! Reference backend for tests and fixtures: a flat `Vec` of messages with
//! per-subscriber insert fan-out. Not persistent — all data is lost when
//! the process exits. Write/read failure injection is built in so callers
//! can exercise the engine's error paths without a separate store double.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};

use pairchat_model::message::{Message, MessageId, NewMessage, RawMessageRow, Timestamp, UserId};

use super::{InsertFilter, MessageQuery, MessageStore, SortOrder, StoreError, Subscription};

/// Capacity of each subscriber's live channel.
const SUB_CHANNEL_CAPACITY: usize = 64;

struct Subscriber {
    id: u64,
    filter: InsertFilter,
    tx: mpsc::Sender<Message>,
}

struct Inner {
    messages: Mutex<Vec<Message>>,
    next_id: AtomicI64,
    next_sub_id: AtomicU64,
    subscribers: parking_lot::Mutex<Vec<Subscriber>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

/// In-memory message store with live insert fan-out.
///
/// Cloning is cheap and shares the same underlying log, so a test can hold
/// one handle while a session owns another.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                messages: Mutex::new(Vec::new()),
                next_id: AtomicI64::new(1),
                next_sub_id: AtomicU64::new(1),
                subscribers: parking_lot::Mutex::new(Vec::new()),
                fail_reads: AtomicBool::new(false),
                fail_writes: AtomicBool::new(false),
            }),
        }
    }

    /// Makes every subsequent read query fail, until reset.
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent write fail, until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Inserts a row exactly as the backing table would serialize it,
    /// without notifying subscribers. Used to seed historical data,
    /// including legacy rows that still use the old body column.
    pub async fn seed_raw(&self, row: RawMessageRow) -> Message {
        let message = row.normalize();
        // Keep the id counter ahead of seeded rows.
        let floor = message.id.value() + 1;
        self.inner.next_id.fetch_max(floor, Ordering::SeqCst);
        self.inner.messages.lock().await.push(message.clone());
        message
    }

    /// Inserts a draft with an explicit timestamp; the trait `insert` uses
    /// the current instant. Subscribers are notified either way.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the draft is invalid or write failure
    /// injection is active.
    pub async fn insert_at(
        &self,
        draft: NewMessage,
        created_at: Timestamp,
    ) -> Result<Message, StoreError> {
        draft.validate()?;
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteFailed("injected write failure".into()));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let message = Message {
            id: MessageId::new(id),
            sender_id: draft.sender_id,
            receiver_id: draft.receiver_id,
            subject: draft.subject,
            body: draft.body,
            created_at,
            is_read: false,
        };
        self.inner.messages.lock().await.push(message.clone());
        self.notify(&message);
        Ok(message)
    }

    /// Number of messages currently stored.
    pub async fn len(&self) -> usize {
        self.inner.messages.lock().await.len()
    }

    /// Whether the store holds no messages.
    pub async fn is_empty(&self) -> bool {
        self.inner.messages.lock().await.is_empty()
    }

    /// Number of live insert subscriptions currently registered.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    fn notify(&self, message: &Message) {
        let mut subs = self.inner.subscribers.lock();
        subs.retain(|s| !s.tx.is_closed());
        for sub in subs.iter() {
            if sub.filter.accepts(message) {
                // Best effort: a full channel drops the notification; the
                // subscriber self-corrects on its next refresh.
                if sub.tx.try_send(message.clone()).is_err() {
                    tracing::warn!(
                        subscriber = sub.id,
                        message_id = %message.id,
                        "live channel full, notification dropped"
                    );
                }
            }
        }
    }

    fn sort_and_limit(query: &MessageQuery, results: &mut Vec<Message>) {
        match query.order {
            SortOrder::CreatedAsc => results.sort_by_key(Message::ordering_key),
            SortOrder::CreatedDesc => {
                results.sort_by_key(Message::ordering_key);
                results.reverse();
            }
        }
        if let Some(limit) = query.limit {
            results.truncate(limit);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore for MemoryStore {
    async fn insert(&self, draft: NewMessage) -> Result<Message, StoreError> {
        self.insert_at(draft, Timestamp::now()).await
    }

    async fn query(&self, query: MessageQuery) -> Result<Vec<Message>, StoreError> {
        if self.inner.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::ReadFailed("injected read failure".into()));
        }
        let messages = self.inner.messages.lock().await;
        let mut results: Vec<Message> = messages.iter().filter(|m| query.matches(m)).cloned().collect();
        drop(messages);
        Self::sort_and_limit(&query, &mut results);
        Ok(results)
    }

    async fn mark_read_by_ids(&self, ids: &[MessageId]) -> Result<(), StoreError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteFailed("injected write failure".into()));
        }
        let mut messages = self.inner.messages.lock().await;
        for m in messages.iter_mut() {
            if ids.contains(&m.id) {
                m.is_read = true;
            }
        }
        Ok(())
    }

    async fn delete(&self, id: MessageId) -> Result<(), StoreError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteFailed("injected write failure".into()));
        }
        let mut messages = self.inner.messages.lock().await;
        let before = messages.len();
        messages.retain(|m| m.id != id);
        if messages.len() == before {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn subscribe_inserts(&self, filter: InsertFilter) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::channel(SUB_CHANNEL_CAPACITY);
        let sub_id = self.inner.next_sub_id.fetch_add(1, Ordering::SeqCst);
        self.inner.subscribers.lock().push(Subscriber {
            id: sub_id,
            filter,
            tx,
        });

        let inner = Arc::clone(&self.inner);
        let on_drop = Box::new(move || {
            inner.subscribers.lock().retain(|s| s.id != sub_id);
        });
        Ok(Subscription::new(rx, on_drop))
    }
}

/// Convenience used throughout the tests: a draft between two raw ids.
#[must_use]
pub fn draft(from: &UserId, to: &UserId, subject: Option<&str>, body: &str) -> NewMessage {
    NewMessage {
        sender_id: from.clone(),
        receiver_id: to.clone(),
        subject: subject.map(str::to_owned),
        body: body.to_owned(),
    }
}
