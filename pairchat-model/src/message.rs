//! Message types for the pairchat engine.
//!
//! A [`Message`] is one row of the flat directed message log: a sender, a
//! receiver, an optional subject, a body, and a read flag. Threading is
//! derived from the `{sender, receiver}` pair ([`PairKey`]), never stored.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a user (sender, receiver, or viewer) by its directory id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Creates a user id from an existing directory id string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a random user id (UUID v4), mainly for tests and fixtures.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the raw id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Store-assigned message identifier.
///
/// The store hands these out in insertion order, which makes the id the tie
/// breaker for messages sharing a `created_at` value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MessageId(i64);

impl MessageId {
    /// Wraps a raw store id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw store id.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Millisecond-precision UTC timestamp.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp for the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    /// Creates a timestamp from milliseconds since the Unix epoch.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as milliseconds since the Unix epoch.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Converts to a `chrono` datetime, if the value is in range.
    #[must_use]
    pub fn to_datetime(self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.0)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.3f")),
            None => write!(f, "{}ms", self.0),
        }
    }
}

/// One row of the directed message log, as seen above the store adapter.
///
/// The body field is already normalized here; see [`RawMessageRow`] for the
/// legacy-column handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned id (insertion order).
    pub id: MessageId,
    /// The sending party.
    pub sender_id: UserId,
    /// The receiving party.
    pub receiver_id: UserId,
    /// Optional display subject ("Re: ..." chains live here).
    pub subject: Option<String>,
    /// Message body text.
    pub body: String,
    /// Insertion time.
    pub created_at: Timestamp,
    /// Whether the receiver has opened the thread containing this message.
    /// Meaningless from the sender's perspective.
    pub is_read: bool,
}

impl Message {
    /// The display ordering key: `(created_at, id)`, ascending.
    #[must_use]
    pub const fn ordering_key(&self) -> (Timestamp, MessageId) {
        (self.created_at, self.id)
    }

    /// Whether the given user is the sender or receiver of this message.
    #[must_use]
    pub fn involves(&self, user: &UserId) -> bool {
        self.sender_id == *user || self.receiver_id == *user
    }

    /// The other party relative to `viewer`, or `None` if the viewer is not
    /// involved or the row is self-addressed.
    #[must_use]
    pub fn counterparty_of(&self, viewer: &UserId) -> Option<&UserId> {
        if self.sender_id == self.receiver_id {
            return None;
        }
        if self.sender_id == *viewer {
            Some(&self.receiver_id)
        } else if self.receiver_id == *viewer {
            Some(&self.sender_id)
        } else {
            None
        }
    }

    /// Whether this message is an unread inbound message for `viewer`.
    #[must_use]
    pub fn is_unread_inbound_for(&self, viewer: &UserId) -> bool {
        !self.is_read && self.receiver_id == *viewer
    }
}

/// A message row exactly as the backing store serializes it.
///
/// The historical schema stored the body under a `content` column before it
/// was renamed to `body`; rows written in either era are still live. This is
/// the single place where both names exist — [`RawMessageRow::normalize`]
/// coalesces them and everything above the store adapter sees one `body`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessageRow {
    /// Store-assigned row id.
    pub id: i64,
    /// Sender column.
    pub sender_id: String,
    /// Receiver column.
    pub receiver_id: String,
    /// Optional subject column.
    #[serde(default)]
    pub subject: Option<String>,
    /// Current body column; absent on rows written before the rename.
    #[serde(default)]
    pub body: Option<String>,
    /// Legacy body column; absent on rows written after the rename.
    #[serde(default)]
    pub content: Option<String>,
    /// Insertion time (milliseconds since epoch).
    pub created_at: i64,
    /// Read flag.
    #[serde(default)]
    pub is_read: bool,
}

impl RawMessageRow {
    /// Normalizes the row into a [`Message`], coalescing the two body
    /// columns (`body` wins, then `content`, then empty).
    #[must_use]
    pub fn normalize(self) -> Message {
        let body = self.body.or(self.content).unwrap_or_default();
        Message {
            id: MessageId::new(self.id),
            sender_id: UserId::new(self.sender_id),
            receiver_id: UserId::new(self.receiver_id),
            subject: self.subject,
            body,
            created_at: Timestamp::from_millis(self.created_at),
            is_read: self.is_read,
        }
    }
}

/// Errors raised when validating an outgoing message draft.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Sender and receiver are the same user.
    #[error("sender and receiver must be distinct users")]
    SameParty,

    /// The body is empty or whitespace-only.
    #[error("message body cannot be empty")]
    EmptyBody,

    /// The receiver id is empty.
    #[error("receiver id cannot be empty")]
    EmptyReceiver,
}

/// An outgoing message draft, ready for store insertion.
///
/// The store assigns `id`, `created_at`, and the initial `is_read = false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    /// The sending party (the current viewer).
    pub sender_id: UserId,
    /// The receiving party.
    pub receiver_id: UserId,
    /// Optional subject line.
    pub subject: Option<String>,
    /// Body text.
    pub body: String,
}

impl NewMessage {
    /// Validates the draft before any store call is made.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the parties are not distinct, the
    /// receiver id is empty, or the body is blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.receiver_id.as_str().is_empty() {
            return Err(ValidationError::EmptyReceiver);
        }
        if self.sender_id == self.receiver_id {
            return Err(ValidationError::SameParty);
        }
        if self.body.trim().is_empty() {
            return Err(ValidationError::EmptyBody);
        }
        Ok(())
    }
}

/// Unordered pair of users — the threading identity.
///
/// `PairKey::new(a, b) == PairKey::new(b, a)`; a thread is the set of
/// messages whose `{sender, receiver}` equals the pair, in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairKey {
    lo: UserId,
    hi: UserId,
}

impl PairKey {
    /// Creates a normalized pair key; argument order does not matter.
    #[must_use]
    pub fn new(a: UserId, b: UserId) -> Self {
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    /// Whether the given user is one of the two parties.
    #[must_use]
    pub fn contains(&self, user: &UserId) -> bool {
        self.lo == *user || self.hi == *user
    }

    /// Whether the message travels between exactly this pair (either
    /// direction).
    #[must_use]
    pub fn matches(&self, message: &Message) -> bool {
        Self::new(message.sender_id.clone(), message.receiver_id.clone()) == *self
    }

    /// The two parties, in normalized order.
    #[must_use]
    pub const fn parties(&self) -> (&UserId, &UserId) {
        (&self.lo, &self.hi)
    }
}
