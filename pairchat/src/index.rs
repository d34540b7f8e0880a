//! Conversation index: the per-viewer inbox projection.
//!
//! The set of conversations is never stored — it is recomputed from the
//! flat message log on [`ConversationIndex::refresh`] and patched in place
//! for the two known-safe incremental cases (a new outgoing send, a
//! mark-read). The index is eventually consistent with the store: the
//! refresh runs several queries without snapshot isolation, and a write
//! landing between them can leave a stale unread count until the next
//! refresh or live tick.

use std::collections::HashMap;

use pairchat_model::conversation::Conversation;
use pairchat_model::message::{Message, MessageId, PairKey, UserId};
use pairchat_model::profile::{Profile, ProfileRole};

use crate::directory::IdentityDirectory;
use crate::store::{MessageQuery, MessageStore, StoreError};

/// Default body-preview length (characters).
pub const DEFAULT_PREVIEW_LEN: usize = 80;

/// Projects the distinct counterparties of `viewer` out of a slice of the
/// message log, excluding the viewer itself (self-addressed rows carry no
/// counterparty).
#[must_use]
pub fn distinct_counterparties(viewer: &UserId, messages: &[Message]) -> Vec<UserId> {
    let mut out: Vec<UserId> = Vec::new();
    for m in messages {
        if let Some(other) = m.counterparty_of(viewer) {
            if !out.contains(other) {
                out.push(other.clone());
            }
        }
    }
    out
}

/// Char-boundary-safe body preview.
#[must_use]
pub fn preview(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_owned();
    }
    let mut out: String = body.chars().take(max_chars).collect();
    out.push('\u{2026}');
    out
}

/// The derived inbox for one viewer, ordered by last activity descending.
#[derive(Debug, Clone)]
pub struct ConversationIndex {
    viewer: UserId,
    conversations: Vec<Conversation>,
    preview_len: usize,
}

impl ConversationIndex {
    /// Creates an empty index for `viewer`.
    #[must_use]
    pub fn new(viewer: UserId) -> Self {
        Self::with_preview_len(viewer, DEFAULT_PREVIEW_LEN)
    }

    /// Creates an empty index with a custom preview length.
    #[must_use]
    pub const fn with_preview_len(viewer: UserId, preview_len: usize) -> Self {
        Self {
            viewer,
            conversations: Vec::new(),
            preview_len,
        }
    }

    /// The viewer this index belongs to.
    #[must_use]
    pub const fn viewer(&self) -> &UserId {
        &self.viewer
    }

    /// Current conversation list, most recent activity first.
    #[must_use]
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Looks up the entry for a counterparty.
    #[must_use]
    pub fn get(&self, counterparty: &UserId) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|c| c.counterparty_id == *counterparty)
    }

    /// Whether `id` is currently some conversation's latest message. Used
    /// by the delete path to decide between a cheap no-op and a full
    /// recompute.
    #[must_use]
    pub fn is_last_message(&self, id: MessageId) -> bool {
        self.conversations.iter().any(|c| c.last_message_id == id)
    }

    /// Recomputes the whole projection from the store.
    ///
    /// A directory failure degrades to raw-id display names and never fails
    /// the listing. A store failure is returned to the caller and the
    /// previous index state is kept — no destructive replace-with-empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any message query fails.
    pub async fn refresh<S, D>(&mut self, store: &S, directory: &D) -> Result<(), StoreError>
    where
        S: MessageStore,
        D: IdentityDirectory,
    {
        let involving = store
            .query(MessageQuery::involving(self.viewer.clone()))
            .await?;
        let counterparties = distinct_counterparties(&self.viewer, &involving);

        let profiles = match directory.lookup_by_ids(&counterparties).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(error = %e, "profile lookup failed, showing raw ids");
                HashMap::new()
            }
        };

        let mut next: Vec<Conversation> = Vec::with_capacity(counterparties.len());
        for counterparty in counterparties {
            let pair = PairKey::new(self.viewer.clone(), counterparty.clone());
            let latest = store.query(MessageQuery::latest_in(pair)).await?;
            let Some(last) = latest.into_iter().next() else {
                // Concurrent delete emptied the pair between queries.
                continue;
            };
            let unread = store
                .query(MessageQuery::unread_from(
                    counterparty.clone(),
                    self.viewer.clone(),
                ))
                .await?
                .len();

            let (name, role) = match profiles.get(&counterparty) {
                Some(p) => (p.display_name().to_owned(), p.role),
                None => (counterparty.as_str().to_owned(), ProfileRole::Unknown),
            };

            next.push(Conversation {
                counterparty_id: counterparty,
                counterparty_name: name,
                counterparty_role: role,
                last_message_id: last.id,
                last_message: preview(&last.body, self.preview_len),
                last_message_at: last.created_at,
                subject: last.subject,
                unread_count: u32::try_from(unread).unwrap_or(u32::MAX),
            });
        }

        Self::sort(&mut next);
        self.conversations = next;
        Ok(())
    }

    /// Incremental patch for a message the viewer just sent: bump or insert
    /// the counterparty's entry without touching its unread counter.
    pub fn apply_outgoing(&mut self, message: &Message, recipient: Option<&Profile>) {
        debug_assert_eq!(message.sender_id, self.viewer);
        let counterparty = message.receiver_id.clone();
        let body = preview(&message.body, self.preview_len);

        if let Some(entry) = self
            .conversations
            .iter_mut()
            .find(|c| c.counterparty_id == counterparty)
        {
            entry.note_last_message(message, body);
        } else {
            let (name, role) = match recipient {
                Some(p) => (p.display_name().to_owned(), p.role),
                None => (counterparty.as_str().to_owned(), ProfileRole::Unknown),
            };
            self.conversations.push(Conversation {
                counterparty_id: counterparty,
                counterparty_name: name,
                counterparty_role: role,
                last_message_id: message.id,
                last_message: body,
                last_message_at: message.created_at,
                subject: message.subject.clone(),
                unread_count: 0,
            });
        }
        Self::sort(&mut self.conversations);
    }

    /// Incremental patch for a live-arrived inbound message. Increments the
    /// unread counter unless the thread with the sender is currently open.
    /// A notification already reflected in the entry (same last message id)
    /// is a no-op, so duplicate delivery cannot double-count.
    pub fn note_arrival(&mut self, message: &Message, thread_open: bool) {
        let Some(counterparty) = message.counterparty_of(&self.viewer) else {
            return;
        };
        let counterparty = counterparty.clone();
        let inbound = message.receiver_id == self.viewer;
        let body = preview(&message.body, self.preview_len);

        if let Some(entry) = self
            .conversations
            .iter_mut()
            .find(|c| c.counterparty_id == counterparty)
        {
            if entry.last_message_id == message.id {
                return;
            }
            entry.note_last_message(message, body);
            if inbound && !thread_open {
                entry.unread_count += 1;
            }
        } else {
            self.conversations.push(Conversation {
                counterparty_id: counterparty.clone(),
                counterparty_name: counterparty.as_str().to_owned(),
                counterparty_role: ProfileRole::Unknown,
                last_message_id: message.id,
                last_message: body,
                last_message_at: message.created_at,
                subject: message.subject.clone(),
                unread_count: u32::from(inbound && !thread_open),
            });
        }
        Self::sort(&mut self.conversations);
    }

    /// Incremental patch after a mark-read: zero one unread counter without
    /// recomputing anything else.
    pub fn clear_unread(&mut self, counterparty: &UserId) {
        if let Some(entry) = self
            .conversations
            .iter_mut()
            .find(|c| c.counterparty_id == *counterparty)
        {
            entry.unread_count = 0;
        }
    }

    fn sort(conversations: &mut [Conversation]) {
        conversations.sort_by(|a, b| {
            b.last_message_at
                .cmp(&a.last_message_at)
                .then_with(|| b.last_message_id.cmp(&a.last_message_id))
        });
    }
}
