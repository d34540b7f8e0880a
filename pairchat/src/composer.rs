//! Composer/reply controller: building and persisting outgoing messages.
//!
//! Two modes: **reply** targets the open thread's counterparty and derives
//! its subject from the thread ("Re:" chaining, a display convenience —
//! threading identity is always the pair, never the subject string);
//! **compose** targets an explicitly resolved recipient with a fresh
//! subject, and refuses to send until a recipient is resolved.
//!
//! On success the store-returned row (authoritative id) is appended to the
//! open thread and the index is patched; on failure nothing is mutated and
//! the draft body is preserved so the user can retry.

use pairchat_model::message::{Message, NewMessage, UserId, ValidationError};
use pairchat_model::profile::Profile;

use crate::index::ConversationIndex;
use crate::resolver::RecipientPick;
use crate::store::{MessageStore, StoreError};
use crate::thread::ThreadView;

/// Errors that can occur while composing or sending.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// Compose mode with no resolved recipient; no store call is made.
    #[error("no recipient resolved for new conversation")]
    NoRecipient,

    /// The draft failed validation; no store call is made.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// The store insert failed; draft and view state are untouched.
    #[error("send failed: {0}")]
    Write(#[from] StoreError),
}

/// Derives the reply subject from the open thread's current subject:
/// `"Re: <subject>"` when one exists, a bare `"Re:"` marker when the
/// thread has an empty subject, `None` when it has none at all.
#[must_use]
pub fn reply_subject(thread_subject: Option<&str>) -> Option<String> {
    match thread_subject {
        Some(s) if !s.trim().is_empty() => Some(format!("Re: {s}")),
        Some(_) => Some("Re:".to_owned()),
        None => None,
    }
}

enum Mode {
    Reply {
        counterparty: UserId,
    },
    Compose {
        recipient: Option<RecipientPick>,
        subject: String,
    },
}

/// An in-progress outgoing message.
pub struct Composer {
    viewer: UserId,
    mode: Mode,
    body: String,
}

impl Composer {
    /// A reply draft targeting the open thread's counterparty.
    #[must_use]
    pub const fn reply_to(viewer: UserId, counterparty: UserId) -> Self {
        Self {
            viewer,
            mode: Mode::Reply { counterparty },
            body: String::new(),
        }
    }

    /// A fresh-conversation draft with no recipient yet.
    #[must_use]
    pub const fn new_conversation(viewer: UserId) -> Self {
        Self {
            viewer,
            mode: Mode::Compose {
                recipient: None,
                subject: String::new(),
            },
            body: String::new(),
        }
    }

    /// Current draft body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Replaces the draft body.
    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    /// Sets the explicit subject (compose mode only; replies derive theirs
    /// from the thread).
    pub fn set_subject(&mut self, subject: impl Into<String>) {
        if let Mode::Compose { subject: s, .. } = &mut self.mode {
            *s = subject.into();
        }
    }

    /// Sets the resolved recipient (compose mode only).
    pub fn set_recipient(&mut self, pick: RecipientPick) {
        if let Mode::Compose { recipient, .. } = &mut self.mode {
            *recipient = Some(pick);
        }
    }

    /// The resolved recipient, if any.
    #[must_use]
    pub const fn recipient(&self) -> Option<&RecipientPick> {
        match &self.mode {
            Mode::Compose { recipient, .. } => recipient.as_ref(),
            Mode::Reply { .. } => None,
        }
    }

    /// Whether this draft can be sent right now (recipient resolved and
    /// body non-blank). Used to gate the send control.
    #[must_use]
    pub fn ready(&self) -> bool {
        let has_target = match &self.mode {
            Mode::Reply { .. } => true,
            Mode::Compose { recipient, .. } => recipient.is_some(),
        };
        has_target && !self.body.trim().is_empty()
    }

    fn build_draft(&self, thread_subject: Option<&str>) -> Result<NewMessage, ComposeError> {
        let (receiver, subject) = match &self.mode {
            Mode::Reply { counterparty } => {
                (counterparty.clone(), reply_subject(thread_subject))
            }
            Mode::Compose { recipient, subject } => {
                let pick = recipient.as_ref().ok_or(ComposeError::NoRecipient)?;
                let subject = if subject.trim().is_empty() {
                    None
                } else {
                    Some(subject.clone())
                };
                (pick.id.clone(), subject)
            }
        };
        let draft = NewMessage {
            sender_id: self.viewer.clone(),
            receiver_id: receiver,
            subject,
            body: self.body.clone(),
        };
        draft.validate()?;
        Ok(draft)
    }

    /// Sends the draft: validate, insert, then optimistically patch the
    /// open thread and the conversation index with the store-returned row.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError`] if the draft is unsendable or the store
    /// insert fails; in both cases the thread, the index, and the draft
    /// body are left exactly as they were.
    pub async fn send<S: MessageStore>(
        &mut self,
        store: &S,
        thread: Option<&mut ThreadView>,
        index: Option<&mut ConversationIndex>,
    ) -> Result<Message, ComposeError> {
        let thread_subject = thread.as_ref().and_then(|t| t.subject().map(str::to_owned));
        let draft = self.build_draft(thread_subject.as_deref())?;

        let message = store.insert(draft).await?;

        if let Some(thread) = thread {
            thread.append_sent(message.clone());
        }
        if let Some(index) = index {
            let profile = self.recipient_profile();
            index.apply_outgoing(&message, profile.as_ref());
        }
        self.body.clear();
        if let Mode::Compose { subject, .. } = &mut self.mode {
            subject.clear();
        }
        tracing::debug!(message_id = %message.id, receiver = %message.receiver_id, "message sent");
        Ok(message)
    }

    /// A minimal profile for naming a brand-new conversation entry, built
    /// from the resolved recipient pick.
    fn recipient_profile(&self) -> Option<Profile> {
        match &self.mode {
            Mode::Compose {
                recipient: Some(pick),
                ..
            } => Some(Profile::named(
                pick.id.as_str(),
                pick.display_name.clone(),
                pick.role,
            )),
            _ => None,
        }
    }
}
