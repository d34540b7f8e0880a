//! Session orchestrator: one viewer's messaging state.
//!
//! Owns the only shared mutable client-side state — the conversation index
//! and the currently open thread — and drives every component through a
//! single lock, so "last write from a stale async call is dropped" holds
//! without any further locking discipline. Each thread load is tagged with
//! a selection generation; a load finishing for a selection that is no
//! longer active is silently discarded.
//!
//! The live insert subscription is acquired on first authenticated use and
//! held as an RAII handle inside the session, so dropping the session (or
//! signing out) tears it down — no leaked subscriptions across view
//! switches.

use tokio::sync::{Mutex, mpsc};

use pairchat_model::conversation::Conversation;
use pairchat_model::message::{Message, MessageId, UserId};

use crate::auth::AuthContext;
use crate::composer::Composer;
use crate::config::EngineConfig;
use crate::directory::IdentityDirectory;
use crate::error::EngineError;
use crate::index::ConversationIndex;
use crate::read_state;
use crate::resolver::{RecipientPick, RecipientResolver};
use crate::store::{InsertFilter, MessageStore, Subscription};
use crate::thread::ThreadView;

/// Events emitted to the embedding UI. Delivery is best-effort: a full
/// channel drops the event, and the UI self-corrects on its next snapshot.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The conversation index was recomputed.
    InboxRefreshed,
    /// A thread became the active selection.
    ThreadOpened {
        /// The thread's counterparty.
        counterparty: UserId,
    },
    /// The active thread was closed.
    ThreadClosed,
    /// A live insert was routed into the session.
    MessageArrived {
        /// The arrived message.
        message: Message,
    },
    /// An outgoing message was persisted.
    MessageSent {
        /// Store-assigned id of the sent message.
        message_id: MessageId,
    },
    /// A message was removed by an admin delete.
    MessageDeleted {
        /// Id of the removed message.
        message_id: MessageId,
    },
}

struct SessionState {
    viewer: Option<UserId>,
    index: Option<ConversationIndex>,
    thread: Option<ThreadView>,
    composer: Option<Composer>,
    live: Option<Subscription>,
    selection_gen: u64,
}

impl SessionState {
    const fn empty() -> Self {
        Self {
            viewer: None,
            index: None,
            thread: None,
            composer: None,
            live: None,
            selection_gen: 0,
        }
    }

    fn reset(&mut self) {
        self.viewer = None;
        self.index = None;
        self.thread = None;
        self.composer = None;
        self.live = None;
        self.selection_gen = self.selection_gen.wrapping_add(1);
    }
}

/// One viewer's messaging session over injected collaborators.
pub struct Session<S, D, A> {
    store: S,
    directory: D,
    auth: A,
    config: EngineConfig,
    resolver: RecipientResolver,
    state: Mutex<SessionState>,
    event_tx: mpsc::Sender<SessionEvent>,
}

impl<S, D, A> Session<S, D, A>
where
    S: MessageStore,
    D: IdentityDirectory,
    A: AuthContext,
{
    /// Creates a session and the event receiver for the embedding UI.
    #[must_use]
    pub fn new(
        store: S,
        directory: D,
        auth: A,
        config: EngineConfig,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer);
        let resolver = RecipientResolver::new(config.search_debounce, config.search_limit);
        let session = Self {
            store,
            directory,
            auth,
            config,
            resolver,
            state: Mutex::new(SessionState::empty()),
            event_tx,
        };
        (session, event_rx)
    }

    /// Reconciles session state with the auth context. Signing out resets
    /// everything (dropping the live subscription); switching users starts
    /// from a clean slate for the new viewer.
    fn sync_auth(&self, state: &mut SessionState) -> Result<UserId, EngineError> {
        match self.auth.current_user_id() {
            None => {
                if state.viewer.is_some() {
                    tracing::debug!("signed out, messaging state cleared");
                    state.reset();
                }
                Err(EngineError::NotAuthenticated)
            }
            Some(user) => {
                if state.viewer.as_ref() != Some(&user) {
                    state.reset();
                    state.viewer = Some(user.clone());
                }
                Ok(user)
            }
        }
    }

    async fn ensure_live(
        &self,
        state: &mut SessionState,
        viewer: &UserId,
    ) -> Result<(), EngineError> {
        if state.live.is_none() {
            let sub = self
                .store
                .subscribe_inserts(InsertFilter::inbound_for(viewer.clone()))
                .await
                .map_err(EngineError::StoreRead)?;
            state.live = Some(sub);
        }
        Ok(())
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.try_send(event);
    }

    /// Recomputes the conversation index and returns a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotAuthenticated`] when signed out, or
    /// [`EngineError::StoreRead`] if the projection queries fail — in
    /// which case the previously displayed index is retained.
    pub async fn refresh_inbox(&self) -> Result<Vec<Conversation>, EngineError> {
        let mut state = self.state.lock().await;
        let viewer = self.sync_auth(&mut state)?;
        self.ensure_live(&mut state, &viewer).await?;

        let index = state.index.get_or_insert_with(|| {
            ConversationIndex::with_preview_len(viewer.clone(), self.config.preview_len)
        });
        index
            .refresh(&self.store, &self.directory)
            .await
            .map_err(EngineError::StoreRead)?;

        let snapshot = index.conversations().to_vec();
        self.emit(SessionEvent::InboxRefreshed);
        Ok(snapshot)
    }

    /// Current index snapshot without touching the store.
    pub async fn conversations(&self) -> Vec<Conversation> {
        let state = self.state.lock().await;
        state
            .index
            .as_ref()
            .map(|i| i.conversations().to_vec())
            .unwrap_or_default()
    }

    /// Opens the thread with `counterparty`, making it the active
    /// selection, and marks its inbound messages read.
    ///
    /// Returns `Ok(None)` when the result arrived for a selection that is
    /// no longer active (the classic switch-before-resolve race); the
    /// stale result is discarded without touching state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotAuthenticated`] when signed out, or
    /// [`EngineError::StoreRead`] if the thread fetch fails — the
    /// previous selection stays displayed.
    pub async fn open_thread(
        &self,
        counterparty: UserId,
    ) -> Result<Option<ThreadView>, EngineError> {
        let (viewer, my_gen) = {
            let mut state = self.state.lock().await;
            let viewer = self.sync_auth(&mut state)?;
            self.ensure_live(&mut state, &viewer).await?;
            state.selection_gen = state.selection_gen.wrapping_add(1);
            (viewer, state.selection_gen)
        };

        // No lock held across the fetch: a newer selection can win the
        // race and this result will be dropped below.
        let loaded = ThreadView::load(&self.store, viewer.clone(), counterparty.clone()).await;

        let mut state = self.state.lock().await;
        if state.selection_gen != my_gen || state.viewer.as_ref() != Some(&viewer) {
            tracing::debug!(%counterparty, "stale thread load discarded");
            return Ok(None);
        }
        let mut thread = loaded.map_err(EngineError::StoreRead)?;

        // Opening the thread is what marks inbound messages read. A mark
        // failure keeps the thread usable; the counter self-corrects on
        // the next refresh.
        if let Err(e) =
            read_state::mark_thread_read(&self.store, &mut thread, state.index.as_mut()).await
        {
            tracing::warn!(%counterparty, error = %e, "mark-as-read failed on thread open");
        }

        state.thread = Some(thread.clone());
        state.composer = Some(Composer::reply_to(viewer, counterparty.clone()));
        self.emit(SessionEvent::ThreadOpened { counterparty });
        Ok(Some(thread))
    }

    /// Closes the active thread, if any. The live subscription stays up —
    /// it belongs to the session, not the selection.
    pub async fn close_thread(&self) {
        let mut state = self.state.lock().await;
        if state.thread.take().is_some() {
            state.composer = None;
            state.selection_gen = state.selection_gen.wrapping_add(1);
            self.emit(SessionEvent::ThreadClosed);
        }
    }

    /// Snapshot of the active thread.
    pub async fn thread(&self) -> Option<ThreadView> {
        self.state.lock().await.thread.clone()
    }

    /// Starts a fresh-conversation draft (compose mode), replacing any
    /// reply draft.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotAuthenticated`] when signed out.
    pub async fn begin_compose(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        let viewer = self.sync_auth(&mut state)?;
        state.composer = Some(Composer::new_conversation(viewer));
        Ok(())
    }

    /// Replaces the current draft body, preserving it across failed sends.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotComposing`] when no draft exists.
    pub async fn set_draft_body(&self, body: impl Into<String> + Send) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        let composer = state.composer.as_mut().ok_or(EngineError::NotComposing)?;
        composer.set_body(body);
        Ok(())
    }

    /// Current draft body.
    pub async fn draft_body(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.composer.as_ref().map(|c| c.body().to_owned())
    }

    /// Sets the compose-mode subject.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotComposing`] when no draft exists.
    pub async fn set_compose_subject(
        &self,
        subject: impl Into<String> + Send,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        let composer = state.composer.as_mut().ok_or(EngineError::NotComposing)?;
        composer.set_subject(subject);
        Ok(())
    }

    /// Resolves the compose-mode recipient from a search pick or raw id.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotComposing`] when no draft exists.
    pub async fn choose_recipient(&self, pick: RecipientPick) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        let composer = state.composer.as_mut().ok_or(EngineError::NotComposing)?;
        composer.set_recipient(pick);
        Ok(())
    }

    /// The raw-id escape hatch: builds a pick from a pasted id without
    /// consulting the directory.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Resolve`] for a blank id.
    pub fn raw_recipient(&self, raw: &str) -> Result<RecipientPick, EngineError> {
        Ok(self.resolver.use_raw_id(raw)?)
    }

    /// Debounced recipient search; `Ok(None)` means a newer query
    /// superseded this one and the result was dropped.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotAuthenticated`] when signed out, or
    /// [`EngineError::Lookup`] if the directory search fails.
    pub async fn search_recipients(
        &self,
        query: &str,
    ) -> Result<Option<Vec<RecipientPick>>, EngineError> {
        {
            let mut state = self.state.lock().await;
            self.sync_auth(&mut state)?;
        }
        // Lock released during the debounce window and directory call.
        Ok(self.resolver.search(&self.directory, query).await?)
    }

    /// Sends the current draft (reply or compose mode) and optimistically
    /// patches the open thread and the index with the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotAuthenticated`] when signed out,
    /// [`EngineError::NotComposing`] without a draft, or
    /// [`EngineError::Compose`] when the draft is unsendable or the store
    /// write fails — the draft body is preserved for retry.
    pub async fn send(&self) -> Result<Message, EngineError> {
        let mut state = self.state.lock().await;
        self.sync_auth(&mut state)?;
        let SessionState {
            thread,
            index,
            composer,
            ..
        } = &mut *state;
        let composer = composer.as_mut().ok_or(EngineError::NotComposing)?;

        let message = composer
            .send(&self.store, thread.as_mut(), index.as_mut())
            .await?;
        self.emit(SessionEvent::MessageSent {
            message_id: message.id,
        });
        Ok(message)
    }

    /// Admin delete: removes a message from the store, the open thread,
    /// and — when it was some conversation's latest message — recomputes
    /// the index (incremental patching cannot know the new latest).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotAuthenticated`] when signed out, or
    /// [`EngineError::StoreWrite`] if the store delete fails (no local
    /// state is touched in that case).
    pub async fn delete_message(&self, id: MessageId) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        self.sync_auth(&mut state)?;

        let was_last = state
            .index
            .as_ref()
            .is_some_and(|i| i.is_last_message(id));

        self.store
            .delete(id)
            .await
            .map_err(EngineError::StoreWrite)?;

        if let Some(thread) = state.thread.as_mut() {
            thread.remove(id);
        }
        if was_last {
            if let Some(index) = state.index.as_mut() {
                if let Err(e) = index.refresh(&self.store, &self.directory).await {
                    tracing::warn!(error = %e, "index recompute after delete failed");
                }
            }
        }
        self.emit(SessionEvent::MessageDeleted { message_id: id });
        Ok(())
    }

    /// Drains pending live inserts and routes each into the open thread
    /// and the index. Returns the number of messages processed.
    ///
    /// Never fails: routing errors are logged and swallowed so a bad tick
    /// cannot kill the subscription.
    pub async fn pump_live(&self) -> usize {
        let mut state = self.state.lock().await;
        if state.viewer.is_none() {
            return 0;
        }
        let mut processed = 0;
        loop {
            let Some(message) = state.live.as_mut().and_then(Subscription::try_next) else {
                break;
            };
            self.route_live(&mut state, message).await;
            processed += 1;
        }
        processed
    }

    async fn route_live(&self, state: &mut SessionState, message: Message) {
        let SessionState { thread, index, .. } = state;
        let open_matches = thread
            .as_ref()
            .is_some_and(|t| t.pair().matches(&message));

        if open_matches {
            if let Some(thread) = thread.as_mut() {
                if thread.apply_live(message.clone()) {
                    // The receiver is looking at the thread: mark the new
                    // arrival read right away.
                    if let Err(e) =
                        read_state::mark_thread_read(&self.store, thread, index.as_mut()).await
                    {
                        tracing::warn!(error = %e, "mark-as-read failed on live arrival");
                    }
                }
            }
            if let Some(index) = index.as_mut() {
                index.note_arrival(&message, true);
            }
        } else if let Some(index) = index.as_mut() {
            index.note_arrival(&message, false);
        }

        self.emit(SessionEvent::MessageArrived { message });
    }
}
