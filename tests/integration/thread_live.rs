//! Live-path integration tests: routing subscription ticks into the open
//! thread and the index, echo suppression for the viewer's own sends, and
//! the switch-before-resolve race on thread selection.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::oneshot;

use pairchat::auth::FixedAuth;
use pairchat::config::EngineConfig;
use pairchat::directory::StaticDirectory;
use pairchat::session::{Session, SessionEvent};
use pairchat::store::memory::{MemoryStore, draft};
use pairchat::store::{InsertFilter, MessageQuery, MessageStore, StoreError, Subscription};
use pairchat_model::message::{Message, MessageId, NewMessage, Timestamp, UserId};

fn session_for(
    store: MemoryStore,
    viewer: &UserId,
) -> (
    Session<MemoryStore, StaticDirectory, FixedAuth>,
    tokio::sync::mpsc::Receiver<SessionEvent>,
) {
    Session::new(
        store,
        StaticDirectory::empty(),
        FixedAuth::signed_in(viewer.clone()),
        EngineConfig::default(),
    )
}

#[tokio::test]
async fn live_arrival_appends_to_open_thread_and_is_marked_read() {
    let store = MemoryStore::new();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");

    let (session, mut events) = session_for(store.clone(), &alice);
    session.refresh_inbox().await.unwrap();
    session.open_thread(bob.clone()).await.unwrap().unwrap();

    store.insert(draft(&bob, &alice, None, "ping")).await.unwrap();
    assert_eq!(session.pump_live().await, 1);

    let thread = session.thread().await.unwrap();
    assert_eq!(thread.messages().len(), 1);
    assert!(thread.unread_inbound_ids().is_empty());

    // The viewer was looking at the thread: nothing left unread upstream
    // and the index counter stayed at zero.
    let pending = store
        .query(MessageQuery::unread_from(bob.clone(), alice))
        .await
        .unwrap();
    assert!(pending.is_empty());
    assert_eq!(session.conversations().await[0].unread_count, 0);

    let mut saw_arrival = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SessionEvent::MessageArrived { .. }) {
            saw_arrival = true;
        }
    }
    assert!(saw_arrival);
}

#[tokio::test]
async fn arrival_while_thread_closed_increments_unread() {
    let store = MemoryStore::new();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");

    let (session, _events) = session_for(store.clone(), &alice);
    session.refresh_inbox().await.unwrap();

    store.insert(draft(&bob, &alice, None, "ping")).await.unwrap();
    assert_eq!(session.pump_live().await, 1);

    let convs = session.conversations().await;
    assert_eq!(convs.len(), 1);
    assert_eq!(convs[0].counterparty_id, bob);
    assert_eq!(convs[0].unread_count, 1);
    assert_eq!(convs[0].last_message, "ping");
}

#[tokio::test]
async fn own_send_is_not_echoed_through_the_feed() {
    let store = MemoryStore::new();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");

    let (session, _events) = session_for(store.clone(), &alice);
    session.open_thread(bob).await.unwrap().unwrap();
    session.set_draft_body("hello").await.unwrap();
    session.send().await.unwrap();

    // The subscription is receiver-scoped, so the sender's own insert
    // produces no tick; the thread already holds the optimistic append.
    assert_eq!(session.pump_live().await, 0);
    assert_eq!(session.thread().await.unwrap().messages().len(), 1);
}

#[tokio::test]
async fn pump_is_inert_when_signed_out() {
    let store = MemoryStore::new();
    let (session, _events) = Session::new(
        store,
        StaticDirectory::empty(),
        FixedAuth::signed_out(),
        EngineConfig::default(),
    );
    assert_eq!(session.pump_live().await, 0);
}

/// Store wrapper whose queries block on externally held gates, for forcing
/// the slow-load / fast-switch interleaving.
#[derive(Clone)]
struct GatedStore {
    inner: MemoryStore,
    gates: Arc<parking_lot::Mutex<VecDeque<oneshot::Receiver<()>>>>,
}

impl GatedStore {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            gates: Arc::new(parking_lot::Mutex::new(VecDeque::new())),
        }
    }

    /// Arms a gate for the next query; the returned sender releases it.
    fn gate(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().push_back(rx);
        tx
    }

    fn armed(&self) -> usize {
        self.gates.lock().len()
    }
}

impl MessageStore for GatedStore {
    async fn insert(&self, draft: NewMessage) -> Result<Message, StoreError> {
        self.inner.insert(draft).await
    }

    async fn query(&self, query: MessageQuery) -> Result<Vec<Message>, StoreError> {
        let gate = self.gates.lock().pop_front();
        if let Some(rx) = gate {
            let _ = rx.await;
        }
        self.inner.query(query).await
    }

    async fn mark_read_by_ids(&self, ids: &[MessageId]) -> Result<(), StoreError> {
        self.inner.mark_read_by_ids(ids).await
    }

    async fn delete(&self, id: MessageId) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }

    async fn subscribe_inserts(&self, filter: InsertFilter) -> Result<Subscription, StoreError> {
        self.inner.subscribe_inserts(filter).await
    }
}

#[tokio::test]
async fn slow_thread_load_for_superseded_selection_is_discarded() {
    let inner = MemoryStore::new();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");
    let carol = UserId::from("carol");
    inner
        .insert_at(draft(&bob, &alice, None, "from bob"), Timestamp::from_millis(10))
        .await
        .unwrap();
    inner
        .insert_at(draft(&carol, &alice, None, "from carol"), Timestamp::from_millis(20))
        .await
        .unwrap();

    let store = GatedStore::new(inner);
    let (session, _events) = Session::new(
        store.clone(),
        StaticDirectory::empty(),
        FixedAuth::signed_in(alice),
        EngineConfig::default(),
    );
    let session = Arc::new(session);

    // Both selections block in their thread fetch, bob's first.
    let release_bob = store.gate();
    let release_carol = store.gate();

    let bob_load = tokio::spawn({
        let session = Arc::clone(&session);
        let bob = bob.clone();
        async move { session.open_thread(bob).await }
    });
    while store.armed() > 1 {
        tokio::task::yield_now().await;
    }

    let carol_load = tokio::spawn({
        let session = Arc::clone(&session);
        let carol = carol.clone();
        async move { session.open_thread(carol).await }
    });
    while store.armed() > 0 {
        tokio::task::yield_now().await;
    }

    // The newer selection resolves first and wins.
    release_carol.send(()).unwrap();
    let carol_thread = carol_load.await.unwrap().unwrap().unwrap();
    assert_eq!(carol_thread.counterparty(), &carol);

    // The older load resolves late: discarded, active thread untouched.
    release_bob.send(()).unwrap();
    assert!(bob_load.await.unwrap().unwrap().is_none());
    assert_eq!(session.thread().await.unwrap().counterparty(), &carol);
}
