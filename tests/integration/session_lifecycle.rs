//! Session lifecycle tests: subscription teardown, user switching,
//! failed-send draft retention, and admin-delete index recomputation.

use std::sync::Arc;

use pairchat::auth::{AuthContext, FixedAuth};
use pairchat::config::EngineConfig;
use pairchat::directory::StaticDirectory;
use pairchat::error::EngineError;
use pairchat::session::{Session, SessionEvent};
use pairchat::store::memory::{MemoryStore, draft};
use pairchat_model::message::{Timestamp, UserId};

/// Auth handle the test keeps while the session owns the other end.
#[derive(Clone)]
struct SharedAuth {
    inner: Arc<FixedAuth>,
}

impl SharedAuth {
    fn signed_in(user: &UserId) -> Self {
        Self {
            inner: Arc::new(FixedAuth::signed_in(user.clone())),
        }
    }

    fn switch_to(&self, user: &UserId) {
        self.inner.set_user(Some(user.clone()));
    }
}

impl AuthContext for SharedAuth {
    fn current_user_id(&self) -> Option<UserId> {
        self.inner.current_user_id()
    }
}

#[tokio::test]
async fn dropping_the_session_tears_down_the_subscription() {
    let store = MemoryStore::new();
    let alice = UserId::from("alice");
    let (session, _events) = Session::new(
        store.clone(),
        StaticDirectory::empty(),
        FixedAuth::signed_in(alice),
        EngineConfig::default(),
    );

    session.refresh_inbox().await.unwrap();
    assert_eq!(store.subscriber_count(), 1);

    drop(session);
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn switching_users_starts_from_a_clean_slate() {
    let store = MemoryStore::new();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");
    let carol = UserId::from("carol");
    store
        .insert_at(draft(&bob, &alice, None, "for alice"), Timestamp::from_millis(10))
        .await
        .unwrap();

    let auth = SharedAuth::signed_in(&alice);
    let (session, _events) = Session::new(
        store.clone(),
        StaticDirectory::empty(),
        auth.clone(),
        EngineConfig::default(),
    );

    assert_eq!(session.refresh_inbox().await.unwrap().len(), 1);
    session.open_thread(bob).await.unwrap().unwrap();
    assert_eq!(store.subscriber_count(), 1);

    // Carol signs in on the same device: alice's index, thread, and
    // subscription are gone before anything is fetched for carol.
    auth.switch_to(&carol);
    assert!(session.refresh_inbox().await.unwrap().is_empty());
    assert!(session.thread().await.is_none());
    assert_eq!(store.subscriber_count(), 1);
}

#[tokio::test]
async fn failed_send_preserves_the_draft_for_retry() {
    let store = MemoryStore::new();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");
    store
        .insert_at(draft(&bob, &alice, None, "hi"), Timestamp::from_millis(10))
        .await
        .unwrap();

    let (session, _events) = Session::new(
        store.clone(),
        StaticDirectory::empty(),
        FixedAuth::signed_in(alice),
        EngineConfig::default(),
    );
    session.open_thread(bob).await.unwrap().unwrap();
    session.set_draft_body("carefully worded reply").await.unwrap();

    store.set_fail_writes(true);
    assert!(matches!(
        session.send().await,
        Err(EngineError::Compose(_))
    ));
    assert_eq!(
        session.draft_body().await.as_deref(),
        Some("carefully worded reply")
    );

    // Retry succeeds and clears the body.
    store.set_fail_writes(false);
    let sent = session.send().await.unwrap();
    assert_eq!(sent.body, "carefully worded reply");
    assert_eq!(session.draft_body().await.as_deref(), Some(""));
    assert_eq!(session.thread().await.unwrap().messages().len(), 2);
}

#[tokio::test]
async fn deleting_the_latest_message_recomputes_the_entry() {
    let store = MemoryStore::new();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");
    store
        .insert_at(draft(&bob, &alice, None, "first"), Timestamp::from_millis(10))
        .await
        .unwrap();
    let latest = store
        .insert_at(draft(&bob, &alice, None, "second"), Timestamp::from_millis(20))
        .await
        .unwrap();

    let (session, mut events) = Session::new(
        store.clone(),
        StaticDirectory::empty(),
        FixedAuth::signed_in(alice),
        EngineConfig::default(),
    );
    let inbox = session.refresh_inbox().await.unwrap();
    assert_eq!(inbox[0].last_message, "second");
    assert_eq!(inbox[0].unread_count, 2);

    session.delete_message(latest.id).await.unwrap();

    // The entry now reflects the surviving latest message.
    let convs = session.conversations().await;
    assert_eq!(convs[0].last_message, "first");
    assert_eq!(convs[0].unread_count, 1);

    let mut saw_delete = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SessionEvent::MessageDeleted { message_id } if message_id == latest.id)
        {
            saw_delete = true;
        }
    }
    assert!(saw_delete);
}

#[tokio::test]
async fn deleting_an_older_message_skips_the_recompute() {
    let store = MemoryStore::new();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");
    let older = store
        .insert_at(draft(&bob, &alice, None, "first"), Timestamp::from_millis(10))
        .await
        .unwrap();
    store
        .insert_at(draft(&bob, &alice, None, "second"), Timestamp::from_millis(20))
        .await
        .unwrap();

    let (session, _events) = Session::new(
        store.clone(),
        StaticDirectory::empty(),
        FixedAuth::signed_in(alice),
        EngineConfig::default(),
    );
    session.refresh_inbox().await.unwrap();
    session.delete_message(older.id).await.unwrap();

    // No recompute: the cheap path leaves the entry as-is, and the next
    // refresh converges.
    let convs = session.conversations().await;
    assert_eq!(convs[0].last_message, "second");
    assert_eq!(convs[0].unread_count, 2);

    let refreshed = session.refresh_inbox().await.unwrap();
    assert_eq!(refreshed[0].unread_count, 1);
}

#[tokio::test]
async fn failed_delete_leaves_local_state_untouched() {
    let store = MemoryStore::new();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");
    let m = store
        .insert_at(draft(&bob, &alice, None, "keep me"), Timestamp::from_millis(10))
        .await
        .unwrap();

    let (session, _events) = Session::new(
        store.clone(),
        StaticDirectory::empty(),
        FixedAuth::signed_in(alice.clone()),
        EngineConfig::default(),
    );
    session.refresh_inbox().await.unwrap();
    session.open_thread(bob).await.unwrap().unwrap();

    store.set_fail_writes(true);
    assert!(matches!(
        session.delete_message(m.id).await,
        Err(EngineError::StoreWrite(_))
    ));
    assert_eq!(session.thread().await.unwrap().messages().len(), 1);
    assert_eq!(session.conversations().await.len(), 1);
}
