//! End-to-end inbox scenarios over two sessions sharing one store:
//! first contact, unread counters on both sides, mark-on-open, and the
//! admin compose-to-new-user flow.

use pairchat::auth::FixedAuth;
use pairchat::config::EngineConfig;
use pairchat::directory::StaticDirectory;
use pairchat::session::{Session, SessionEvent};
use pairchat::store::memory::MemoryStore;
use pairchat_model::message::UserId;
use pairchat_model::profile::{Profile, ProfileRole};

use tokio::sync::mpsc;

type TestSession = Session<MemoryStore, StaticDirectory, FixedAuth>;

fn session_for(
    store: &MemoryStore,
    directory: StaticDirectory,
    viewer: &UserId,
) -> (TestSession, mpsc::Receiver<SessionEvent>) {
    Session::new(
        store.clone(),
        directory,
        FixedAuth::signed_in(viewer.clone()),
        EngineConfig::default(),
    )
}

#[tokio::test]
async fn first_message_creates_conversations_on_both_sides() {
    let store = MemoryStore::new();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");

    let (a_session, _a_events) = session_for(&store, StaticDirectory::empty(), &alice);
    let (b_session, _b_events) = session_for(&store, StaticDirectory::empty(), &bob);

    // Alice starts a fresh conversation with Bob via the raw-id hatch.
    a_session.begin_compose().await.unwrap();
    let pick = a_session.raw_recipient("bob").unwrap();
    a_session.choose_recipient(pick).await.unwrap();
    a_session.set_draft_body("Hello").await.unwrap();
    a_session.send().await.unwrap();

    // Sender side: one entry for Bob, nothing unread, preview visible.
    let a_inbox = a_session.refresh_inbox().await.unwrap();
    assert_eq!(a_inbox.len(), 1);
    assert_eq!(a_inbox[0].counterparty_id, bob);
    assert_eq!(a_inbox[0].unread_count, 0);
    assert_eq!(a_inbox[0].last_message, "Hello");

    // Receiver side: one entry for Alice with one unread.
    let b_inbox = b_session.refresh_inbox().await.unwrap();
    assert_eq!(b_inbox.len(), 1);
    assert_eq!(b_inbox[0].counterparty_id, alice);
    assert_eq!(b_inbox[0].unread_count, 1);
}

#[tokio::test]
async fn opening_thread_clears_only_receivers_counter() {
    let store = MemoryStore::new();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");

    let (a_session, _a_events) = session_for(&store, StaticDirectory::empty(), &alice);
    let (b_session, _b_events) = session_for(&store, StaticDirectory::empty(), &bob);

    a_session.begin_compose().await.unwrap();
    let pick = a_session.raw_recipient("bob").unwrap();
    a_session.choose_recipient(pick).await.unwrap();
    a_session.set_draft_body("Hello").await.unwrap();
    a_session.send().await.unwrap();

    b_session.refresh_inbox().await.unwrap();
    assert_eq!(b_session.conversations().await[0].unread_count, 1);

    // Bob opens the thread: his counter drops, Alice's index is unaffected.
    b_session.open_thread(alice.clone()).await.unwrap().unwrap();
    assert_eq!(b_session.conversations().await[0].unread_count, 0);

    let a_inbox = a_session.refresh_inbox().await.unwrap();
    assert_eq!(a_inbox[0].unread_count, 0);
}

#[tokio::test]
async fn admin_compose_with_subject_reaches_new_user() {
    let store = MemoryStore::new();
    let admin = UserId::from("admin-1");
    let cand = UserId::from("cand-x");
    let directory = StaticDirectory::new(vec![Profile::named(
        "cand-x",
        "Xenia Doe",
        ProfileRole::Candidate,
    )]);

    let (admin_session, _events) = session_for(&store, directory, &admin);
    assert!(admin_session.refresh_inbox().await.unwrap().is_empty());

    admin_session.begin_compose().await.unwrap();
    let picks = admin_session
        .search_recipients("xenia")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(picks.len(), 1);
    admin_session
        .choose_recipient(picks[0].clone())
        .await
        .unwrap();
    admin_session.set_compose_subject("Welcome").await.unwrap();
    admin_session.set_draft_body("glad to have you").await.unwrap();
    admin_session.send().await.unwrap();

    // Admin's index got the fresh conversation patched in, named from the
    // search pick, without a refresh round-trip.
    let convs = admin_session.conversations().await;
    assert_eq!(convs.len(), 1);
    assert_eq!(convs[0].counterparty_name, "Xenia Doe");
    assert_eq!(convs[0].subject.as_deref(), Some("Welcome"));
    assert_eq!(convs[0].unread_count, 0);

    // The candidate sees one unread conversation from the admin.
    let (cand_session, _cand_events) = session_for(&store, StaticDirectory::empty(), &cand);
    let inbox = cand_session.refresh_inbox().await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].counterparty_id, admin);
    assert_eq!(inbox[0].unread_count, 1);
    assert_eq!(inbox[0].subject.as_deref(), Some("Welcome"));
}

#[tokio::test]
async fn directory_failure_degrades_to_raw_ids() {
    let store = MemoryStore::new();
    let alice = UserId::from("alice");
    let directory = StaticDirectory::empty();
    directory.set_failing(true);

    let (a_session, _events) = session_for(&store, directory, &alice);
    a_session.begin_compose().await.unwrap();
    let pick = a_session.raw_recipient("bob").unwrap();
    a_session.choose_recipient(pick).await.unwrap();
    a_session.set_draft_body("hi").await.unwrap();
    a_session.send().await.unwrap();

    // Lookup failure never fails the listing; the raw id is displayed.
    let inbox = a_session.refresh_inbox().await.unwrap();
    assert_eq!(inbox[0].counterparty_name, "bob");
}

#[tokio::test]
async fn inbox_read_failure_keeps_previous_snapshot() {
    let store = MemoryStore::new();
    let alice = UserId::from("alice");

    let (a_session, _events) = session_for(&store, StaticDirectory::empty(), &alice);
    a_session.begin_compose().await.unwrap();
    let pick = a_session.raw_recipient("bob").unwrap();
    a_session.choose_recipient(pick).await.unwrap();
    a_session.set_draft_body("hi").await.unwrap();
    a_session.send().await.unwrap();
    a_session.refresh_inbox().await.unwrap();

    store.set_fail_reads(true);
    assert!(a_session.refresh_inbox().await.is_err());
    // The previous index is still displayed, not blanked.
    assert_eq!(a_session.conversations().await.len(), 1);
}
