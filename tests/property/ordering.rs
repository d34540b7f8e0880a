//! Property tests for the model's ordering and normalization invariants.

use proptest::prelude::*;

use pairchat_model::message::{Message, MessageId, PairKey, RawMessageRow, Timestamp, UserId};

fn arb_user() -> impl Strategy<Value = UserId> {
    "[a-z]{1,8}".prop_map(UserId::new)
}

fn arb_message() -> impl Strategy<Value = Message> {
    (
        any::<i64>(),
        arb_user(),
        arb_user(),
        proptest::option::of("[A-Za-z ]{0,12}"),
        "[A-Za-z ]{0,24}",
        0..1_000_000i64,
        any::<bool>(),
    )
        .prop_map(|(id, sender, receiver, subject, body, at, read)| Message {
            id: MessageId::new(id),
            sender_id: sender,
            receiver_id: receiver,
            subject,
            body,
            created_at: Timestamp::from_millis(at),
            is_read: read,
        })
}

proptest! {
    /// Pair keys are symmetric in their arguments.
    #[test]
    fn pair_key_symmetry(a in arb_user(), b in arb_user()) {
        prop_assert_eq!(
            PairKey::new(a.clone(), b.clone()),
            PairKey::new(b, a)
        );
    }

    /// A pair key built from a message always matches that message.
    #[test]
    fn pair_key_matches_own_message(m in arb_message()) {
        let key = PairKey::new(m.sender_id.clone(), m.receiver_id.clone());
        prop_assert!(key.matches(&m));
    }

    /// Sorting by the ordering key is deterministic: equal timestamps are
    /// ordered by id, so no two distinct ids ever compare equal.
    #[test]
    fn ordering_key_is_total(mut msgs in proptest::collection::vec(arb_message(), 0..32)) {
        msgs.sort_by_key(Message::ordering_key);
        for pair in msgs.windows(2) {
            prop_assert!(pair[0].ordering_key() <= pair[1].ordering_key());
            if pair[0].id != pair[1].id {
                prop_assert!(pair[0].ordering_key() != pair[1].ordering_key());
            }
        }
    }

    /// The counterparty relation is symmetric between the two parties and
    /// empty for self-addressed rows.
    #[test]
    fn counterparty_relation(m in arb_message()) {
        if m.sender_id == m.receiver_id {
            prop_assert_eq!(m.counterparty_of(&m.sender_id), None);
        } else {
            prop_assert_eq!(m.counterparty_of(&m.sender_id), Some(&m.receiver_id));
            prop_assert_eq!(m.counterparty_of(&m.receiver_id), Some(&m.sender_id));
        }
    }

    /// Body normalization: the current column wins, the legacy column is
    /// the fallback, and the result never panics on any combination.
    #[test]
    fn body_coalesce(
        body in proptest::option::of("[A-Za-z]{0,16}"),
        content in proptest::option::of("[A-Za-z]{0,16}"),
    ) {
        let row = RawMessageRow {
            id: 1,
            sender_id: "a".into(),
            receiver_id: "b".into(),
            subject: None,
            body: body.clone(),
            content: content.clone(),
            created_at: 0,
            is_read: false,
        };
        let normalized = row.normalize();
        let expected = body.or(content).unwrap_or_default();
        prop_assert_eq!(normalized.body, expected);
    }
}
