//! Authenticated-identity collaborator.
//!
//! The engine never reaches for ambient session state; whoever embeds it
//! injects an [`AuthContext`]. Messaging features are inert while
//! `current_user_id` returns `None` — no fetches, no subscriptions.

use pairchat_model::message::UserId;

/// Provides the currently signed-in user, if any.
pub trait AuthContext: Send + Sync {
    /// The signed-in user id, or `None` when logged out.
    fn current_user_id(&self) -> Option<UserId>;
}

/// Switchable auth context for tests and fixtures.
pub struct FixedAuth {
    user: parking_lot::Mutex<Option<UserId>>,
}

impl FixedAuth {
    /// An auth context already signed in as `user`.
    #[must_use]
    pub fn signed_in(user: UserId) -> Self {
        Self {
            user: parking_lot::Mutex::new(Some(user)),
        }
    }

    /// A signed-out auth context.
    #[must_use]
    pub fn signed_out() -> Self {
        Self {
            user: parking_lot::Mutex::new(None),
        }
    }

    /// Switches the signed-in user (or signs out with `None`).
    pub fn set_user(&self, user: Option<UserId>) {
        *self.user.lock() = user;
    }
}

impl AuthContext for FixedAuth {
    fn current_user_id(&self) -> Option<UserId> {
        self.user.lock().clone()
    }
}
