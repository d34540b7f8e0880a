//! Engine-level error taxonomy.
//!
//! Component errors are recovered at each component boundary and reported
//! upward as one of these typed variants. Stale async results are not
//! errors at all — they surface as `Ok(None)` from the session operations
//! and are silently dropped.

use crate::composer::ComposeError;
use crate::directory::DirectoryError;
use crate::resolver::ResolveError;
use crate::store::StoreError;

/// Failures surfaced by session operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No signed-in user: every messaging operation is inert.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Identity directory failure that could not be degraded away.
    #[error("identity lookup failed: {0}")]
    Lookup(#[from] DirectoryError),

    /// A store read failed; the caller's previous view state is retained.
    #[error("store read failed: {0}")]
    StoreRead(#[source] StoreError),

    /// A store write failed; no optimistic state was committed.
    #[error("store write failed: {0}")]
    StoreWrite(#[source] StoreError),

    /// Composing or sending failed (includes validation and write errors).
    #[error(transparent)]
    Compose(#[from] ComposeError),

    /// The raw-id escape hatch was given an unusable id.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The operation needs an active compose draft and none exists.
    #[error("no compose draft in progress")]
    NotComposing,
}
