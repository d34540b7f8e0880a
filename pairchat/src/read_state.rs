//! Read-state tracker: the single writer of the `is_read` flag.
//!
//! Marking happens only when the receiving viewer opens or refreshes a
//! thread; a sender never marks its own sent messages. The store update is
//! one batched call for the whole thread, and the conversation index entry
//! is patched in place afterwards so the unread counter drops to zero
//! without a full recompute (no visible counter flicker).

use crate::index::ConversationIndex;
use crate::store::{MessageStore, StoreError};
use crate::thread::ThreadView;

/// Marks every unread inbound message in `thread` as read.
///
/// Idempotent: a thread with nothing unread results in no store call, and
/// re-running after a success is a no-op. Returns the number of messages
/// marked.
///
/// # Errors
///
/// Returns [`StoreError`] if the batch update fails; neither the thread nor
/// the index is patched in that case.
pub async fn mark_thread_read<S: MessageStore>(
    store: &S,
    thread: &mut ThreadView,
    index: Option<&mut ConversationIndex>,
) -> Result<usize, StoreError> {
    let ids = thread.unread_inbound_ids();
    if !ids.is_empty() {
        store.mark_read_by_ids(&ids).await?;
        thread.mark_inbound_read();
        tracing::debug!(
            counterparty = %thread.counterparty(),
            marked = ids.len(),
            "marked thread read"
        );
    }
    if let Some(index) = index {
        index.clear_unread(thread.counterparty());
    }
    Ok(ids.len())
}
