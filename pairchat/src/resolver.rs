//! Recipient resolver: picking a counterparty for a fresh thread.
//!
//! Wraps the identity directory's name search with a debounce window and a
//! stale-query guard: while an admin types, only the most recent query's
//! results survive; earlier in-flight searches resolve to `None` and are
//! dropped. The raw-id escape hatch bypasses search entirely — the
//! directory may not have an entry for every valid receiver id (brand-new
//! accounts), and a pasted id must still work.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use pairchat_model::message::UserId;
use pairchat_model::profile::{Profile, ProfileRole};

use crate::directory::{DirectoryError, IdentityDirectory};

/// Default debounce window between keystroke and directory search.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Where a resolved recipient came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickSource {
    /// Chosen from directory search results.
    Search,
    /// Pasted as a raw id, bypassing the directory.
    RawId,
}

/// A resolved recipient, ready for the composer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientPick {
    /// The receiver id to address.
    pub id: UserId,
    /// Name to display while composing.
    pub display_name: String,
    /// Role tag from the originating directory table.
    pub role: ProfileRole,
    /// How the recipient was resolved.
    pub source: PickSource,
}

impl RecipientPick {
    /// Builds a pick from a directory search hit.
    #[must_use]
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            id: profile.id.clone(),
            display_name: profile.display_name().to_owned(),
            role: profile.role,
            source: PickSource::Search,
        }
    }
}

/// Errors from the raw-id escape hatch.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The pasted id was empty after trimming.
    #[error("recipient id cannot be empty")]
    EmptyId,
}

/// Debounced, stale-discarding search over the identity directory.
pub struct RecipientResolver {
    debounce: Duration,
    max_results: usize,
    generation: AtomicU64,
}

impl RecipientResolver {
    /// Creates a resolver with the given debounce window and result cap.
    #[must_use]
    pub const fn new(debounce: Duration, max_results: usize) -> Self {
        Self {
            debounce,
            max_results,
            generation: AtomicU64::new(0),
        }
    }

    /// Searches the directory after the debounce window.
    ///
    /// Returns `Ok(None)` when a newer query superseded this one while it
    /// was waiting or in flight — the caller silently drops that outcome.
    /// An empty query resolves to an empty result list without touching
    /// the directory.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the directory search itself fails.
    pub async fn search<D: IdentityDirectory>(
        &self,
        directory: &D,
        query: &str,
    ) -> Result<Option<Vec<RecipientPick>>, DirectoryError> {
        let my_gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Ok(Some(Vec::new()));
        }

        tokio::time::sleep(self.debounce).await;
        if self.generation.load(Ordering::SeqCst) != my_gen {
            tracing::debug!(query = trimmed, "search superseded during debounce");
            return Ok(None);
        }

        let profiles = directory.search_by_name(trimmed).await?;
        if self.generation.load(Ordering::SeqCst) != my_gen {
            tracing::debug!(query = trimmed, "search superseded in flight");
            return Ok(None);
        }

        let mut picks: Vec<RecipientPick> = Vec::new();
        for profile in &profiles {
            if picks.len() >= self.max_results {
                break;
            }
            // First hit wins when the same id appears in several sources.
            if !picks.iter().any(|p| p.id == profile.id) {
                picks.push(RecipientPick::from_profile(profile));
            }
        }
        Ok(Some(picks))
    }

    /// Resolves a pasted raw id without consulting the directory.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::EmptyId`] if the id is blank.
    pub fn use_raw_id(&self, raw: &str) -> Result<RecipientPick, ResolveError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ResolveError::EmptyId);
        }
        Ok(RecipientPick {
            id: UserId::new(trimmed),
            display_name: trimmed.to_owned(),
            role: ProfileRole::Unknown,
            source: PickSource::RawId,
        })
    }
}

impl Default for RecipientResolver {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE, 20)
    }
}
