//! Identity directory: resolving user ids to display profiles.
//!
//! The directory is a collaborator; the engine never owns profile data.
//! Historically the profile data lives in more than one table (one per
//! role), so [`MultiSourceDirectory`] merges several backends behind the
//! single [`IdentityDirectory`] seam, de-duplicating by id with the first
//! source winning.

use std::collections::HashMap;
use std::future::Future;

use pairchat_model::message::UserId;
use pairchat_model::profile::Profile;

/// Errors that can occur during directory lookups.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The directory backend is unreachable.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// A lookup or search query failed.
    #[error("directory query failed: {0}")]
    QueryFailed(String),
}

/// Collaborator contract for profile resolution.
pub trait IdentityDirectory: Send + Sync {
    /// Resolves a batch of ids in one call. Ids with no profile are simply
    /// absent from the returned map — callers degrade to showing the raw
    /// id, they do not treat a miss as an error.
    fn lookup_by_ids(
        &self,
        ids: &[UserId],
    ) -> impl Future<Output = Result<HashMap<UserId, Profile>, DirectoryError>> + Send;

    /// Case-insensitive partial name search.
    fn search_by_name(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<Profile>, DirectoryError>> + Send;
}

/// In-memory directory backed by a fixed profile list.
///
/// The test/fixture implementation, with failure injection for exercising
/// the engine's degraded-lookup path.
pub struct StaticDirectory {
    profiles: parking_lot::RwLock<Vec<Profile>>,
    failing: std::sync::atomic::AtomicBool,
}

impl StaticDirectory {
    /// Creates a directory over the given profiles.
    #[must_use]
    pub fn new(profiles: Vec<Profile>) -> Self {
        Self {
            profiles: parking_lot::RwLock::new(profiles),
            failing: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Creates an empty directory.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Adds a profile after construction.
    pub fn add(&self, profile: Profile) {
        self.profiles.write().push(profile);
    }

    /// Makes every subsequent call fail, until reset.
    pub fn set_failing(&self, fail: bool) {
        self.failing
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), DirectoryError> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            Err(DirectoryError::Unavailable("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

impl IdentityDirectory for StaticDirectory {
    async fn lookup_by_ids(
        &self,
        ids: &[UserId],
    ) -> Result<HashMap<UserId, Profile>, DirectoryError> {
        self.check()?;
        let profiles = self.profiles.read();
        Ok(profiles
            .iter()
            .filter(|p| ids.contains(&p.id))
            .map(|p| (p.id.clone(), p.clone()))
            .collect())
    }

    async fn search_by_name(&self, query: &str) -> Result<Vec<Profile>, DirectoryError> {
        self.check()?;
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let profiles = self.profiles.read();
        Ok(profiles
            .iter()
            .filter(|p| p.full_name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }
}

/// Merges several directory backends behind one seam.
///
/// Lookups are tolerant: a failing source is logged and skipped, and the
/// call only fails when every source failed. Duplicate ids across sources
/// resolve to the first source's profile.
pub struct MultiSourceDirectory<S> {
    sources: Vec<S>,
}

impl<S: IdentityDirectory> MultiSourceDirectory<S> {
    /// Creates a merged directory; source order decides duplicate wins.
    #[must_use]
    pub fn new(sources: Vec<S>) -> Self {
        Self { sources }
    }
}

impl<S: IdentityDirectory> IdentityDirectory for MultiSourceDirectory<S> {
    async fn lookup_by_ids(
        &self,
        ids: &[UserId],
    ) -> Result<HashMap<UserId, Profile>, DirectoryError> {
        let mut merged: HashMap<UserId, Profile> = HashMap::new();
        let mut last_err = None;
        let mut any_ok = self.sources.is_empty();

        for (idx, source) in self.sources.iter().enumerate() {
            match source.lookup_by_ids(ids).await {
                Ok(found) => {
                    any_ok = true;
                    for (id, profile) in found {
                        merged.entry(id).or_insert(profile);
                    }
                }
                Err(e) => {
                    tracing::warn!(source = idx, error = %e, "directory source lookup failed");
                    last_err = Some(e);
                }
            }
        }

        match (any_ok, last_err) {
            (false, Some(e)) => Err(e),
            _ => Ok(merged),
        }
    }

    async fn search_by_name(&self, query: &str) -> Result<Vec<Profile>, DirectoryError> {
        let mut merged: Vec<Profile> = Vec::new();
        let mut last_err = None;
        let mut any_ok = self.sources.is_empty();

        for (idx, source) in self.sources.iter().enumerate() {
            match source.search_by_name(query).await {
                Ok(found) => {
                    any_ok = true;
                    for profile in found {
                        if !merged.iter().any(|p| p.id == profile.id) {
                            merged.push(profile);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(source = idx, error = %e, "directory source search failed");
                    last_err = Some(e);
                }
            }
        }

        match (any_ok, last_err) {
            (false, Some(e)) => Err(e),
            _ => Ok(merged),
        }
    }
}
