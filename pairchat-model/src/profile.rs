//! Display profiles owned by the identity directory collaborator.

use serde::{Deserialize, Serialize};

use crate::message::UserId;

/// Coarse role tag attached to a directory profile.
///
/// The directory may be backed by more than one table (one per role); the
/// tag records which table a profile came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileRole {
    /// A candidate-side account.
    Candidate,
    /// An admin-side account.
    Admin,
    /// Source table unknown or not role-tagged.
    Unknown,
}

impl std::fmt::Display for ProfileRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Candidate => write!(f, "candidate"),
            Self::Admin => write!(f, "admin"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A user's display profile, looked up by id and never owned by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Directory id; matches message sender/receiver ids.
    pub id: UserId,
    /// Display name.
    pub full_name: String,
    /// Contact email, if the backing table has one.
    pub email: Option<String>,
    /// Avatar image URL, if any.
    pub avatar_url: Option<String>,
    /// Which backing table the profile came from.
    pub role: ProfileRole,
}

impl Profile {
    /// Minimal profile with just an id and a name; handy for tests.
    #[must_use]
    pub fn named(id: impl Into<String>, full_name: impl Into<String>, role: ProfileRole) -> Self {
        Self {
            id: UserId::new(id),
            full_name: full_name.into(),
            email: None,
            avatar_url: None,
            role,
        }
    }

    /// The name to show for this profile: the full name, or the raw id when
    /// the name is blank.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            self.id.as_str()
        } else {
            &self.full_name
        }
    }
}
