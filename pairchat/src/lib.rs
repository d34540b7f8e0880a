//! Pairchat — pairwise conversation and live messaging engine.
//!
//! Turns a flat, directed message log into per-pair threads with live
//! delivery, unread tracking, and a multi-conversation inbox. Persistence,
//! identity, and authentication are injected collaborators; see
//! [`store::MessageStore`], [`directory::IdentityDirectory`], and
//! [`auth::AuthContext`]. The [`session::Session`] orchestrator ties the
//! core components together for an embedding UI.

pub mod auth;
pub mod composer;
pub mod config;
pub mod directory;
pub mod error;
pub mod index;
pub mod logging;
pub mod read_state;
pub mod resolver;
pub mod session;
pub mod store;
pub mod thread;

pub use pairchat_model as model;
