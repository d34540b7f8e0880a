//! Data model for the pairchat conversation engine.
//!
//! Contains the persisted [`message::Message`] shape (including the legacy
//! row normalization), the collaborator-owned [`profile::Profile`], and the
//! derived [`conversation::Conversation`] summary. Nothing in this crate
//! talks to a store; it is shared vocabulary for the engine crate.

pub mod conversation;
pub mod message;
pub mod profile;
