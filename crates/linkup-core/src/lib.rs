//! linkup-core — shared types, wire format, and configuration.
//! All other LinkUp crates depend on this one.

pub mod config;
pub mod types;
pub mod wire;

pub use types::{Chat, Comment, MediaType, Message, PeerIdentity, Post, User};
pub use wire::WireMessage;
