//! Keeps a live match in sync for one player.
//!
//! [`controller::MatchController`] loads a match once, follows its push
//! stream, joins the player when needed and advances rounds with an
//! optimistic local reset. Storage, navigation, notifications and identity
//! are supplied through the traits in [`collaborators`].

pub mod api;
pub mod bridge;
pub mod collaborators;
pub mod config;
pub mod controller;
pub mod error;
pub mod memory;
pub mod models;
pub mod normalize;
pub mod websocket;

pub use controller::{MatchController, MatchView};
