//! Shared types for the pokerd hold'em server.
//!
//! This crate contains everything that crosses the wire between the server
//! and remote player agents: cards, actions, rounds, pot views and the
//! framed message protocol. Keeping these in a separate crate lets client
//! agents link against the exact types the server speaks.

// Module declarations
pub mod cards;
pub mod codec;
pub mod game;
pub mod messages;
pub mod player;

// Re-export all public types for easy access
pub use cards::*;
pub use game::*;
pub use messages::*;
pub use player::*;
