//! Player identity as assigned by the server at connection time.

use serde::{Deserialize, Serialize};

/// Unique identifier for a player within a session. Assigned once at
/// connection time and never recycled; hand logs present the zero-based
/// offset, which is a rendering concern only.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayerId(pub usize);

impl From<usize> for PlayerId {
    fn from(v: usize) -> Self {
        PlayerId(v)
    }
}

impl From<PlayerId> for usize {
    fn from(player_id: PlayerId) -> Self {
        player_id.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
