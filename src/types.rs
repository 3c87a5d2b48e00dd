//! Basic type definitions for the chat relay
//!
//! Provides newtype wrappers for type safety:
//! - `SessionId`: server-assigned integer session identifier
//! - `IdAllocator`: hands out `SessionId`s in acceptance order

use serde::{Deserialize, Serialize};

/// Unique session identifier (newtype pattern)
///
/// Assigned once per accepted connection, starting at 0. The value -1 is
/// reserved for messages originated by the server itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl SessionId {
    /// Sender id carried by server-originated messages
    pub const SERVER: SessionId = SessionId(-1);

    /// Whether this id is the server sentinel
    pub fn is_server(self) -> bool {
        self == Self::SERVER
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic session id source
///
/// Ids are never reused, even after the session they were given to is gone.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: i64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next id
    pub fn next_id(&mut self) -> SessionId {
        let id = SessionId(self.next);
        self.next += 1;
        id
    }
}
