//! Room configuration and state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every room a registry creates.
///
/// Missing fields take their default when deserialized, so a config file
/// only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Frames buffered per client before it counts as a slow consumer
    /// and is evicted. Must be at least 1 so the catch-up frame fits.
    pub outbound_capacity: usize,

    /// Commands buffered in the room's inbox. When full, readers wait,
    /// which pushes back on the sending clients.
    pub inbox_capacity: usize,

    /// Whether a frame is also delivered back to the client that sent it.
    pub echo_to_sender: bool,
}

impl RoomConfig {
    /// Returns the config with capacities raised to their minimum of 1.
    pub(crate) fn normalized(mut self) -> Self {
        self.outbound_capacity = self.outbound_capacity.max(1);
        self.inbox_capacity = self.inbox_capacity.max(1);
        self
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            inbox_capacity: 64,
            echo_to_sender: true,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
/// Empty ⇄ Active
/// ```
///
/// - **Empty**: no clients. A new room starts here, and a room returns
///   here when its last client leaves. Only Empty rooms can be evicted.
/// - **Active**: at least one client is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomState {
    Empty,
    Active,
}

impl RoomState {
    /// Derives the state from the number of connected clients.
    pub fn for_client_count(count: usize) -> Self {
        if count == 0 { Self::Empty } else { Self::Active }
    }

    /// Returns `true` if at least one client is connected.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Active => write!(f, "Active"),
        }
    }
}
