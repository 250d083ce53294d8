//! Server and per-client configuration.

use std::time::Duration;

use docsync_room::RoomConfig;
use serde::{Deserialize, Serialize};

use crate::gateway::DEFAULT_ROUTE_PREFIX;

/// Timeouts applied to each client's pumps.
///
/// All timeouts are off by default: a client may stay silent forever
/// (awareness pings keep most editors chatty anyway).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Disconnect a client that sends nothing for this long.
    pub read_timeout: Option<Duration>,

    /// Disconnect a client when one frame takes longer than this to
    /// write.
    pub write_timeout: Option<Duration>,

    /// After the read side ends, how long the write pump may keep
    /// flushing queued frames before it is aborted.
    pub drain_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_timeout: None,
            write_timeout: None,
            drain_timeout: Duration::from_secs(5),
        }
    }
}

/// Everything needed to start a server, in one serializable value.
///
/// ```json
/// {
///   "bind": "0.0.0.0:8080",
///   "room": { "echo_to_sender": false },
///   "idle_timeout": { "secs": 600, "nanos": 0 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address.
    pub bind: String,

    /// Path prefix of the upgrade endpoint; the room id follows it.
    pub route_prefix: String,

    /// Settings for every room.
    pub room: RoomConfig,

    /// Settings for every client.
    pub client: ClientConfig,

    /// Evict rooms that have been empty this long. `None` keeps rooms for
    /// the life of the process.
    pub idle_timeout: Option<Duration>,

    /// How often to look for idle rooms when `idle_timeout` is set.
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            route_prefix: DEFAULT_ROUTE_PREFIX.to_string(),
            room: RoomConfig::default(),
            client: ClientConfig::default(),
            idle_timeout: None,
            sweep_interval: Duration::from_secs(60),
        }
    }
}
