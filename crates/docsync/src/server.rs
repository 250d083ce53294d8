//! `SyncServer` builder and accept loop.
//!
//! This is the entry point for running a docsync hub. It ties together
//! all the layers: transport → gateway → registry → rooms → clients.

use std::sync::Arc;
use std::time::Duration;

use docsync_room::{ContentProvider, RoomConfig, RoomRegistry};
use docsync_transport::{TransportError, WebSocketTransport};

use crate::{ClientConfig, ConnectionGateway, DocsyncError, ServerConfig};

/// Shortest accepted idle-sweep period. `tokio::time::interval` panics on
/// zero.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Builder for configuring and starting a sync server.
///
/// # Example
///
/// ```rust,ignore
/// use docsync::prelude::*;
///
/// let server = SyncServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(DirectoryContentProvider::new("./share"))
///     .await?;
/// server.run().await
/// ```
pub struct SyncServerBuilder {
    bind_addr: String,
    route_prefix: String,
    room_config: RoomConfig,
    client_config: ClientConfig,
    idle_timeout: Option<Duration>,
    sweep_interval: Duration,
}

impl SyncServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(ServerConfig::default())
    }

    /// Creates a builder from a loaded [`ServerConfig`].
    pub fn from_config(config: ServerConfig) -> Self {
        Self {
            bind_addr: config.bind,
            route_prefix: config.route_prefix,
            room_config: config.room,
            client_config: config.client,
            idle_timeout: config.idle_timeout,
            sweep_interval: config.sweep_interval.max(MIN_SWEEP_INTERVAL),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the upgrade path prefix (default [`DEFAULT_ROUTE_PREFIX`](crate::DEFAULT_ROUTE_PREFIX)).
    pub fn route_prefix(mut self, prefix: &str) -> Self {
        self.route_prefix = prefix.to_string();
        self
    }

    /// Sets the configuration of every room.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets the per-client timeouts.
    pub fn client_config(mut self, config: ClientConfig) -> Self {
        self.client_config = config;
        self
    }

    /// Evicts rooms that have been empty for `timeout`.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Sets how often idle rooms are looked for. Zero is raised to the
    /// shortest supported period.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval.max(MIN_SWEEP_INTERVAL);
        self
    }

    /// Binds the listener and builds the server around `provider`.
    pub async fn build<P: ContentProvider>(
        self,
        provider: P,
    ) -> Result<SyncServer<P>, DocsyncError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let registry = Arc::new(RoomRegistry::new(provider, self.room_config));
        let gateway = Arc::new(ConnectionGateway::new(
            Arc::clone(&registry),
            self.route_prefix,
            self.client_config,
        ));

        Ok(SyncServer {
            transport,
            gateway,
            idle_timeout: self.idle_timeout,
            sweep_interval: self.sweep_interval,
        })
    }
}

impl Default for SyncServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound sync server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct SyncServer<P: ContentProvider> {
    transport: WebSocketTransport,
    gateway: Arc<ConnectionGateway<P>>,
    idle_timeout: Option<Duration>,
    sweep_interval: Duration,
}

impl<P: ContentProvider> SyncServer<P> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns the room registry, for inspection.
    pub fn registry(&self) -> Arc<RoomRegistry<P>> {
        Arc::clone(self.gateway.registry())
    }

    /// Runs the server accept loop.
    ///
    /// Each accepted connection is upgraded and served on its own task, so
    /// a slow handshake never holds up the next accept. Runs until the
    /// process is terminated.
    pub async fn run(self) -> Result<(), DocsyncError> {
        tracing::info!(
            addr = ?self.transport.local_addr().ok(),
            idle_timeout = ?self.idle_timeout,
            "docsync server running"
        );

        if let Some(timeout) = self.idle_timeout {
            tokio::spawn(sweep_idle_rooms(
                self.registry(),
                timeout,
                self.sweep_interval,
            ));
        }

        loop {
            match self.transport.accept().await {
                Ok(incoming) => {
                    let gateway = Arc::clone(&self.gateway);
                    tokio::spawn(async move {
                        match gateway.handle(incoming).await {
                            Ok(()) => {}
                            Err(DocsyncError::Transport(
                                TransportError::Rejected { status, reason },
                            )) => {
                                tracing::debug!(status, %reason, "upgrade rejected");
                            }
                            Err(e) => {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Periodically evicts rooms that have been empty for `timeout`.
async fn sweep_idle_rooms<P: ContentProvider>(
    registry: Arc<RoomRegistry<P>>,
    timeout: Duration,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let evicted = registry.evict_idle(timeout).await;
        if evicted > 0 {
            tracing::info!(evicted, "evicted idle rooms");
        }
    }
}

#[cfg(test)]
mod tests {
    use docsync_room::MemoryContentProvider;

    use super::*;

    #[test]
    fn test_zero_sweep_interval_is_clamped() {
        let builder = SyncServerBuilder::new().sweep_interval(Duration::ZERO);
        assert_eq!(builder.sweep_interval, MIN_SWEEP_INTERVAL);

        let config = ServerConfig {
            sweep_interval: Duration::ZERO,
            ..ServerConfig::default()
        };
        let builder = SyncServerBuilder::from_config(config);
        assert_eq!(builder.sweep_interval, MIN_SWEEP_INTERVAL);
    }

    #[tokio::test]
    async fn test_zero_sweep_interval_still_evicts_idle_rooms() {
        let config: ServerConfig = serde_json::from_str(
            r#"{
                "bind": "127.0.0.1:0",
                "idle_timeout": { "secs": 0, "nanos": 0 },
                "sweep_interval": { "secs": 0, "nanos": 0 }
            }"#,
        )
        .unwrap();
        let provider = MemoryContentProvider::new().with_document(
            docsync_room::DocumentId::parse("doc-42").unwrap(),
            docsync_room::Document::new("Title", "text"),
        );
        let server = SyncServerBuilder::from_config(config)
            .build(provider)
            .await
            .unwrap();
        let registry = server.registry();
        let id = docsync_room::DocumentId::parse("doc-42").unwrap();
        registry.get_or_create(&id).await.unwrap();

        tokio::spawn(server.run());

        let mut remaining = registry.room_count().await;
        for _ in 0..100 {
            if remaining == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            remaining = registry.room_count().await;
        }
        assert_eq!(remaining, 0);
    }
}
