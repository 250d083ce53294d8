//! Room registry: the single authority that creates and tracks rooms.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use docsync_protocol::encode_seed;
use tokio::sync::Mutex;

use crate::room::spawn_room;
use crate::{ContentProvider, DocumentId, RoomConfig, RoomError, RoomHandle};

/// Maps document ids to running rooms, creating rooms on first use.
///
/// Build one per server and share it behind an `Arc`. Tests build their
/// own, so registries never leak state between them.
///
/// # Locking
///
/// The whole map sits behind one async mutex. [`get_or_create`] holds it
/// across the content lookup, so two connections racing for the same new
/// document can never create two rooms. The cost is that a slow lookup
/// delays room access for everyone; lookups happen once per room.
///
/// [`get_or_create`]: RoomRegistry::get_or_create
pub struct RoomRegistry<P: ContentProvider> {
    provider: P,
    config: RoomConfig,
    rooms: Mutex<HashMap<DocumentId, RoomHandle>>,
}

impl<P: ContentProvider> RoomRegistry<P> {
    /// Creates an empty registry.
    pub fn new(provider: P, config: RoomConfig) -> Self {
        Self {
            provider,
            config,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the content provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Returns the config every new room gets.
    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Returns the room for `room_id`, creating it if needed.
    ///
    /// Creation looks the document up, encodes its text as a seed frame,
    /// and starts the room actor with that frame as its state. If the
    /// lookup fails, nothing is registered and the error is returned.
    pub async fn get_or_create(
        &self,
        room_id: &DocumentId,
    ) -> Result<RoomHandle, RoomError> {
        let mut rooms = self.rooms.lock().await;

        if let Some(handle) = rooms.get(room_id) {
            if !handle.is_closed() {
                return Ok(handle.clone());
            }
            tracing::debug!(%room_id, "replacing stopped room");
            rooms.remove(room_id);
        }

        let document = match self.provider.lookup(room_id).await {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(%room_id, error = %e, "room creation failed");
                return Err(e.into());
            }
        };

        let seed = Bytes::from(encode_seed(&document.text));
        tracing::info!(
            %room_id,
            title = %document.title,
            text_len = document.text.len(),
            "room created"
        );
        let handle = spawn_room(
            room_id.clone(),
            document.title,
            seed,
            self.config.clone(),
        );
        rooms.insert(room_id.clone(), handle.clone());
        Ok(handle)
    }

    /// Returns the room for `room_id` without creating it.
    pub async fn get(&self, room_id: &DocumentId) -> Option<RoomHandle> {
        self.rooms.lock().await.get(room_id).cloned()
    }

    /// Returns the number of registered rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Lists all registered room ids, sorted.
    pub async fn room_ids(&self) -> Vec<DocumentId> {
        let mut ids: Vec<_> = self.rooms.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Shuts down and removes rooms that have had no clients for at
    /// least `max_idle`. Returns how many were removed.
    ///
    /// Each room decides for itself inside its own loop, so a join that
    /// reaches the room first keeps it alive. A client still holding the
    /// handle of an evicted room gets [`RoomError::Unavailable`] on join
    /// and has to reconnect, which creates a fresh room.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        // Ask the rooms without holding the lock: a busy room must not
        // stall `get_or_create` for everyone else.
        let handles: Vec<RoomHandle> =
            self.rooms.lock().await.values().cloned().collect();

        let mut stopped = Vec::new();
        for handle in handles {
            match handle.shutdown_if_idle(max_idle).await {
                Ok(true) | Err(_) => stopped.push(handle),
                Ok(false) => {}
            }
        }

        let mut rooms = self.rooms.lock().await;
        let mut evicted = 0;
        for handle in stopped {
            let room_id = handle.room_id();
            // The entry may already have been replaced by a fresh room.
            if rooms.get(room_id).is_some_and(|current| current.same_room(&handle)) {
                rooms.remove(room_id);
                evicted += 1;
                tracing::info!(%room_id, "idle room evicted");
            }
        }
        evicted
    }

    /// Shuts down every room and clears the registry.
    pub async fn shutdown_all(&self) {
        let mut rooms = self.rooms.lock().await;
        for (room_id, handle) in rooms.drain() {
            if handle.shutdown().await.is_err() {
                tracing::debug!(%room_id, "room already stopped");
            }
        }
    }
}
