//! The room registry.
//!
//! [`Broker`] is the sole owner of the live room set: rooms are created,
//! looked up and torn down only through it. A room that closes itself
//! (auto-close on empty) drops out of the registry in the same step, so a
//! lookup never returns a closed room for long.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use rmx_core::errors::{JamError, Result};
use rmx_core::ids::RoomId;
use rmx_core::metadata::{ParticipantInfo, RoomMetadata};
use tracing::{debug, info, instrument};

use crate::policy::{BrokerConfig, RoomPolicy};
use crate::room::{Registry, Room, RoomStatus};
use crate::telemetry::{ROOMS_ACTIVE, ROOMS_CREATED_TOTAL};

/// Registry of live jam rooms.
pub struct Broker<R, P> {
    rooms: Arc<Registry<R, P>>,
    config: BrokerConfig,
    /// Serializes creation against the room ceiling and against shutdown.
    create_gate: Mutex<()>,
    shutting_down: AtomicBool,
}

impl<R: RoomMetadata, P: ParticipantInfo> Broker<R, P> {
    /// Create an empty broker.
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            rooms: Arc::new(Registry::new()),
            config,
            create_gate: Mutex::new(()),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Create a room with the broker's default policy.
    pub fn create_room(&self, capacity: usize, metadata: R) -> Result<RoomId> {
        self.create_room_with_policy(capacity, metadata, self.config.room_policy.clone())
    }

    /// Create a room with an explicit policy.
    ///
    /// Fails with [`JamError::InvalidCapacity`] for a zero capacity,
    /// [`JamError::TooManyRooms`] when the configured ceiling is reached and
    /// [`JamError::ShuttingDown`] once [`shutdown`](Self::shutdown) has begun.
    pub fn create_room_with_policy(
        &self,
        capacity: usize,
        metadata: R,
        policy: RoomPolicy,
    ) -> Result<RoomId> {
        if capacity == 0 {
            return Err(JamError::invalid_capacity(capacity));
        }

        let _gate = self.create_gate.lock();
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(JamError::ShuttingDown);
        }
        let max_rooms = self.config.max_rooms;
        if max_rooms > 0 && self.rooms.len() >= max_rooms {
            return Err(JamError::TooManyRooms { max_rooms });
        }

        let room = Room::new(capacity, metadata, policy, Arc::downgrade(&self.rooms));
        let id = room.id().clone();
        let _ = self.rooms.insert(id.clone(), room);

        counter!(ROOMS_CREATED_TOTAL).increment(1);
        gauge!(ROOMS_ACTIVE).increment(1.0);
        info!(room_id = %id, capacity, "room created");
        Ok(id)
    }

    /// Look up a live room.
    pub fn get_room(&self, id: &RoomId) -> Result<Arc<Room<R, P>>> {
        self.rooms
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| JamError::RoomNotFound(id.clone()))
    }

    /// Deregister a room and close it with all of its connections.
    ///
    /// Idempotent: returns `false` when no such room is registered.
    pub async fn remove_room(&self, id: &RoomId) -> bool {
        let Some((_, room)) = self.rooms.remove(id) else {
            debug!(room_id = %id, "remove_room: no such room");
            return false;
        };
        let _ = room.close().await;
        true
    }

    /// Snapshot of every live room, oldest first.
    pub fn rooms(&self) -> Vec<Arc<Room<R, P>>> {
        let mut rooms: Vec<_> = self
            .rooms
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        rooms.sort_by_key(|room| room.created_at());
        rooms
    }

    /// Status of every live room, oldest first.
    pub fn list_rooms(&self) -> Vec<RoomStatus> {
        self.rooms().iter().map(|room| room.status()).collect()
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Members across every live room.
    pub fn connection_count(&self) -> usize {
        self.rooms().iter().map(|room| room.len()).sum()
    }

    /// Whether [`shutdown`](Self::shutdown) has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Refuse new rooms, then deregister and close every room and every
    /// connection.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        {
            let _gate = self.create_gate.lock();
            self.shutting_down.store(true, Ordering::Release);
        }

        // No room can be registered past the gate, so one drain empties the registry.
        let ids: Vec<RoomId> = self.rooms.iter().map(|entry| entry.key().clone()).collect();
        let drained: Vec<_> = ids
            .iter()
            .filter_map(|id| self.rooms.remove(id).map(|(_, room)| room))
            .collect();
        let _ = join_all(drained.iter().map(|room| room.close())).await;
        info!(rooms = drained.len(), "broker shut down");
    }
}

impl<R: RoomMetadata, P: ParticipantInfo> Default for Broker<R, P> {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

impl<R, P> std::fmt::Debug for Broker<R, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("rooms", &self.rooms.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
