//! A capacity-bounded jam room.
//!
//! Membership lives behind a single lock so that the capacity check and the
//! insert of an admission are one atomic step. The lock is never held across
//! an `.await`: broadcasts snapshot the member list first and write outside
//! the lock, so a slow member never blocks admission or eviction.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use rmx_core::errors::{JamError, Result};
use rmx_core::frame::{self, FrameTag};
use rmx_core::ids::{ConnectionId, RoomId};
use rmx_core::metadata::{ParticipantInfo, RoomMetadata};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::connection::Connection;
use crate::policy::RoomPolicy;
use crate::telemetry::{
    ADMISSIONS_REJECTED_TOTAL, BROADCAST_FRAMES_TOTAL, CONNECTIONS_ACTIVE,
    CONNECTIONS_ADMITTED_TOTAL, DELIVERY_FAILURES_TOTAL, ROOMS_ACTIVE,
};
use crate::transport::{FrameSink, FrameSource};

/// Live room registry shared between a broker and its rooms.
pub(crate) type Registry<R, P> = DashMap<RoomId, Arc<Room<R, P>>>;

/// Observable room state, derived from membership.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomState {
    /// Fewer than `capacity` members.
    Open,
    /// Exactly `capacity` members.
    Full,
    /// Terminal; admits and relays nothing.
    Closed,
}

/// Point-in-time snapshot of a room.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatus {
    /// Room ID.
    pub id: RoomId,
    /// Member ceiling.
    pub capacity: usize,
    /// Current member count.
    pub members: usize,
    /// Derived state.
    pub state: RoomState,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Outcome of one broadcast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Members the frame was addressed to.
    pub recipients: usize,
    /// Writes that completed.
    pub delivered: usize,
    /// Writes that failed or timed out; each of those members was evicted.
    pub failed: usize,
}

struct Membership<R, P> {
    members: HashMap<ConnectionId, Arc<Connection<R, P>>>,
    closed: bool,
}

/// A jam room: at most `capacity` live connections sharing one broadcast
/// domain.
pub struct Room<R, P> {
    id: RoomId,
    capacity: usize,
    metadata: R,
    policy: RoomPolicy,
    created_at: DateTime<Utc>,
    membership: Mutex<Membership<R, P>>,
    registry: Weak<Registry<R, P>>,
}

impl<R: RoomMetadata, P: ParticipantInfo> Room<R, P> {
    pub(crate) fn new(
        capacity: usize,
        metadata: R,
        policy: RoomPolicy,
        registry: Weak<Registry<R, P>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: RoomId::new(),
            capacity,
            metadata,
            policy,
            created_at: Utc::now(),
            membership: Mutex::new(Membership {
                members: HashMap::with_capacity(capacity.min(64)),
                closed: false,
            }),
            registry,
        })
    }

    /// Room ID.
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Maximum simultaneous members.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Caller-supplied metadata, opaque to the broker.
    pub fn metadata(&self) -> &R {
        &self.metadata
    }

    /// Policy fixed at creation.
    pub fn policy(&self) -> &RoomPolicy {
        &self.policy
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current member count.
    pub fn len(&self) -> usize {
        self.membership.lock().members.len()
    }

    /// Whether the room has no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the room has been closed.
    pub fn is_closed(&self) -> bool {
        self.membership.lock().closed
    }

    /// Derived state.
    pub fn state(&self) -> RoomState {
        let membership = self.membership.lock();
        self.state_of(&membership)
    }

    fn state_of(&self, membership: &Membership<R, P>) -> RoomState {
        if membership.closed {
            RoomState::Closed
        } else if membership.members.len() >= self.capacity {
            RoomState::Full
        } else {
            RoomState::Open
        }
    }

    /// Snapshot for status reporting.
    pub fn status(&self) -> RoomStatus {
        let membership = self.membership.lock();
        RoomStatus {
            id: self.id.clone(),
            capacity: self.capacity,
            members: membership.members.len(),
            state: self.state_of(&membership),
            created_at: self.created_at,
        }
    }

    /// Snapshot of the current members.
    pub fn members(&self) -> Vec<Arc<Connection<R, P>>> {
        self.membership.lock().members.values().cloned().collect()
    }

    /// Look up one member.
    pub fn member(&self, id: &ConnectionId) -> Option<Arc<Connection<R, P>>> {
        self.membership.lock().members.get(id).cloned()
    }

    fn admission_error(&self, membership: &Membership<R, P>) -> Option<JamError> {
        match self.state_of(membership) {
            RoomState::Open => None,
            RoomState::Full => Some(JamError::RoomFull {
                room_id: self.id.clone(),
                capacity: self.capacity,
            }),
            RoomState::Closed => Some(JamError::RoomClosed(self.id.clone())),
        }
    }

    /// Advisory admission check.
    ///
    /// Lets a caller refuse before doing transport work. The answer may be
    /// stale by the time [`admit`](Self::admit) runs, which re-checks.
    pub fn check_admission(&self) -> Result<()> {
        let membership = self.membership.lock();
        self.admission_error(&membership).map_or(Ok(()), Err)
    }

    /// Boolean form of [`check_admission`](Self::check_admission).
    pub fn can_admit(&self) -> bool {
        self.check_admission().is_ok()
    }

    /// Admit a participant over an already-established transport.
    ///
    /// The capacity check and the insert happen under one lock, so
    /// concurrent admissions can never push the room past `capacity`. On
    /// success the connection's read pump starts relaying inbound frames.
    /// On rejection the transport is closed and nothing is registered.
    pub async fn admit(
        self: &Arc<Self>,
        participant: P,
        sink: Box<dyn FrameSink>,
        source: Box<dyn FrameSource>,
    ) -> Result<Arc<Connection<R, P>>> {
        let conn = Arc::new(Connection::new(
            Arc::downgrade(self),
            participant,
            sink,
            self.policy.write_timeout,
        ));

        let rejection = {
            let mut membership = self.membership.lock();
            let rejection = self.admission_error(&membership);
            if rejection.is_none() {
                let _ = membership.members.insert(conn.id().clone(), Arc::clone(&conn));
            }
            rejection
        };

        if let Some(err) = rejection {
            counter!(ADMISSIONS_REJECTED_TOTAL).increment(1);
            debug!(room_id = %self.id, error = %err, "admission refused");
            let _ = conn.close().await;
            return Err(err);
        }

        counter!(CONNECTIONS_ADMITTED_TOTAL).increment(1);
        gauge!(CONNECTIONS_ACTIVE).increment(1.0);
        info!(room_id = %self.id, conn_id = %conn.id(), "participant admitted");
        drop(conn.spawn_read_pump(source, self.policy.read_timeout));
        Ok(conn)
    }

    /// Remove a member. Removing an absent member is a no-op.
    ///
    /// Does not close the member's transport; [`Connection::close`] does
    /// that and calls back here. When the removal empties the room and the
    /// policy asks for it, the room closes itself.
    pub fn remove(&self, id: &ConnectionId) -> bool {
        let mut membership = self.membership.lock();
        if membership.members.remove(id).is_none() {
            return false;
        }
        gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
        debug!(room_id = %self.id, conn_id = %id, remaining = membership.members.len(), "member removed");

        if membership.members.is_empty()
            && self.policy.auto_close_when_empty
            && !membership.closed
        {
            let _ = self.seal(&mut membership);
            info!(room_id = %self.id, "room closed after last member left");
        }
        true
    }

    /// Fan a frame out to every member, excluding the sender when the
    /// policy says so.
    ///
    /// Writes run concurrently and each is bounded by the write timeout. A
    /// member whose write fails is closed and evicted; the rest still
    /// receive the frame. Fails only when the room is closed.
    pub async fn broadcast(
        &self,
        sender: &ConnectionId,
        tag: FrameTag,
        payload: &[u8],
    ) -> Result<BroadcastReport> {
        let recipients: Vec<Arc<Connection<R, P>>> = {
            let membership = self.membership.lock();
            if membership.closed {
                return Err(JamError::RoomClosed(self.id.clone()));
            }
            membership
                .members
                .values()
                .filter(|conn| !(self.policy.exclude_sender && conn.id() == sender))
                .cloned()
                .collect()
        };

        let encoded = frame::encode(tag, payload);
        let results = join_all(
            recipients
                .iter()
                .map(|conn| conn.send_encoded(encoded.clone())),
        )
        .await;

        let mut report = BroadcastReport {
            recipients: recipients.len(),
            ..BroadcastReport::default()
        };
        for (conn, result) in recipients.iter().zip(results) {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    counter!(DELIVERY_FAILURES_TOTAL).increment(1);
                    warn!(room_id = %self.id, conn_id = %conn.id(), error = %e, "delivery failed");
                }
            }
        }

        counter!(BROADCAST_FRAMES_TOTAL).increment(1);
        trace!(
            room_id = %self.id,
            sender = %sender,
            recipients = report.recipients,
            failed = report.failed,
            "frame broadcast"
        );
        Ok(report)
    }

    /// Close the room and every member connection.
    ///
    /// Idempotent: returns `true` only for the call that closed the room.
    pub async fn close(&self) -> bool {
        let evicted = {
            let mut membership = self.membership.lock();
            if membership.closed {
                return false;
            }
            self.seal(&mut membership)
        };

        info!(room_id = %self.id, evicted = evicted.len(), "room closed");
        let _ = join_all(evicted.iter().map(|conn| conn.close())).await;
        true
    }

    /// Mark closed, take every member and drop the room from the registry.
    #[allow(clippy::cast_precision_loss)]
    fn seal(&self, membership: &mut Membership<R, P>) -> Vec<Arc<Connection<R, P>>> {
        membership.closed = true;
        let evicted: Vec<_> = membership.members.drain().map(|(_, conn)| conn).collect();
        if let Some(registry) = self.registry.upgrade() {
            let _ = registry.remove(&self.id);
        }
        gauge!(ROOMS_ACTIVE).decrement(1.0);
        gauge!(CONNECTIONS_ACTIVE).decrement(evicted.len() as f64);
        evicted
    }
}

impl<R, P> std::fmt::Debug for Room<R, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
