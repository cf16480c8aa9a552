//! One participant's live connection.
//!
//! A connection owns its transport. Writes are serialized behind a write
//! lock and bounded by the room's write timeout; reads run on a dedicated
//! read pump that relays every inbound frame through the room. Closing is
//! idempotent and happens exactly once, whichever path triggers it first.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use bytes::Bytes;
use rmx_core::errors::{JamError, Result};
use rmx_core::frame::{self, Frame, FrameTag};
use rmx_core::ids::ConnectionId;
use rmx_core::metadata::{ParticipantInfo, RoomMetadata};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::room::Room;
use crate::transport::{FrameSink, FrameSource, TransportError};

/// Lifecycle of a connection. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Admitted and able to send and receive.
    Active,
    /// Close has started; writes are refused.
    Closing,
    /// Transport released.
    Closed,
}

impl ConnectionState {
    const ACTIVE: u8 = 0;
    const CLOSING: u8 = 1;
    const CLOSED: u8 = 2;

    fn from_u8(value: u8) -> Self {
        match value {
            Self::ACTIVE => Self::Active,
            Self::CLOSING => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// A participant's connection inside a room.
pub struct Connection<R, P> {
    id: ConnectionId,
    participant: P,
    room: Weak<Room<R, P>>,
    /// Write lock: at most one frame is in flight on the transport.
    sink: Mutex<Box<dyn FrameSink>>,
    state: AtomicU8,
    cancel: CancellationToken,
    write_timeout: Duration,
    connected_at: Instant,
}

impl<R: RoomMetadata, P: ParticipantInfo> Connection<R, P> {
    pub(crate) fn new(
        room: Weak<Room<R, P>>,
        participant: P,
        sink: Box<dyn FrameSink>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            participant,
            room,
            sink: Mutex::new(sink),
            state: AtomicU8::new(ConnectionState::ACTIVE),
            cancel: CancellationToken::new(),
            write_timeout,
            connected_at: Instant::now(),
        }
    }

    /// Connection ID, unique within the process.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Participant metadata supplied at admission.
    pub fn participant(&self) -> &P {
        &self.participant
    }

    /// The owning room, unless it has already been dropped.
    pub fn room(&self) -> Option<Arc<Room<R, P>>> {
        self.room.upgrade()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the connection still accepts writes.
    pub fn is_active(&self) -> bool {
        self.state() == ConnectionState::Active
    }

    /// Time since admission.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Encode and write one frame to this participant.
    ///
    /// A failed or timed-out write closes the connection before returning
    /// [`JamError::WriteFailed`].
    pub async fn send(&self, tag: FrameTag, payload: &[u8]) -> Result<()> {
        self.send_encoded(frame::encode(tag, payload)).await
    }

    /// Write an already-built frame.
    pub async fn send_frame(&self, frame: &Frame) -> Result<()> {
        self.send_encoded(frame.encode()).await
    }

    pub(crate) async fn send_encoded(&self, bytes: Bytes) -> Result<()> {
        if !self.is_active() {
            return Err(JamError::ConnectionClosed(self.id.clone()));
        }

        let outcome = {
            let mut sink = self.sink.lock().await;
            // Close may have won the lock race.
            if !self.is_active() {
                return Err(JamError::ConnectionClosed(self.id.clone()));
            }
            tokio::time::timeout(self.write_timeout, sink.send(bytes)).await
        };

        let reason = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "write timed out after {}ms",
                self.write_timeout.as_millis()
            ),
        };
        warn!(conn_id = %self.id, reason = %reason, "write failed, closing connection");
        let _ = self.close().await;
        Err(JamError::WriteFailed {
            connection_id: self.id.clone(),
            reason,
        })
    }

    /// Close the connection.
    ///
    /// Removes it from its room, stops the read pump and releases the
    /// transport. Returns `true` only for the call that performed the close;
    /// every later call is a no-op returning `false`.
    pub async fn close(&self) -> bool {
        if self
            .state
            .compare_exchange(
                ConnectionState::ACTIVE,
                ConnectionState::CLOSING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return false;
        }

        self.cancel.cancel();
        if let Some(room) = self.room.upgrade() {
            let _ = room.remove(&self.id);
        }

        {
            let mut sink = self.sink.lock().await;
            match tokio::time::timeout(self.write_timeout, sink.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(conn_id = %self.id, error = %e, "transport close reported an error"),
                Err(_) => debug!(conn_id = %self.id, "transport close timed out"),
            }
        }

        self.state.store(ConnectionState::CLOSED, Ordering::Release);
        info!(
            conn_id = %self.id,
            age_ms = u64::try_from(self.age().as_millis()).unwrap_or(u64::MAX),
            "connection closed"
        );
        true
    }

    pub(crate) fn spawn_read_pump(
        self: &Arc<Self>,
        source: Box<dyn FrameSource>,
        read_timeout: Option<Duration>,
    ) -> JoinHandle<()> {
        tokio::spawn(read_pump(Arc::clone(self), source, read_timeout))
    }
}

impl<R, P> std::fmt::Debug for Connection<R, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &ConnectionState::from_u8(self.state.load(Ordering::Relaxed)))
            .finish_non_exhaustive()
    }
}

enum Inbound {
    Frame(Bytes),
    Failed(TransportError),
    Eof,
    Idle,
}

async fn next_inbound(source: &mut dyn FrameSource, read_timeout: Option<Duration>) -> Inbound {
    let next = match read_timeout {
        Some(limit) => match tokio::time::timeout(limit, source.recv()).await {
            Ok(next) => next,
            Err(_) => return Inbound::Idle,
        },
        None => source.recv().await,
    };
    match next {
        Some(Ok(bytes)) => Inbound::Frame(bytes),
        Some(Err(e)) => Inbound::Failed(e),
        None => Inbound::Eof,
    }
}

/// Relay inbound frames into the room until the connection ends.
///
/// Each frame's broadcast completes before the next frame is read, so one
/// sender's frames reach every recipient in send order.
async fn read_pump<R: RoomMetadata, P: ParticipantInfo>(
    conn: Arc<Connection<R, P>>,
    mut source: Box<dyn FrameSource>,
    read_timeout: Option<Duration>,
) {
    let reason = loop {
        let inbound = tokio::select! {
            () = conn.cancel.cancelled() => break "closed locally",
            inbound = next_inbound(source.as_mut(), read_timeout) => inbound,
        };

        let bytes = match inbound {
            Inbound::Frame(bytes) => bytes,
            Inbound::Failed(e) => {
                debug!(conn_id = %conn.id, error = %e, "transport read failed");
                break "read error";
            }
            Inbound::Eof => break "peer closed",
            Inbound::Idle => break "read timeout",
        };

        let frame = match Frame::decode_bytes(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(conn_id = %conn.id, error = %e, "invalid inbound frame");
                break "invalid frame";
            }
        };
        if frame.tag == FrameTag::Leave {
            break "leave";
        }

        let Some(room) = conn.room() else {
            break "room dropped";
        };
        trace!(conn_id = %conn.id, tag = frame.tag.as_byte(), len = frame.payload.len(), "inbound frame");
        if let Err(e) = room.broadcast(&conn.id, frame.tag, &frame.payload).await {
            debug!(conn_id = %conn.id, error = %e, "broadcast refused");
            break "room closed";
        }
    };

    debug!(conn_id = %conn.id, reason, "read pump finished");
    let _ = conn.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::RoomPolicy;
    use crate::test_support::{SinkMode, TestRoom, eventually, join, transport, try_join};

    fn room_with(policy: RoomPolicy) -> Arc<TestRoom> {
        Room::new(4, "jam".to_string(), policy, Weak::new())
    }

    fn room() -> Arc<TestRoom> {
        room_with(RoomPolicy::default())
    }

    #[tokio::test]
    async fn send_writes_encoded_frame() {
        let room = room();
        let (conn, mut peer) = join(&room, "alice").await;
        conn.send(FrameTag::Text, b"hello").await.unwrap();
        let frame = peer.next_frame().await;
        assert_eq!(frame.tag, FrameTag::Text);
        assert_eq!(frame.as_text().unwrap(), "hello");
    }

    #[tokio::test]
    async fn send_frame_writes_prebuilt_frame() {
        let room = room();
        let (conn, mut peer) = join(&room, "alice").await;
        conn.send_frame(&Frame::text("riff")).await.unwrap();
        let frame = peer.next_frame().await;
        assert_eq!(frame, Frame::text("riff"));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let room = room();
        let (conn, peer) = join(&room, "alice").await;
        assert!(conn.close().await);
        assert!(!conn.close().await);
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(peer.close_count(), 1);
        assert!(room.is_empty());
    }

    #[tokio::test]
    async fn concurrent_closes_release_transport_once() {
        let room = room();
        let (conn, peer) = join(&room, "alice").await;
        let (a, b, c) = tokio::join!(conn.close(), conn.close(), conn.close());
        assert_eq!([a, b, c].iter().filter(|won| **won).count(), 1);
        assert_eq!(peer.close_count(), 1);
    }

    #[tokio::test]
    async fn send_after_close_is_refused() {
        let room = room();
        let (conn, _peer) = join(&room, "alice").await;
        let _ = conn.close().await;
        let err = conn.send(FrameTag::Text, b"late").await.unwrap_err();
        assert!(matches!(err, JamError::ConnectionClosed(_)));
    }

    #[tokio::test]
    async fn failed_write_closes_connection() {
        let room = room();
        let (admitted, peer) = try_join(&room, "bob", SinkMode::Broken).await;
        let conn = admitted.unwrap();
        let err = conn.send(FrameTag::Text, b"x").await.unwrap_err();
        assert!(matches!(err, JamError::WriteFailed { .. }));
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(peer.close_count(), 1);
        assert!(room.member(conn.id()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_write_times_out() {
        let policy = RoomPolicy {
            write_timeout: Duration::from_millis(50),
            ..RoomPolicy::default()
        };
        let room = room_with(policy);
        let (admitted, _peer) = try_join(&room, "bob", SinkMode::Stalled).await;
        let conn = admitted.unwrap();
        let err = conn.send(FrameTag::Text, b"x").await.unwrap_err();
        match err {
            JamError::WriteFailed { reason, .. } => assert!(reason.contains("timed out")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!conn.is_active());
    }

    #[tokio::test]
    async fn leave_frame_closes_connection() {
        let room = room();
        let (conn, peer) = join(&room, "alice").await;
        peer.send_raw(Frame::leave().encode());
        eventually(|| conn.state() == ConnectionState::Closed).await;
        assert!(room.is_empty());
        assert_eq!(peer.close_count(), 1);
    }

    #[tokio::test]
    async fn empty_frame_closes_connection() {
        let room = room();
        let (conn, peer) = join(&room, "alice").await;
        peer.send_raw(Bytes::new());
        eventually(|| conn.state() == ConnectionState::Closed).await;
        assert!(room.is_empty());
    }

    #[tokio::test]
    async fn read_error_closes_connection() {
        let room = room();
        let (conn, peer) = join(&room, "alice").await;
        peer.fail();
        eventually(|| !conn.is_active()).await;
        eventually(|| room.is_empty()).await;
    }

    #[tokio::test]
    async fn peer_hangup_closes_connection() {
        let room = room();
        let (sink, source, peer) = transport(SinkMode::Healthy);
        let conn = room.admit("alice".to_string(), sink, source).await.unwrap();
        drop(peer);
        eventually(|| conn.state() == ConnectionState::Closed).await;
    }

    #[tokio::test(start_paused = true)]
    async fn idle_reader_times_out() {
        let policy = RoomPolicy {
            read_timeout: Some(Duration::from_secs(30)),
            ..RoomPolicy::default()
        };
        let room = room_with(policy);
        let (conn, _peer) = join(&room, "alice").await;
        tokio::time::sleep(Duration::from_secs(31)).await;
        eventually(|| conn.state() == ConnectionState::Closed).await;
        assert!(room.is_empty());
    }
}
