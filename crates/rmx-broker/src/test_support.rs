//! In-memory transports for exercising rooms and connections without sockets.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rmx_core::frame::{self, Frame, FrameTag};
use rmx_core::errors::Result;
use tokio::sync::mpsc;

use crate::connection::Connection;
use crate::room::Room;
use crate::transport::{FrameSink, FrameSource, TransportError};

pub(crate) type TestRoom = Room<String, String>;
pub(crate) type TestConnection = Connection<String, String>;

/// How the write half of a mock transport behaves.
#[derive(Clone, Copy, Debug)]
pub(crate) enum SinkMode {
    Healthy,
    /// Every write fails immediately.
    Broken,
    /// Every write hangs forever.
    Stalled,
    /// Writes succeed; closing takes this long.
    SlowClose(Duration),
}

struct MockSink {
    mode: SinkMode,
    written: mpsc::UnboundedSender<Bytes>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send(&mut self, frame: Bytes) -> std::result::Result<(), TransportError> {
        match self.mode {
            SinkMode::Healthy | SinkMode::SlowClose(_) => self
                .written
                .send(frame)
                .map_err(|_| TransportError::Closed),
            SinkMode::Broken => Err(TransportError::Io("broken pipe".into())),
            SinkMode::Stalled => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> std::result::Result<(), TransportError> {
        if let SinkMode::SlowClose(delay) = self.mode {
            tokio::time::sleep(delay).await;
        }
        let _ = self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockSource {
    inbound: mpsc::UnboundedReceiver<std::result::Result<Bytes, TransportError>>,
}

#[async_trait]
impl FrameSource for MockSource {
    async fn recv(&mut self) -> Option<std::result::Result<Bytes, TransportError>> {
        self.inbound.recv().await
    }
}

/// The remote end of a mock transport.
///
/// Dropping the peer ends the connection's inbound stream.
pub(crate) struct Peer {
    written: mpsc::UnboundedReceiver<Bytes>,
    inbound: mpsc::UnboundedSender<std::result::Result<Bytes, TransportError>>,
    closes: Arc<AtomicUsize>,
}

impl Peer {
    /// Wait for the next frame written to this peer.
    pub(crate) async fn next_frame(&mut self) -> Frame {
        let bytes = tokio::time::timeout(Duration::from_secs(5), self.written.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("sink dropped");
        Frame::decode_bytes(bytes).unwrap()
    }

    /// A frame already written to this peer, if any.
    pub(crate) fn try_next_frame(&mut self) -> Option<Frame> {
        self.written
            .try_recv()
            .ok()
            .map(|bytes| Frame::decode_bytes(bytes).unwrap())
    }

    /// Deliver a frame to the connection's read pump.
    pub(crate) fn send(&self, tag: FrameTag, payload: &[u8]) {
        self.send_raw(frame::encode(tag, payload));
    }

    pub(crate) fn send_raw(&self, bytes: Bytes) {
        let _ = self.inbound.send(Ok(bytes));
    }

    /// Make the connection's next read fail.
    pub(crate) fn fail(&self) {
        let _ = self
            .inbound
            .send(Err(TransportError::Io("connection reset".into())));
    }

    /// How many times the transport was physically closed.
    pub(crate) fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

pub(crate) fn transport(mode: SinkMode) -> (Box<dyn FrameSink>, Box<dyn FrameSource>, Peer) {
    let (written_tx, written_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let closes = Arc::new(AtomicUsize::new(0));
    let sink = MockSink {
        mode,
        written: written_tx,
        closes: closes.clone(),
    };
    let source = MockSource { inbound: inbound_rx };
    let peer = Peer {
        written: written_rx,
        inbound: inbound_tx,
        closes,
    };
    (Box::new(sink), Box::new(source), peer)
}

pub(crate) async fn try_join(
    room: &Arc<TestRoom>,
    name: &str,
    mode: SinkMode,
) -> (Result<Arc<TestConnection>>, Peer) {
    let (sink, source, peer) = transport(mode);
    let admitted = room.admit(name.to_string(), sink, source).await;
    (admitted, peer)
}

pub(crate) async fn join(room: &Arc<TestRoom>, name: &str) -> (Arc<TestConnection>, Peer) {
    let (admitted, peer) = try_join(room, name, SinkMode::Healthy).await;
    (admitted.unwrap(), peer)
}

/// Poll `check` until it holds, failing the test after a bounded wait.
pub(crate) async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
