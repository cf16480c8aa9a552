//! Transport seam between a [`Connection`](crate::Connection) and the byte
//! stream it owns.
//!
//! A transport is split into a write half ([`FrameSink`]) guarded by the
//! connection's write lock, and a read half ([`FrameSource`]) owned by the
//! connection's read pump. Each call carries exactly one encoded frame.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Failure reported by a transport half.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer or the local side already closed the transport.
    #[error("transport closed")]
    Closed,
    /// Any other I/O or protocol failure.
    #[error("transport error: {0}")]
    Io(String),
}

/// Write half of a transport.
#[async_trait]
pub trait FrameSink: Send + 'static {
    /// Write one encoded frame.
    async fn send(&mut self, frame: Bytes) -> Result<(), TransportError>;

    /// Close the transport. Called at most once per connection.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of a transport.
#[async_trait]
pub trait FrameSource: Send + 'static {
    /// Next inbound frame, or `None` once the peer has closed the stream.
    async fn recv(&mut self) -> Option<Result<Bytes, TransportError>>;
}
