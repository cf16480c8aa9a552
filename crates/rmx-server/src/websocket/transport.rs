//! [`FrameSink`] / [`FrameSource`] over an axum `WebSocket`.
//!
//! Each frame travels as one binary message. Text messages are accepted as
//! their UTF-8 bytes, ping and pong are absorbed, and a close message ends
//! the stream.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use rmx_broker::{FrameSink, FrameSource, TransportError};
use tracing::trace;

/// Write half of a split `WebSocket`.
pub struct WsSink {
    inner: SplitSink<WebSocket, Message>,
}

impl WsSink {
    /// Wrap the write half.
    pub fn new(inner: SplitSink<WebSocket, Message>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: Bytes) -> Result<(), TransportError> {
        self.inner
            .send(Message::Binary(frame))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        // The peer may already be gone; the close frame is best effort.
        let _ = self.inner.send(Message::Close(None)).await;
        self.inner
            .close()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }
}

/// Read half of a split `WebSocket`.
pub struct WsSource {
    inner: SplitStream<WebSocket>,
}

impl WsSource {
    /// Wrap the read half.
    pub fn new(inner: SplitStream<WebSocket>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl FrameSource for WsSource {
    async fn recv(&mut self) -> Option<Result<Bytes, TransportError>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Binary(data)) => return Some(Ok(data)),
                Ok(Message::Text(text)) => {
                    return Some(Ok(Bytes::copy_from_slice(text.as_str().as_bytes())));
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => trace!("control frame"),
                Ok(Message::Close(_)) => return None,
                Err(e) => return Some(Err(TransportError::Io(e.to_string()))),
            }
        }
    }
}
