//! Wire frame codec.
//!
//! A frame is one leading tag byte followed by an opaque payload of any
//! length, including zero:
//!
//! ```text
//! +-----+---------------------+
//! | tag | payload (0..n bytes)|
//! +-----+---------------------+
//! ```
//!
//! Tags the broker understands are [`FrameTag::Text`],
//! [`FrameTag::StructuredData`] and [`FrameTag::Leave`]. Any other tag value
//! is carried through untouched as [`FrameTag::Other`]; deciding what it
//! means is up to the receiving client.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors produced while decoding or interpreting a frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The input had no tag byte.
    #[error("frame is empty")]
    Empty,
    /// A text payload was not valid UTF-8.
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    /// A structured payload could not be (de)serialized.
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Message type carried in the first byte of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameTag {
    /// Plain UTF-8 text.
    Text,
    /// Arbitrary structured payload, typically serialized JSON.
    StructuredData,
    /// Participant-initiated departure.
    Leave,
    /// A tag value this codec does not recognize.
    ///
    /// Only ever holds values outside the recognized range; use
    /// [`FrameTag::from_byte`] rather than constructing it directly.
    Other(u8),
}

impl FrameTag {
    /// Wire value of [`FrameTag::Text`].
    pub const TEXT: u8 = 1;
    /// Wire value of [`FrameTag::StructuredData`].
    pub const STRUCTURED_DATA: u8 = 2;
    /// Wire value of [`FrameTag::Leave`].
    pub const LEAVE: u8 = 3;

    /// Map a wire byte to its tag.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            Self::TEXT => Self::Text,
            Self::STRUCTURED_DATA => Self::StructuredData,
            Self::LEAVE => Self::Leave,
            other => Self::Other(other),
        }
    }

    /// The wire byte for this tag.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Text => Self::TEXT,
            Self::StructuredData => Self::STRUCTURED_DATA,
            Self::Leave => Self::LEAVE,
            Self::Other(byte) => byte,
        }
    }

    /// Whether this tag is one the broker interprets.
    pub fn is_known(self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<u8> for FrameTag {
    fn from(byte: u8) -> Self {
        Self::from_byte(byte)
    }
}

impl From<FrameTag> for u8 {
    fn from(tag: FrameTag) -> Self {
        tag.as_byte()
    }
}

/// One decoded wire message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Message type.
    pub tag: FrameTag,
    /// Everything after the tag byte.
    pub payload: Bytes,
}

impl Frame {
    /// Build a frame from a tag and payload.
    pub fn new(tag: FrameTag, payload: impl Into<Bytes>) -> Self {
        Self {
            tag,
            payload: payload.into(),
        }
    }

    /// A text frame.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(FrameTag::Text, text.into())
    }

    /// A structured-data frame holding `value` serialized as JSON.
    pub fn structured<T: Serialize>(value: &T) -> Result<Self, FrameError> {
        let payload = serde_json::to_vec(value)?;
        Ok(Self::new(FrameTag::StructuredData, payload))
    }

    /// An empty leave frame.
    pub fn leave() -> Self {
        Self::new(FrameTag::Leave, Bytes::new())
    }

    /// Decode a frame, copying the payload out of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let (&tag, payload) = bytes.split_first().ok_or(FrameError::Empty)?;
        Ok(Self::new(FrameTag::from_byte(tag), Bytes::copy_from_slice(payload)))
    }

    /// Decode a frame without copying: the payload shares `bytes`' buffer.
    pub fn decode_bytes(mut bytes: Bytes) -> Result<Self, FrameError> {
        let Some(&tag) = bytes.first() else {
            return Err(FrameError::Empty);
        };
        let payload = bytes.split_off(1);
        Ok(Self::new(FrameTag::from_byte(tag), payload))
    }

    /// Encode to `[tag] + payload`.
    pub fn encode(&self) -> Bytes {
        encode(self.tag, &self.payload)
    }

    /// Encoded length: one tag byte plus the payload.
    pub fn encoded_len(&self) -> usize {
        1 + self.payload.len()
    }

    /// Borrow the payload as UTF-8 text.
    pub fn as_text(&self) -> Result<&str, FrameError> {
        Ok(std::str::from_utf8(&self.payload)?)
    }

    /// Deserialize the payload as JSON.
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, FrameError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// Encode a tag and payload into a single buffer of `1 + payload.len()` bytes.
pub fn encode(tag: FrameTag, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + payload.len());
    buf.put_u8(tag.as_byte());
    buf.put_slice(payload);
    buf.freeze()
}

/// Split raw bytes into `(tag, payload)`. Empty input is rejected.
pub fn decode(bytes: &[u8]) -> Result<(FrameTag, Bytes), FrameError> {
    let frame = Frame::decode(bytes)?;
    Ok((frame.tag, frame.payload))
}
