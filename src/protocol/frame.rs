//! Frame encoding and buffered decoding
//!
//! A frame is `START || BODY || END`. BODY is one of:
//!
//! ```text
//! CLOSE                          connection-close notice
//! TYPE SPLIT TOPIC SPLIT DATA    data frame (either direction)
//! SUB SPLIT TOPIC                subscription request (client -> server)
//! ```
//!
//! A stream read may carry several coalesced frames or a partial one. The
//! decoder accumulates reads until the buffer ends in the END marker, then
//! splits on END and decodes each non-empty segment independently. A
//! malformed segment is reported as an error and dropped; decoding resumes
//! with the next segment in the same buffer.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::FrameError;
use crate::protocol::constants::*;
use crate::protocol::payload::{Message, PayloadKind};

/// One decoded wire unit
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Topic-addressed payload
    Data {
        /// Destination topic
        topic: String,
        /// Decoded payload
        message: Message,
    },
    /// Request to receive a topic's traffic on this connection
    Subscribe {
        /// Requested topic
        topic: String,
    },
    /// Connection-close notice; ends the receive loop
    Close,
}

impl Frame {
    /// Encode this frame into its wire bytes
    ///
    /// Fails only for a data frame carrying a local-only payload kind.
    pub fn encode(&self) -> Result<Bytes, FrameError> {
        let mut buf = BytesMut::new();
        buf.put_slice(START_MARKER);

        match self {
            Frame::Close => buf.put_slice(CLOSE_MARKER),
            Frame::Subscribe { topic } => {
                buf.put_slice(SUB_MARKER);
                buf.put_slice(SPLIT_MARKER);
                buf.put_slice(topic.as_bytes());
            }
            Frame::Data { topic, message } => {
                let kind = message.wire_kind().ok_or(FrameError::LocalOnlyPayload)?;
                buf.put_slice(kind.tag().as_bytes());
                buf.put_slice(SPLIT_MARKER);
                buf.put_slice(topic.as_bytes());
                buf.put_slice(SPLIT_MARKER);
                buf.put_slice(&message.encode_data()?);
            }
        }

        buf.put_slice(END_MARKER);
        Ok(buf.freeze())
    }
}

/// Incremental decoder over a marker-framed byte stream
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes currently buffered awaiting a frame boundary
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Feed one read's worth of bytes, returning every frame (or per-segment
    /// error) completed by it
    ///
    /// Nothing is decoded until the accumulated buffer ends in the END
    /// marker; until then the chunk is held for the next read.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<Frame, FrameError>> {
        self.buf.extend_from_slice(chunk);

        if self.buf.len() < END_MARKER.len() || !self.buf.ends_with(END_MARKER) {
            return Vec::new();
        }

        let data = self.buf.split().freeze();
        split_on(&data, END_MARKER)
            .into_iter()
            .filter(|segment| !segment.is_empty())
            .map(decode_segment)
            .collect()
    }
}

/// Decode one END-delimited segment
fn decode_segment(segment: &[u8]) -> Result<Frame, FrameError> {
    let body = segment
        .strip_prefix(START_MARKER)
        .ok_or(FrameError::BadStart)?;

    if body == CLOSE_MARKER {
        return Ok(Frame::Close);
    }

    let fields = split_on(body, SPLIT_MARKER);
    match fields.as_slice() {
        [marker, topic] if *marker == SUB_MARKER => Ok(Frame::Subscribe {
            topic: decode_text(topic)?,
        }),
        [tag, topic, data] => {
            let tag = decode_text(tag)?;
            let kind =
                PayloadKind::from_tag(&tag).ok_or(FrameError::UnknownKind(tag))?;
            Ok(Frame::Data {
                topic: decode_text(topic)?,
                message: Message::decode_data(kind, data)?,
            })
        }
        fields => Err(FrameError::BadShape(fields.len())),
    }
}

fn decode_text(bytes: &[u8]) -> Result<String, FrameError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| FrameError::BadUtf8)
}

/// Split a byte slice on a literal marker sequence
fn split_on<'a>(haystack: &'a [u8], marker: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut rest = haystack;

    while let Some(at) = find(rest, marker) {
        parts.push(&rest[..at]);
        rest = &rest[at + marker.len()..];
    }
    parts.push(rest);
    parts
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
