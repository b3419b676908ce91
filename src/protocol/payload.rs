//! Typed message payloads
//!
//! Local delivery accepts any [`Message`] kind; the wire only carries the
//! closed set of STR / INT / FLOAT / IMG encodings. `Ext` payloads are
//! local-only and are rejected by the codec.
//!
//! Wire encodings: STR is raw UTF-8, INT is 4-byte big-endian
//! two's-complement, FLOAT is 8-byte big-endian IEEE-754, IMG is an opaque
//! already-compressed blob that the codec does not interpret.

use std::any::Any;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::FrameError;
use crate::protocol::constants::*;

/// A value carried on the bus
///
/// Cloning a message is the per-subscriber copy handed out by `publish`.
/// Every variant is immutable once constructed (owned scalars and strings,
/// reference-counted immutable `Bytes`/`Arc`), so no subscriber can observe
/// another subscriber's in-place mutation through its copy.
#[derive(Clone)]
pub enum Message {
    /// UTF-8 text
    Str(String),
    /// 32-bit signed integer
    Int(i32),
    /// 64-bit IEEE-754 float
    Float(f64),
    /// Opaque pre-encoded binary blob (e.g. a compressed image)
    Img(Bytes),
    /// Arbitrary local-only value; never representable on the wire
    Ext(Arc<dyn Any + Send + Sync>),
}

/// Wire payload kind, matching the TYPE tag of a data frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Str,
    Int,
    Float,
    Img,
}

impl PayloadKind {
    /// The ASCII type tag written into a data frame
    pub fn tag(&self) -> &'static str {
        match self {
            PayloadKind::Str => TAG_STR,
            PayloadKind::Int => TAG_INT,
            PayloadKind::Float => TAG_FLOAT,
            PayloadKind::Img => TAG_IMG,
        }
    }

    /// Parse a type tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            TAG_STR => Some(PayloadKind::Str),
            TAG_INT => Some(PayloadKind::Int),
            TAG_FLOAT => Some(PayloadKind::Float),
            TAG_IMG => Some(PayloadKind::Img),
            _ => None,
        }
    }
}

impl Message {
    /// Wire kind of this message, or `None` for local-only kinds
    pub fn wire_kind(&self) -> Option<PayloadKind> {
        match self {
            Message::Str(_) => Some(PayloadKind::Str),
            Message::Int(_) => Some(PayloadKind::Int),
            Message::Float(_) => Some(PayloadKind::Float),
            Message::Img(_) => Some(PayloadKind::Img),
            Message::Ext(_) => None,
        }
    }

    /// Whether this message can be carried on the wire
    pub fn is_wire_representable(&self) -> bool {
        self.wire_kind().is_some()
    }

    /// Encode the payload bytes of a data frame
    pub fn encode_data(&self) -> Result<Bytes, FrameError> {
        match self {
            Message::Str(s) => Ok(Bytes::copy_from_slice(s.as_bytes())),
            Message::Int(i) => {
                let mut buf = BytesMut::with_capacity(INT_WIDTH);
                buf.put_i32(*i);
                Ok(buf.freeze())
            }
            Message::Float(x) => {
                let mut buf = BytesMut::with_capacity(FLOAT_WIDTH);
                buf.put_f64(*x);
                Ok(buf.freeze())
            }
            Message::Img(blob) => Ok(blob.clone()),
            Message::Ext(_) => Err(FrameError::LocalOnlyPayload),
        }
    }

    /// Decode the payload bytes of a data frame
    pub fn decode_data(kind: PayloadKind, data: &[u8]) -> Result<Self, FrameError> {
        match kind {
            PayloadKind::Str => std::str::from_utf8(data)
                .map(|s| Message::Str(s.to_owned()))
                .map_err(|_| FrameError::BadUtf8),
            PayloadKind::Int => {
                let bytes: [u8; INT_WIDTH] =
                    data.try_into().map_err(|_| FrameError::BadScalarWidth {
                        kind: TAG_INT,
                        expected: INT_WIDTH,
                        actual: data.len(),
                    })?;
                Ok(Message::Int(i32::from_be_bytes(bytes)))
            }
            PayloadKind::Float => {
                let bytes: [u8; FLOAT_WIDTH] =
                    data.try_into().map_err(|_| FrameError::BadScalarWidth {
                        kind: TAG_FLOAT,
                        expected: FLOAT_WIDTH,
                        actual: data.len(),
                    })?;
                Ok(Message::Float(f64::from_be_bytes(bytes)))
            }
            PayloadKind::Img => Ok(Message::Img(Bytes::copy_from_slice(data))),
        }
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Message::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Message::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Message::Img(blob) => write!(f, "Img({} bytes)", blob.len()),
            Message::Ext(_) => write!(f, "Ext(..)"),
        }
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::Str(s.to_owned())
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::Str(s)
    }
}

impl From<i32> for Message {
    fn from(i: i32) -> Self {
        Message::Int(i)
    }
}

impl From<f64> for Message {
    fn from(x: f64) -> Self {
        Message::Float(x)
    }
}

impl From<Bytes> for Message {
    fn from(blob: Bytes) -> Self {
        Message::Img(blob)
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Message::Str(a), Message::Str(b)) => a == b,
            (Message::Int(a), Message::Int(b)) => a == b,
            (Message::Float(a), Message::Float(b)) => a == b,
            (Message::Img(a), Message::Img(b)) => a == b,
            (Message::Ext(a), Message::Ext(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_big_endian() {
        let data = Message::Int(42).encode_data().unwrap();
        assert_eq!(&data[..], &[0x00, 0x00, 0x00, 0x2A]);

        let data = Message::Int(-1).encode_data().unwrap();
        assert_eq!(&data[..], &[0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_float_big_endian() {
        let data = Message::Float(1.0).encode_data().unwrap();
        assert_eq!(&data[..], &[0x3F, 0xF0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_scalar_round_trip() {
        for value in [0, 1, -1, 42, i32::MIN, i32::MAX] {
            let data = Message::Int(value).encode_data().unwrap();
            assert_eq!(
                Message::decode_data(PayloadKind::Int, &data).unwrap(),
                Message::Int(value)
            );
        }

        for value in [0.0, -2.5, f64::MAX, f64::MIN_POSITIVE] {
            let data = Message::Float(value).encode_data().unwrap();
            assert_eq!(
                Message::decode_data(PayloadKind::Float, &data).unwrap(),
                Message::Float(value)
            );
        }
    }

    #[test]
    fn test_str_round_trip() {
        let msg = Message::Str("héllo".to_owned());
        let data = msg.encode_data().unwrap();
        assert_eq!(Message::decode_data(PayloadKind::Str, &data).unwrap(), msg);
    }

    #[test]
    fn test_img_round_trips_byte_for_byte() {
        let blob = Bytes::from_static(&[0x89, b'P', b'N', b'G', 0x00, 0xFF, 0x1B]);
        let msg = Message::Img(blob.clone());
        let data = msg.encode_data().unwrap();
        assert_eq!(&data[..], &blob[..]);
        assert_eq!(Message::decode_data(PayloadKind::Img, &data).unwrap(), msg);
    }

    #[test]
    fn test_ext_is_local_only() {
        let msg = Message::Ext(Arc::new(vec![1u8, 2, 3]));
        assert!(!msg.is_wire_representable());
        assert_eq!(msg.encode_data(), Err(FrameError::LocalOnlyPayload));
    }

    #[test]
    fn test_wrong_scalar_width_rejected() {
        let err = Message::decode_data(PayloadKind::Int, &[0, 0, 42]).unwrap_err();
        assert!(matches!(err, FrameError::BadScalarWidth { actual: 3, .. }));
    }

    #[test]
    fn test_tag_round_trip() {
        for kind in [
            PayloadKind::Str,
            PayloadKind::Int,
            PayloadKind::Float,
            PayloadKind::Img,
        ] {
            assert_eq!(PayloadKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(PayloadKind::from_tag("BOOL"), None);
    }
}
