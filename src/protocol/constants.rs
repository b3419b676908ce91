//! Wire protocol constants
//!
//! The bridge protocol delimits frames with literal ASCII marker sequences.
//! Markers are not escaped: a payload that happens to contain a marker
//! corrupts subsequent framing. This is a known limitation of the wire
//! format, preserved for compatibility; new deployments should prefer
//! length-prefixed framing.

/// Marks the beginning of a frame
pub const START_MARKER: &[u8] = b"$START$";

/// Marks the end of a frame
pub const END_MARKER: &[u8] = b"$END$";

/// Separates fields within a frame body
pub const SPLIT_MARKER: &[u8] = b"$SPLIT$";

/// Body of a connection-close notice
pub const CLOSE_MARKER: &[u8] = b"$CLOSE$";

/// Leading field of a subscription request
pub const SUB_MARKER: &[u8] = b"$SUB$";

/// Type tag for UTF-8 text payloads
pub const TAG_STR: &str = "STR";

/// Type tag for 4-byte big-endian signed integer payloads
pub const TAG_INT: &str = "INT";

/// Type tag for 8-byte big-endian IEEE-754 float payloads
pub const TAG_FLOAT: &str = "FLOAT";

/// Type tag for opaque pre-encoded binary payloads
pub const TAG_IMG: &str = "IMG";

/// Size of the socket receive buffer used by bridge nodes
pub const RECV_BUFFER_SIZE: usize = 4096;

/// Width of an INT payload in bytes
pub const INT_WIDTH: usize = 4;

/// Width of a FLOAT payload in bytes
pub const FLOAT_WIDTH: usize = 8;
