//! Crate error types
//!
//! Errors are grouped by the layer that produces them: `FrameError` for the
//! wire codec, `NodeError` for the node runtime, and `BusError` as the
//! crate-level aggregate returned by public fallible operations.

/// Result type alias for bus operations
pub type Result<T> = std::result::Result<T, BusError>;

/// Error type for frame encoding and decoding
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Segment does not begin with the start marker
    BadStart,
    /// Body does not split into a recognized field count
    BadShape(usize),
    /// Unknown payload type tag
    UnknownKind(String),
    /// Topic or STR payload is not valid UTF-8
    BadUtf8,
    /// INT/FLOAT payload has the wrong byte width
    BadScalarWidth {
        /// The type tag of the payload
        kind: &'static str,
        /// Expected width in bytes
        expected: usize,
        /// Actual width in bytes
        actual: usize,
    },
    /// Payload kind has no wire representation (local-only message)
    LocalOnlyPayload,
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::BadStart => write!(f, "Segment missing start marker"),
            FrameError::BadShape(n) => write!(f, "Unrecognized body shape: {} fields", n),
            FrameError::UnknownKind(tag) => write!(f, "Unknown payload type tag: {}", tag),
            FrameError::BadUtf8 => write!(f, "Invalid UTF-8 in topic or STR payload"),
            FrameError::BadScalarWidth {
                kind,
                expected,
                actual,
            } => write!(
                f,
                "{} payload must be {} bytes, got {}",
                kind, expected, actual
            ),
            FrameError::LocalOnlyPayload => {
                write!(f, "Message kind has no wire representation")
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// Error type for node runtime operations
#[derive(Debug)]
pub enum NodeError {
    /// The loop builder was given zero or more than one termination mode
    LoopModeSelection(usize),
    /// Node `run` failed with a node-specific error
    Run(Box<dyn std::error::Error + Send + Sync>),
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeError::LoopModeSelection(n) => write!(
                f,
                "Loop plan requires exactly one termination mode, {} selected",
                n
            ),
            NodeError::Run(e) => write!(f, "Node run failed: {}", e),
        }
    }
}

impl std::error::Error for NodeError {}

/// Crate-level error
#[derive(Debug)]
pub enum BusError {
    /// Wire codec error
    Frame(FrameError),
    /// Node runtime error
    Node(NodeError),
    /// No constructor registered for a node kind
    UnknownNodeKind(String),
    /// Underlying I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for BusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusError::Frame(e) => write!(f, "Frame error: {}", e),
            BusError::Node(e) => write!(f, "Node error: {}", e),
            BusError::UnknownNodeKind(kind) => {
                write!(f, "No node constructor registered for kind: {}", kind)
            }
            BusError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for BusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BusError::Frame(e) => Some(e),
            BusError::Node(e) => Some(e),
            BusError::UnknownNodeKind(_) => None,
            BusError::Io(e) => Some(e),
        }
    }
}

impl From<FrameError> for BusError {
    fn from(e: FrameError) -> Self {
        BusError::Frame(e)
    }
}

impl From<NodeError> for BusError {
    fn from(e: NodeError) -> Self {
        BusError::Node(e)
    }
}

impl From<std::io::Error> for BusError {
    fn from(e: std::io::Error) -> Self {
        BusError::Io(e)
    }
}
