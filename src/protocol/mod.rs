//! Wire codec for the bridge protocol
//!
//! Frames are delimited by literal ASCII markers with no escaping:
//!
//! ```text
//! $START$ TYPE $SPLIT$ topic $SPLIT$ data $END$    data frame
//! $START$ $SUB$ $SPLIT$ topic $END$                subscription request
//! $START$ $CLOSE$ $END$                            close notice
//! ```
//!
//! See [`frame::FrameDecoder`] for the buffered segmentation and error
//! policy, and [`payload::Message`] for the typed payload encodings.

pub mod constants;
pub mod frame;
pub mod payload;

pub use frame::{Frame, FrameDecoder};
pub use payload::{Message, PayloadKind};
