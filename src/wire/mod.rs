//! P2P wire protocol primitives.
//!
//! This module provides the low-level machinery to frame, decode, and
//! encode P2P messages:
//!
//! - A resumable byte-stream framer that locates message boundaries by
//!   scanning for the network magic and survives inter-message garbage
//! - Typed decoding of the recognized command set, including the
//!   variable-length integer and transaction codecs
//! - Payload builders and the outbound frame writer
//!
//! Whether a frame carries a checksum is version-negotiated mid-stream;
//! the framer takes the current receive version per frame, and the frame
//! writer takes the send-side gate per call. [`crate::Connection`] wires
//! both to the handshake state machine.
pub mod codec;
pub mod constants;
pub mod decode;
pub mod encode;
pub mod framer;
pub mod message;

pub use codec::{checksum, double_sha256, write_frame};
pub use encode::build_version;
pub use framer::{Frame, Framer};
pub use message::{Command, Decode, Encode, Message};
