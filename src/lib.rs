//! Connection engine for a Bitcoin-style P2P network.
//!
//! The crate frames a duplex byte stream into length-prefixed,
//! checksummed messages, decodes the recognized command set into typed
//! values, and runs the `version`/`verack` handshake that decides, per
//! direction and mid-stream, whether frames carry checksums at all.
//!
//! Layering, bottom up:
//!
//! - [`wire`]: framer, codecs, and the outbound frame writer
//! - [`handshake`]: the per-peer negotiation state machine
//! - [`connection`]: one peer session exposed as a stream of events
//!
//! What this crate does **not** do: validate transactions or blocks,
//! discover peers, or persist anything. It parses structure and keeps
//! framing honest; policy lives above it.

pub mod config;
pub mod connection;
pub mod error;
pub mod handshake;
pub mod wire;

pub use config::Config;
pub use connection::{Connection, Event};
pub use error::{Error, Result};
pub use handshake::Handshake;
pub use wire::message::Message;
