//! Error types for peerwire.

use std::io;

use thiserror::Error;

/// Result type alias for peerwire operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for peerwire.
///
/// Only transport failures (`Io`) terminate a connection. Frame and codec
/// errors are logged at the point of detection, the offending frame is
/// discarded, and the stream resumes at the next magic sequence.
#[derive(Error, Debug)]
pub enum Error {
    // Transport errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Frame errors
    #[error("checksum mismatch on `{command}` frame")]
    ChecksumMismatch { command: String },

    #[error("declared payload of {len} bytes exceeds {max}-byte limit")]
    PayloadTooLarge { len: usize, max: usize },

    // Codec errors
    #[error("malformed `{command}` payload: {source}")]
    Malformed { command: String, source: io::Error },

    // Send errors
    #[error("command `{0}` exceeds 12 bytes")]
    CommandTooLong(String),
}
