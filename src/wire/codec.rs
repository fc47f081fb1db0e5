use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::wire::constants::COMMAND_SIZE;

/// Double SHA-256: `SHA256(SHA256(bytes))`.
pub fn double_sha256(bytes: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(Sha256::digest(bytes));
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Frame checksum: the first 4 bytes of the double SHA-256 of the payload.
pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = double_sha256(payload);
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Writes a complete message frame to the given writer.
///
/// ```text
/// +-----------+--------------+---------------+--------------+
/// | magic (4) | command (12) | length (4 LE) | checksum (4) |
/// +-----------+--------------+---------------+--------------+
/// | payload (variable)                                  ... |
/// +----------------------------------------------------------
/// ```
///
/// The checksum field is present only when `with_checksum` is set: frames
/// to a peer that has not negotiated version 209 omit it entirely, so the
/// caller passes its current send-side version gate here.
///
/// # Errors
///
/// Returns [`Error::CommandTooLong`] for a command name over 12 bytes, or
/// an IO error if writing to the underlying stream fails.
pub fn write_frame<W: Write>(
    writer: &mut W,
    magic: u32,
    command: &str,
    payload: &[u8],
    with_checksum: bool,
) -> Result<()> {
    if command.len() > COMMAND_SIZE {
        return Err(Error::CommandTooLong(command.to_string()));
    }

    writer.write_u32::<LittleEndian>(magic)?;

    let mut cmd = [0u8; COMMAND_SIZE];
    cmd[..command.len()].copy_from_slice(command.as_bytes());
    writer.write_all(&cmd)?;

    writer.write_u32::<LittleEndian>(payload.len() as u32)?;

    if with_checksum {
        writer.write_all(&checksum(payload))?;
    }

    writer.write_all(payload)?;

    Ok(())
}
