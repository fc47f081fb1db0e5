/// Network magic value used in the message header.
///
/// The first 4 bytes of every message identify the network and act as a
/// message boundary marker in the TCP stream: the framer resynchronizes
/// after garbage by scanning for this sequence.
///
/// For mainnet, the magic value is `0xD9B4BEF9` (F9 BE B4 D9 on the wire,
/// little-endian).
///
/// Other network magic values:
/// - Mainnet:  0xD9B4BEF9
/// - Testnet3: 0x0709110B
/// - Regtest:  0xDAB5BFFA
pub const MAIN_NET_MAGIC: u32 = 0xD9B4BEF9;

/// Testnet3 network magic.
pub const TEST_NET_MAGIC: u32 = 0x0709110B;

/// Regtest network magic.
pub const REGTEST_MAGIC: u32 = 0xDAB5BFFA;

/// Protocol version advertised in our outbound `version` message.
///
/// Serialized on the wire as an unsigned 32-bit little-endian integer.
pub const PROTOCOL_VERSION: u32 = 60002;

/// First protocol version whose frames carry a payload checksum.
///
/// Peers at or above this version append a 4-byte checksum (the first 4
/// bytes of the double SHA-256 of the payload) to every message header.
/// Older peers omit the field entirely, so the framer must consult the
/// negotiated receive version before reading it.
pub const CHECKSUM_VERSION: u32 = 209;

/// Unix epoch seconds for 20 Feb 2012 00:00 UTC.
///
/// Clients older than version 209 were obsoleted on this date. After it, a
/// fresh connection assumes checksummed framing in both directions until
/// the handshake says otherwise; before it, framing starts checksum-free.
pub const CHECKSUM_CUTOFF_EPOCH: u64 = 1_329_696_000;

/// Upper bound on a single message payload (32 MiB).
///
/// A declared length above this is treated as a corrupt frame: the frame is
/// discarded and the framer rescans for magic.
pub const MAX_PAYLOAD_SIZE: usize = 32 * 1024 * 1024;

/// Maximum number of entries honored in one `addr` message.
///
/// A peer may declare more; the surplus entries are still read off the wire
/// (so framing stays in sync) but only the first 1000 are kept.
pub const MAX_ADDR_PER_MESSAGE: usize = 1000;

/// Maximum number of inventory vectors in one `inv` or `getdata` message.
pub const MAX_INV_PER_MESSAGE: usize = 50_000;

/// Size of the NUL-padded command field in the message header.
pub const COMMAND_SIZE: usize = 12;
