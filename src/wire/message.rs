use std::fmt::{Debug, Formatter, Result};
use std::io::{self};

use sha2::{Digest, Sha256};

use crate::wire::constants::COMMAND_SIZE;
use crate::wire::framer::Frame;

/// Implemented by types that can be decoded from a raw message payload.
pub trait Decode: Sized {
    fn decode(payload: &[u8]) -> io::Result<Self>;
}

/// Implemented by types that can be serialized back into payload bytes.
///
/// `encode_into` appends to the given buffer; `encode` is a convenience
/// wrapper that allocates a fresh one.
pub trait Encode {
    fn encode_into(&self, out: &mut Vec<u8>);

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }
}

/// The recognized P2P commands.
///
/// Anything else arriving on the wire maps to [`Command::Unknown`] and is
/// dropped by the codec without terminating the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    // Handshake / control
    Version,
    Verack,
    Ping,
    GetAddr,
    Addr,
    // Data
    Inv,
    GetData,
    GetBlocks,
    Block,
    Tx,

    Unknown,
}

impl Command {
    pub fn from_name(name: &str) -> Self {
        match name {
            "version" => Command::Version,
            "verack" => Command::Verack,
            "ping" => Command::Ping,
            "getaddr" => Command::GetAddr,
            "addr" => Command::Addr,
            "inv" => Command::Inv,
            "getdata" => Command::GetData,
            "getblocks" => Command::GetBlocks,
            "block" => Command::Block,
            "tx" => Command::Tx,
            _ => Command::Unknown,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Version => "version",
            Command::Verack => "verack",
            Command::Ping => "ping",
            Command::GetAddr => "getaddr",
            Command::Addr => "addr",
            Command::Inv => "inv",
            Command::GetData => "getdata",
            Command::GetBlocks => "getblocks",
            Command::Block => "block",
            Command::Tx => "tx",
            Command::Unknown => "",
        }
    }

    /// Returns the 12-byte command field as it appears in the header.
    ///
    /// The command string is ASCII and padded with zero bytes on the right.
    pub fn as_bytes(&self) -> [u8; COMMAND_SIZE] {
        let name = self.name().as_bytes();
        let mut padded = [0u8; COMMAND_SIZE];
        padded[..name.len()].copy_from_slice(name);
        padded
    }

    /// Decodes a raw 12-byte command field into its name: NUL padding
    /// stripped, non-ASCII bytes yielding an empty (unrecognizable) name.
    pub fn parse_field(bytes: &[u8; COMMAND_SIZE]) -> &str {
        std::str::from_utf8(bytes)
            .unwrap_or("")
            .trim_matches(char::from(0))
    }
}

/// A decoded inbound message.
///
/// Each variant corresponds to one recognized protocol command. Commands
/// outside the recognized set land in [`Message::Unknown`], which carries
/// the raw command name for diagnostics; the connection drops it without
/// emitting an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Version(VersionMessage),
    Verack,
    Ping,
    GetAddr,
    Addr(Vec<AddrEntry>),
    Inv(Vec<InvVect>),
    GetData(Vec<InvVect>),
    GetBlocks(GetBlocksMessage),
    Block(Block),
    Tx(Transaction),

    Unknown { command: String, payload: Vec<u8> },
}

impl Message {
    /// The command this message travels under.
    pub fn command(&self) -> Command {
        match self {
            Message::Version(_) => Command::Version,
            Message::Verack => Command::Verack,
            Message::Ping => Command::Ping,
            Message::GetAddr => Command::GetAddr,
            Message::Addr(_) => Command::Addr,
            Message::Inv(_) => Command::Inv,
            Message::GetData(_) => Command::GetData,
            Message::GetBlocks(_) => Command::GetBlocks,
            Message::Block(_) => Command::Block,
            Message::Tx(_) => Command::Tx,
            Message::Unknown { .. } => Command::Unknown,
        }
    }
}

impl TryFrom<Frame> for Message {
    type Error = io::Error;

    fn try_from(frame: Frame) -> io::Result<Self> {
        match Command::from_name(&frame.command) {
            Command::Version => Ok(Message::Version(VersionMessage::decode(&frame.payload)?)),
            Command::Verack => Ok(Message::Verack),
            Command::Ping => Ok(Message::Ping),
            Command::GetAddr => Ok(Message::GetAddr),
            Command::Addr => Ok(Message::Addr(Vec::<AddrEntry>::decode(&frame.payload)?)),
            Command::Inv => Ok(Message::Inv(Vec::<InvVect>::decode(&frame.payload)?)),
            Command::GetData => Ok(Message::GetData(Vec::<InvVect>::decode(&frame.payload)?)),
            Command::GetBlocks => Ok(Message::GetBlocks(GetBlocksMessage::decode(
                &frame.payload,
            )?)),
            Command::Block => Ok(Message::Block(Block::decode(&frame.payload)?)),
            Command::Tx => Ok(Message::Tx(Transaction::decode(&frame.payload)?)),
            Command::Unknown => Ok(Message::Unknown {
                command: frame.command,
                payload: frame.payload,
            }),
        }
    }
}

/// Decoded `version` payload.
///
/// Layout on the wire (all little-endian):
///
/// ```text
/// uint32   version
/// uint64   services
/// uint64   timestamp
/// 26 bytes addr_me
/// 26 bytes addr_you
/// uint64   nonce
/// cstring  sub_version  (bytes up to and including a NUL terminator)
/// uint32   start_height
/// ```
///
/// The two address fields are kept as raw bytes: this layer does not route,
/// it only frames and negotiates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMessage {
    pub version: u32,
    pub services: Services,
    pub timestamp: u64,
    pub addr_me: [u8; 26],
    pub addr_you: [u8; 26],
    pub nonce: u64,
    /// Sub-version string, stored without its wire NUL terminator.
    pub sub_version: String,
    pub start_height: u32,
}

/// One inventory vector from an `inv`, `getdata`, or `getblocks` exchange.
///
/// `kind` is kept as the raw wire value so that unrecognized types pass
/// through undisturbed; [`InvType`] names the assigned ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvVect {
    pub kind: u32,
    pub hash: [u8; 32],
}

impl InvVect {
    pub fn tx(hash: [u8; 32]) -> Self {
        Self {
            kind: InvType::Tx as u32,
            hash,
        }
    }

    pub fn block(hash: [u8; 32]) -> Self {
        Self {
            kind: InvType::Block as u32,
            hash,
        }
    }
}

/// Assigned inventory object types.
///
/// Serialized as little-endian 32-bit unsigned integers.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvType {
    /// Error / undefined type.
    Error = 0,
    /// Transaction.
    Tx = 1,
    /// Full block.
    Block = 2,
}

/// Decoded `getblocks` payload: a block locator plus a stop hash.
///
/// The peer finds the first locator hash it recognizes in its active chain
/// and responds with inventory after that point, stopping at `stop` (or
/// after its per-message limit). An all-zero `stop` means "no stop".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetBlocksMessage {
    pub version: u32,
    pub locator: Vec<[u8; 32]>,
    pub stop: [u8; 32],
}

/// One entry of an `addr` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrEntry {
    pub time: u32,
    pub services: Services,
    /// 16-byte IP field exactly as transmitted.
    pub ip: [u8; 16],
    /// Port, big-endian on the wire.
    pub port: u16,
}

impl AddrEntry {
    /// Interprets the raw 16-byte IP field.
    ///
    /// IPv4 addresses appear either as standard `::ffff:x.x.x.x` mappings
    /// or, from some older peers, behind 12 zero bytes. Everything else is
    /// taken as native IPv6.
    pub fn ip_addr(&self) -> std::net::IpAddr {
        let v4_mapped = self.ip[..10] == [0u8; 10] && self.ip[10] == 0xFF && self.ip[11] == 0xFF;
        let v4_legacy = self.ip[..12] == [0u8; 12];
        if v4_mapped || v4_legacy {
            std::net::IpAddr::V4(std::net::Ipv4Addr::new(
                self.ip[12],
                self.ip[13],
                self.ip[14],
                self.ip[15],
            ))
        } else {
            std::net::IpAddr::V6(std::net::Ipv6Addr::from(self.ip))
        }
    }
}

/// One transaction input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    /// Previous output reference: 32-byte txid + 4-byte index, unparsed.
    pub outpoint: [u8; 36],
    pub script: Vec<u8>,
    pub sequence: u32,
}

/// One transaction output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    /// Value in base units, 8 bytes little-endian on the wire.
    pub value: u64,
    pub script: Vec<u8>,
}

/// A structurally parsed transaction.
///
/// No script execution, no signature checks: fields are carried exactly as
/// they appear on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub ins: Vec<TxIn>,
    pub outs: Vec<TxOut>,
    pub lock_time: u32,
}

/// A structurally parsed block: 80-byte header, then its transactions.
///
/// `size` records the byte length of the original payload for downstream
/// cost accounting; it is attached by the decoder, not read from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub version: u32,
    pub prev_hash: [u8; 32],
    pub merkle_root: [u8; 32],
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
    pub txs: Vec<Transaction>,
    pub size: u32,
}

impl Block {
    /// Computes the block identifier: double SHA-256 over the 80-byte
    /// header. Returned in wire (little-endian) byte order; reverse for
    /// human-readable display.
    pub fn header_hash(&self) -> [u8; 32] {
        let mut bytes = Vec::with_capacity(80);
        bytes.extend(&self.version.to_le_bytes());
        bytes.extend(&self.prev_hash);
        bytes.extend(&self.merkle_root);
        bytes.extend(&self.timestamp.to_le_bytes());
        bytes.extend(&self.bits.to_le_bytes());
        bytes.extend(&self.nonce.to_le_bytes());

        let hash = Sha256::digest(Sha256::digest(&bytes));

        let mut result = [0u8; 32];
        result.copy_from_slice(&hash);
        result
    }
}

/// Service flags advertised in `version` and `addr` messages.
///
/// A `u64` bitfield; unknown bits are preserved as-is.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Services(u64);

impl Services {
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn contains(self, other: Services) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Not a full node.
    pub const NONE: Services = Services(0x00);

    /// Full node: can be asked for full blocks.
    pub const NODE_NETWORK: Services = Services(0x01);
}

impl From<u64> for Services {
    fn from(value: u64) -> Self {
        Services::new(value)
    }
}

impl Debug for Services {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        if self.is_empty() {
            return write!(f, "Services(NONE)");
        }
        if self.contains(Self::NODE_NETWORK) && self.0 == Self::NODE_NETWORK.0 {
            return write!(f, "Services(NODE_NETWORK)");
        }
        write!(f, "Services(0x{:016x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_round_trips_through_header_bytes() {
        for cmd in [
            Command::Version,
            Command::Verack,
            Command::Ping,
            Command::GetAddr,
            Command::Addr,
            Command::Inv,
            Command::GetData,
            Command::GetBlocks,
            Command::Block,
            Command::Tx,
        ] {
            let bytes = cmd.as_bytes();
            assert_eq!(Command::from_name(Command::parse_field(&bytes)), cmd);
        }
    }

    #[test]
    fn command_bytes_are_nul_padded() {
        let bytes = Command::Inv.as_bytes();
        assert_eq!(&bytes[..3], b"inv");
        assert_eq!(&bytes[3..], &[0u8; 9]);
    }

    #[test]
    fn unrecognized_command_maps_to_unknown() {
        assert_eq!(Command::from_name("wtfmessage"), Command::Unknown);
        assert_eq!(Command::from_name("pong"), Command::Unknown);
    }

    #[test]
    fn addr_entry_ip_view_handles_both_v4_mappings() {
        let mut mapped = [0u8; 16];
        mapped[10] = 0xFF;
        mapped[11] = 0xFF;
        mapped[12..].copy_from_slice(&[8, 8, 8, 8]);
        let entry = AddrEntry {
            time: 0,
            services: Services::NONE,
            ip: mapped,
            port: 8333,
        };
        assert_eq!(
            entry.ip_addr(),
            std::net::IpAddr::V4(std::net::Ipv4Addr::new(8, 8, 8, 8))
        );

        let mut legacy = [0u8; 16];
        legacy[12..].copy_from_slice(&[93, 184, 216, 34]);
        let entry = AddrEntry { ip: legacy, ..entry };
        assert_eq!(
            entry.ip_addr(),
            std::net::IpAddr::V4(std::net::Ipv4Addr::new(93, 184, 216, 34))
        );
    }

    #[test]
    fn addr_entry_ip_view_passes_v6_through() {
        let ip: [u8; 16] = [0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        let entry = AddrEntry {
            time: 0,
            services: Services::NODE_NETWORK,
            ip,
            port: 8333,
        };
        assert_eq!(
            entry.ip_addr(),
            std::net::IpAddr::V6(std::net::Ipv6Addr::from(ip))
        );
    }

    #[test]
    fn block_header_hash_covers_only_the_header() {
        let block = Block {
            version: 1,
            prev_hash: [0x11; 32],
            merkle_root: [0x22; 32],
            timestamp: 1234567890,
            bits: 0x1d00ffff,
            nonce: 42,
            txs: vec![],
            size: 81,
        };
        let empty = block.header_hash();

        let with_tx = Block {
            txs: vec![Transaction {
                version: 1,
                ins: vec![],
                outs: vec![],
                lock_time: 0,
            }],
            ..block
        };
        assert_eq!(with_tx.header_hash(), empty);
    }
}
