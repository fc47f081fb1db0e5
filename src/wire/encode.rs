use std::time::{SystemTime, UNIX_EPOCH};

use crate::wire::message::{
    AddrEntry, Block, Encode, GetBlocksMessage, InvVect, Services, Transaction, VersionMessage,
};

/// Writes a variable-length integer in its minimal encoding.
///
/// One byte below 0xFD; otherwise a marker byte (0xFD/0xFE/0xFF) followed
/// by a 2-, 4-, or 8-byte little-endian value.
pub(crate) fn write_varint(value: u64, out: &mut Vec<u8>) {
    match value {
        0..=0xFC => out.push(value as u8),
        0xFD..=0xFFFF => {
            out.push(0xFD);
            out.extend(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            out.push(0xFE);
            out.extend(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xFF);
            out.extend(&value.to_le_bytes());
        }
    }
}

impl Encode for VersionMessage {
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend(&self.version.to_le_bytes());
        out.extend(&self.services.bits().to_le_bytes());
        out.extend(&self.timestamp.to_le_bytes());
        out.extend(&self.addr_me);
        out.extend(&self.addr_you);
        out.extend(&self.nonce.to_le_bytes());
        out.extend(self.sub_version.as_bytes());
        out.push(0); // NUL terminator
        out.extend(&self.start_height.to_le_bytes());
    }
}

impl Encode for [InvVect] {
    fn encode_into(&self, out: &mut Vec<u8>) {
        write_varint(self.len() as u64, out);
        for inv in self {
            out.extend(&inv.kind.to_le_bytes());
            out.extend(&inv.hash);
        }
    }
}

impl Encode for GetBlocksMessage {
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend(&self.version.to_le_bytes());
        write_varint(self.locator.len() as u64, out);
        for hash in &self.locator {
            out.extend(hash);
        }
        out.extend(&self.stop);
    }
}

impl Encode for [AddrEntry] {
    fn encode_into(&self, out: &mut Vec<u8>) {
        write_varint(self.len() as u64, out);
        for entry in self {
            out.extend(&entry.time.to_le_bytes());
            out.extend(&entry.services.bits().to_le_bytes());
            out.extend(&entry.ip);
            out.extend(&entry.port.to_be_bytes());
        }
    }
}

impl Encode for Transaction {
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend(&self.version.to_le_bytes());
        write_varint(self.ins.len() as u64, out);
        for input in &self.ins {
            out.extend(&input.outpoint);
            write_varint(input.script.len() as u64, out);
            out.extend(&input.script);
            out.extend(&input.sequence.to_le_bytes());
        }
        write_varint(self.outs.len() as u64, out);
        for output in &self.outs {
            out.extend(&output.value.to_le_bytes());
            write_varint(output.script.len() as u64, out);
            out.extend(&output.script);
        }
        out.extend(&self.lock_time.to_le_bytes());
    }
}

impl Encode for Block {
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend(&self.version.to_le_bytes());
        out.extend(&self.prev_hash);
        out.extend(&self.merkle_root);
        out.extend(&self.timestamp.to_le_bytes());
        out.extend(&self.bits.to_le_bytes());
        out.extend(&self.nonce.to_le_bytes());
        write_varint(self.txs.len() as u64, out);
        for tx in &self.txs {
            tx.encode_into(out);
        }
        // `size` is derived from the payload on decode, never serialized.
    }
}

/// Builds the `version` message announcing the local node.
///
/// The address fields are zeroed: this layer does not know its own
/// routable address, and peers ignore them in practice. The timestamp is
/// stamped from the wall clock at call time.
pub fn build_version(
    version: u32,
    services: Services,
    nonce: u64,
    sub_version: &str,
    start_height: u32,
) -> VersionMessage {
    VersionMessage {
        version,
        services,
        timestamp: unix_time(),
        addr_me: [0u8; 26],
        addr_you: [0u8; 26],
        nonce,
        sub_version: sub_version.to_string(),
        start_height,
    }
}

fn unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::decode::read_varint;
    use crate::wire::message::{Decode, TxIn, TxOut};

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            ins: vec![TxIn {
                outpoint: [0xAA; 36],
                script: vec![0x51, 0x52, 0x53],
                sequence: 0xFFFFFFFF,
            }],
            outs: vec![
                TxOut {
                    value: 5_000_000_000,
                    script: vec![0x6A],
                },
                TxOut {
                    value: 1234,
                    script: vec![],
                },
            ],
            lock_time: 0,
        }
    }

    #[test]
    fn varint_round_trips_with_minimal_length() {
        let cases: &[(u64, usize)] = &[
            (0, 1),
            (1, 1),
            (0xFC, 1),
            (0xFD, 3),
            (0xFFFF, 3),
            (0x1_0000, 5),
            (0xFFFF_FFFF, 5),
            (0x1_0000_0000, 9),
            (u64::MAX, 9),
        ];
        for (value, len) in cases {
            let mut out = vec![];
            write_varint(*value, &mut out);
            assert_eq!(out.len(), *len, "encoding of {value} is not minimal");

            let mut c = 0;
            assert_eq!(read_varint(&out, &mut c).unwrap(), *value);
            assert_eq!(c, out.len());
        }
    }

    #[test]
    fn version_round_trips() {
        let original = build_version(60002, Services::NODE_NETWORK, 0xDEADBEEF, "", 10);
        let decoded = VersionMessage::decode(&original.encode()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn version_with_sub_version_round_trips() {
        let mut original = build_version(60002, Services::NODE_NETWORK, 7, "/peerwire:0.1/", 0);
        original.addr_you[0] = 9;
        let decoded = VersionMessage::decode(&original.encode()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn inv_round_trips() {
        let original = vec![InvVect::tx([0x11; 32]), InvVect::block([0x22; 32])];
        let decoded = Vec::<InvVect>::decode(&original.encode()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn getblocks_round_trips() {
        let original = GetBlocksMessage {
            version: 60002,
            locator: vec![[0x0A; 32], [0x0B; 32], [0x0C; 32]],
            stop: [0xFF; 32],
        };
        let decoded = GetBlocksMessage::decode(&original.encode()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn addr_round_trips() {
        let mut ip = [0u8; 16];
        ip[10] = 0xFF;
        ip[11] = 0xFF;
        ip[12..].copy_from_slice(&[1, 2, 3, 4]);
        let original = vec![
            AddrEntry {
                time: 1700000100,
                services: Services::NODE_NETWORK,
                ip,
                port: 8333,
            },
            AddrEntry {
                time: 1700000200,
                services: Services::NONE,
                ip: [0u8; 16],
                port: 18333,
            },
        ];
        let decoded = Vec::<AddrEntry>::decode(&original.encode()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn tx_round_trips() {
        let original = sample_tx();
        let decoded = Transaction::decode(&original.encode()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn block_round_trips() {
        let mut original = Block {
            version: 1,
            prev_hash: [0x11; 32],
            merkle_root: [0x22; 32],
            timestamp: 1231006505,
            bits: 0x1d00ffff,
            nonce: 2083236893,
            txs: vec![sample_tx()],
            size: 0,
        };
        let payload = original.encode();
        original.size = payload.len() as u32;

        let decoded = Block::decode(&payload).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn empty_inv_encodes_as_single_zero_byte() {
        let invs: Vec<InvVect> = vec![];
        assert_eq!(invs.encode(), vec![0u8]);
    }
}
