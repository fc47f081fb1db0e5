use std::io::{self};

use crate::wire::constants::{MAX_ADDR_PER_MESSAGE, MAX_INV_PER_MESSAGE};
use crate::wire::message::{
    AddrEntry, Block, Decode, GetBlocksMessage, InvVect, Services, Transaction, TxIn, TxOut,
    VersionMessage,
};

impl Decode for VersionMessage {
    fn decode(payload: &[u8]) -> io::Result<Self> {
        let mut c = 0;

        let version = read_u32(payload, &mut c)?;
        let services = Services::from(read_u64(payload, &mut c)?);
        let timestamp = read_u64(payload, &mut c)?;
        let addr_me = slice::<26>(payload, &mut c, "version: addr_me")?;
        let addr_you = slice::<26>(payload, &mut c, "version: addr_you")?;
        let nonce = read_u64(payload, &mut c)?;

        // Sub-version travels as a NUL-terminated byte string.
        let end = payload[c..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| eof("version: sub_version"))?;
        let sub_version = std::str::from_utf8(&payload[c..c + end])
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
            .to_string();
        c += end + 1;

        let start_height = read_u32(payload, &mut c)?;

        Ok(VersionMessage {
            version,
            services,
            timestamp,
            addr_me,
            addr_you,
            nonce,
            sub_version,
            start_height,
        })
    }
}

impl Decode for Vec<InvVect> {
    fn decode(payload: &[u8]) -> io::Result<Self> {
        let mut c = 0;
        let count = read_varint(payload, &mut c)? as usize;

        if count > MAX_INV_PER_MESSAGE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "inv: exceeds 50000-entry limit",
            ));
        }

        let mut invs = Vec::with_capacity(count);
        for _ in 0..count {
            let kind = read_u32(payload, &mut c)?;
            let hash = slice::<32>(payload, &mut c, "inv: hash")?;
            invs.push(InvVect { kind, hash });
        }

        Ok(invs)
    }
}

impl Decode for GetBlocksMessage {
    fn decode(payload: &[u8]) -> io::Result<Self> {
        let mut c = 0;

        let version = read_u32(payload, &mut c)?;
        let count = read_varint(payload, &mut c)? as usize;

        let mut locator = Vec::with_capacity(cap(count));
        for _ in 0..count {
            locator.push(slice::<32>(payload, &mut c, "getblocks: locator")?);
        }
        let stop = slice::<32>(payload, &mut c, "getblocks: stop")?;

        Ok(GetBlocksMessage {
            version,
            locator,
            stop,
        })
    }
}

impl Decode for Vec<AddrEntry> {
    fn decode(payload: &[u8]) -> io::Result<Self> {
        let mut c = 0;
        let declared = read_varint(payload, &mut c)? as usize;

        // A peer may declare more than 1000 entries. Every declared entry is
        // consumed off the wire so the frame stays in sync; only the first
        // 1000 are kept.
        let mut entries = Vec::with_capacity(declared.min(MAX_ADDR_PER_MESSAGE));
        for _ in 0..declared {
            let time = read_u32(payload, &mut c)?;
            let services = Services::from(read_u64(payload, &mut c)?);
            let ip = slice::<16>(payload, &mut c, "addr: ip")?;
            let port = u16::from_be_bytes(slice::<2>(payload, &mut c, "addr: port")?);

            if entries.len() < MAX_ADDR_PER_MESSAGE {
                entries.push(AddrEntry {
                    time,
                    services,
                    ip,
                    port,
                });
            }
        }

        Ok(entries)
    }
}

impl Decode for Transaction {
    fn decode(payload: &[u8]) -> io::Result<Self> {
        let mut c = 0;
        decode_tx(payload, &mut c)
    }
}

impl Decode for Block {
    fn decode(payload: &[u8]) -> io::Result<Self> {
        let mut c = 0;

        let version = read_u32(payload, &mut c)?;
        let prev_hash = slice::<32>(payload, &mut c, "block: prev_hash")?;
        let merkle_root = slice::<32>(payload, &mut c, "block: merkle_root")?;
        let timestamp = read_u32(payload, &mut c)?;
        let bits = read_u32(payload, &mut c)?;
        let nonce = read_u32(payload, &mut c)?;

        let txn_count = read_varint(payload, &mut c)? as usize;
        let mut txs = Vec::with_capacity(cap(txn_count));
        for _ in 0..txn_count {
            txs.push(decode_tx(payload, &mut c)?);
        }

        Ok(Block {
            version,
            prev_hash,
            merkle_root,
            timestamp,
            bits,
            nonce,
            txs,
            // Retained for downstream cost accounting.
            size: payload.len() as u32,
        })
    }
}

/// Decodes one serialized transaction starting at `*c`, advancing the
/// cursor past it. Shared between the `tx` and `block` decoders.
fn decode_tx(p: &[u8], c: &mut usize) -> io::Result<Transaction> {
    let version = read_u32(p, c)?;

    let in_count = read_varint(p, c)? as usize;
    let mut ins = Vec::with_capacity(cap(in_count));
    for _ in 0..in_count {
        let outpoint = slice::<36>(p, c, "tx: outpoint")?;
        let script_len = read_varint(p, c)? as usize;
        let script = p
            .get(*c..*c + script_len)
            .ok_or_else(|| eof("tx: input script"))?
            .to_vec();
        *c += script_len;
        let sequence = read_u32(p, c)?;
        ins.push(TxIn {
            outpoint,
            script,
            sequence,
        });
    }

    let out_count = read_varint(p, c)? as usize;
    let mut outs = Vec::with_capacity(cap(out_count));
    for _ in 0..out_count {
        let value = read_u64(p, c)?;
        let script_len = read_varint(p, c)? as usize;
        let script = p
            .get(*c..*c + script_len)
            .ok_or_else(|| eof("tx: output script"))?
            .to_vec();
        *c += script_len;
        outs.push(TxOut { value, script });
    }

    let lock_time = read_u32(p, c)?;

    Ok(Transaction {
        version,
        ins,
        outs,
        lock_time,
    })
}

fn eof(context: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, context)
}

/// Capacity hint for count-prefixed vectors. A hostile count errors out
/// when the payload runs dry; it must not become a huge allocation first.
fn cap(count: usize) -> usize {
    count.min(1024)
}

/// Reads a variable-length integer: one byte below 0xFD, otherwise the
/// marker byte selects a 2-, 4-, or 8-byte little-endian value.
pub(crate) fn read_varint(p: &[u8], c: &mut usize) -> io::Result<u64> {
    let first = *p.get(*c).ok_or_else(|| eof("varint"))?;
    *c += 1;
    match first {
        0xFD => {
            let v = u16::from_le_bytes(slice::<2>(p, c, "varint:fd")?);
            Ok(v as u64)
        }
        0xFE => {
            let v = u32::from_le_bytes(slice::<4>(p, c, "varint:fe")?);
            Ok(v as u64)
        }
        0xFF => {
            let v = u64::from_le_bytes(slice::<8>(p, c, "varint:ff")?);
            Ok(v)
        }
        n => Ok(n as u64),
    }
}

fn read_u32(p: &[u8], c: &mut usize) -> io::Result<u32> {
    Ok(u32::from_le_bytes(slice::<4>(p, c, "u32")?))
}

fn read_u64(p: &[u8], c: &mut usize) -> io::Result<u64> {
    Ok(u64::from_le_bytes(slice::<8>(p, c, "u64")?))
}

fn slice<const N: usize>(p: &[u8], c: &mut usize, ctx: &'static str) -> io::Result<[u8; N]> {
    let b = p
        .get(*c..*c + N)
        .ok_or_else(|| eof(ctx))?
        .try_into()
        .unwrap();
    *c += N;
    Ok(b)
}
