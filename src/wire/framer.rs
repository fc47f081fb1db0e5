use bytes::{Buf, BytesMut};

use crate::error::{Error, Result};
use crate::wire::codec;
use crate::wire::constants::{CHECKSUM_VERSION, COMMAND_SIZE, MAX_PAYLOAD_SIZE};
use crate::wire::message::Command;

/// A framed message lifted out of the inbound byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command name: the 12-byte header field with its NUL padding
    /// stripped, decoded as ASCII. An unrecognizable name still frames;
    /// the codec decides what to do with it.
    pub command: String,
    pub payload: Vec<u8>,
    /// Checksum as read from the wire; absent on pre-209 framing.
    pub checksum: Option<[u8; 4]>,
    /// Inter-message garbage skipped before this frame's magic, in bytes.
    pub garbage: usize,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    ScanMagic,
    Command,
    Length {
        command: String,
    },
    Checksum {
        command: String,
        len: usize,
    },
    Payload {
        command: String,
        len: usize,
        checksum: Option<[u8; 4]>,
    },
}

/// Translates an inbound byte stream into message frames.
///
/// The framer is a resumable state machine over a ring buffer: feed it
/// arbitrary chunks with [`push`](Framer::push), then drain complete frames
/// with [`poll`](Framer::poll). Between frames it scans for the 4-byte
/// network magic, counting whatever precedes it as inter-message garbage
/// (a diagnostic, not an error).
///
/// Frame-level failures (checksum mismatch, absurd declared length) return
/// an error with the state already reset to the magic scan, so the caller
/// can log and keep polling; they never poison the stream.
pub struct Framer {
    magic: [u8; 4],
    buf: BytesMut,
    state: State,
    garbage: usize,
}

impl Framer {
    pub fn new(magic: u32) -> Self {
        Self {
            magic: magic.to_le_bytes(),
            buf: BytesMut::with_capacity(4096),
            state: State::default(),
            garbage: 0,
        }
    }

    /// Appends raw bytes from the transport.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// True while a frame is partially buffered. Useful at EOF: a stream
    /// that ends mid-frame was truncated.
    pub fn mid_frame(&self) -> bool {
        !matches!(self.state, State::ScanMagic)
    }

    /// Attempts to lift the next frame out of the buffer.
    ///
    /// `recv_ver` is the connection's current receive-side protocol
    /// version. It is consulted once per frame, at the point where the
    /// checksum field would begin, so a handshake transition between two
    /// frames takes effect on the very next one.
    ///
    /// Returns `Ok(None)` when more bytes are needed.
    pub fn poll(&mut self, recv_ver: u32) -> Result<Option<Frame>> {
        loop {
            // The state is taken by value and written back explicitly;
            // `take` leaves `ScanMagic`, which is also the reset target
            // after a completed or discarded frame.
            match std::mem::take(&mut self.state) {
                State::ScanMagic => match find(&self.buf, &self.magic) {
                    Some(at) => {
                        self.garbage += at;
                        self.buf.advance(at + 4);
                        self.state = State::Command;
                    }
                    None => {
                        // Keep up to 3 tail bytes: they may be the start of
                        // a magic split across reads.
                        let keep = self.buf.len().min(3);
                        let skip = self.buf.len() - keep;
                        self.garbage += skip;
                        self.buf.advance(skip);
                        return Ok(None);
                    }
                },
                State::Command => {
                    if self.buf.len() < COMMAND_SIZE {
                        self.state = State::Command;
                        return Ok(None);
                    }
                    let mut raw = [0u8; COMMAND_SIZE];
                    raw.copy_from_slice(&self.buf[..COMMAND_SIZE]);
                    self.buf.advance(COMMAND_SIZE);
                    let command = Command::parse_field(&raw).to_string();
                    self.state = State::Length { command };
                }
                State::Length { command } => {
                    if self.buf.len() < 4 {
                        self.state = State::Length { command };
                        return Ok(None);
                    }
                    let len = u32::from_le_bytes(self.buf[..4].try_into().unwrap()) as usize;
                    self.buf.advance(4);
                    if len > MAX_PAYLOAD_SIZE {
                        // Frame dropped; the scan resumes on the bytes that
                        // follow the corrupt header.
                        return Err(Error::PayloadTooLarge {
                            len,
                            max: MAX_PAYLOAD_SIZE,
                        });
                    }
                    if recv_ver >= CHECKSUM_VERSION {
                        self.state = State::Checksum { command, len };
                    } else {
                        self.state = State::Payload {
                            command,
                            len,
                            checksum: None,
                        };
                    }
                }
                State::Checksum { command, len } => {
                    if self.buf.len() < 4 {
                        self.state = State::Checksum { command, len };
                        return Ok(None);
                    }
                    let sum: [u8; 4] = self.buf[..4].try_into().unwrap();
                    self.buf.advance(4);
                    self.state = State::Payload {
                        command,
                        len,
                        checksum: Some(sum),
                    };
                }
                State::Payload {
                    command,
                    len,
                    checksum,
                } => {
                    if self.buf.len() < len {
                        self.state = State::Payload {
                            command,
                            len,
                            checksum,
                        };
                        return Ok(None);
                    }
                    let payload = self.buf.split_to(len).to_vec();
                    let garbage = std::mem::take(&mut self.garbage);

                    if let Some(expected) = checksum {
                        if codec::checksum(&payload) != expected {
                            return Err(Error::ChecksumMismatch { command });
                        }
                    }

                    return Ok(Some(Frame {
                        command,
                        payload,
                        checksum,
                        garbage,
                    }));
                }
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8; 4]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::codec::write_frame;
    use crate::wire::constants::MAIN_NET_MAGIC;

    fn frame_bytes(command: &str, payload: &[u8], with_checksum: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        write_frame(&mut buf, MAIN_NET_MAGIC, command, payload, with_checksum).unwrap();
        buf
    }

    #[test]
    fn parses_a_checksummed_frame() {
        let mut framer = Framer::new(MAIN_NET_MAGIC);
        framer.push(&frame_bytes("ping", &[], true));

        let frame = framer.poll(209).unwrap().unwrap();
        assert_eq!(frame.command, "ping");
        assert!(frame.payload.is_empty());
        assert_eq!(frame.checksum, Some(codec::checksum(&[])));
        assert_eq!(frame.garbage, 0);

        assert!(framer.poll(209).unwrap().is_none());
    }

    #[test]
    fn parses_a_pre_209_frame_without_checksum_field() {
        let mut framer = Framer::new(MAIN_NET_MAGIC);
        framer.push(&frame_bytes("inv", &[0xAB, 0xCD], false));

        let frame = framer.poll(0).unwrap().unwrap();
        assert_eq!(frame.command, "inv");
        assert_eq!(frame.payload, vec![0xAB, 0xCD]);
        assert_eq!(frame.checksum, None);
    }

    #[test]
    fn skips_inter_message_garbage_and_reports_it() {
        let mut bytes = vec![0x00; 17]; // no magic subsequence
        bytes.extend(frame_bytes("ping", &[], true));

        let mut framer = Framer::new(MAIN_NET_MAGIC);
        framer.push(&bytes);

        let frame = framer.poll(209).unwrap().unwrap();
        assert_eq!(frame.command, "ping");
        assert_eq!(frame.garbage, 17);
    }

    #[test]
    fn reassembles_across_single_byte_reads() {
        let bytes = frame_bytes("inv", &[1, 2, 3, 4], true);
        let mut framer = Framer::new(MAIN_NET_MAGIC);

        for (i, b) in bytes.iter().enumerate() {
            framer.push(std::slice::from_ref(b));
            let polled = framer.poll(209).unwrap();
            if i + 1 < bytes.len() {
                assert!(polled.is_none(), "frame completed early at byte {i}");
            } else {
                let frame = polled.unwrap();
                assert_eq!(frame.command, "inv");
                assert_eq!(frame.payload, vec![1, 2, 3, 4]);
            }
        }
    }

    #[test]
    fn partial_magic_at_buffer_tail_is_retained() {
        let bytes = frame_bytes("ping", &[], true);
        let mut framer = Framer::new(MAIN_NET_MAGIC);

        framer.push(&bytes[..2]);
        assert!(framer.poll(209).unwrap().is_none());
        framer.push(&bytes[2..]);

        let frame = framer.poll(209).unwrap().unwrap();
        assert_eq!(frame.command, "ping");
        assert_eq!(frame.garbage, 0);
    }

    #[test]
    fn checksum_mismatch_discards_frame_and_resyncs() {
        let mut bad = frame_bytes("inv", &[0xAB, 0xCD], true);
        bad[20] ^= 0xFF; // corrupt the checksum field

        let mut framer = Framer::new(MAIN_NET_MAGIC);
        framer.push(&bad);
        framer.push(&frame_bytes("ping", &[], true));

        let err = framer.poll(209).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { ref command } if command == "inv"));

        let frame = framer.poll(209).unwrap().unwrap();
        assert_eq!(frame.command, "ping");
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let mut bad = frame_bytes("inv", &[0xAB, 0xCD], true);
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;

        let mut framer = Framer::new(MAIN_NET_MAGIC);
        framer.push(&bad);
        assert!(framer.poll(209).is_err());
    }

    #[test]
    fn oversize_declared_length_discards_frame_and_resyncs() {
        let mut bytes = Vec::new();
        bytes.extend(MAIN_NET_MAGIC.to_le_bytes());
        bytes.extend(crate::wire::message::Command::Inv.as_bytes());
        bytes.extend((u32::MAX).to_le_bytes());

        let mut framer = Framer::new(MAIN_NET_MAGIC);
        framer.push(&bytes);
        framer.push(&frame_bytes("ping", &[], true));

        assert!(matches!(
            framer.poll(209),
            Err(Error::PayloadTooLarge { .. })
        ));
        let frame = framer.poll(209).unwrap().unwrap();
        assert_eq!(frame.command, "ping");
    }

    #[test]
    fn magic_bytes_inside_a_payload_are_not_a_boundary() {
        let mut payload = Vec::new();
        payload.extend(MAIN_NET_MAGIC.to_le_bytes());
        payload.extend([0x01, 0x02]);

        let mut framer = Framer::new(MAIN_NET_MAGIC);
        framer.push(&frame_bytes("tx", &payload, true));
        framer.push(&frame_bytes("ping", &[], true));

        let first = framer.poll(209).unwrap().unwrap();
        assert_eq!(first.command, "tx");
        assert_eq!(first.payload, payload);

        let second = framer.poll(209).unwrap().unwrap();
        assert_eq!(second.command, "ping");
        assert_eq!(second.garbage, 0);
    }

    #[test]
    fn unrecognized_command_name_still_frames() {
        let mut framer = Framer::new(MAIN_NET_MAGIC);
        framer.push(&frame_bytes("wtfmessage", &[1, 2, 3], true));

        let frame = framer.poll(209).unwrap().unwrap();
        assert_eq!(frame.command, "wtfmessage");
        assert_eq!(frame.payload, vec![1, 2, 3]);
    }

    #[test]
    fn mid_frame_reports_partial_state() {
        let bytes = frame_bytes("ping", &[], true);
        let mut framer = Framer::new(MAIN_NET_MAGIC);
        assert!(!framer.mid_frame());

        framer.push(&bytes[..10]);
        assert!(framer.poll(209).unwrap().is_none());
        assert!(framer.mid_frame());

        framer.push(&bytes[10..]);
        framer.poll(209).unwrap().unwrap();
        assert!(!framer.mid_frame());
    }
}
