//! A session with one remote peer.
//!
//! [`Connection`] glues the framer, the codec, and the handshake state
//! machine to a duplex byte stream and exposes the result as a sequence of
//! [`Event`]s. All inbound bytes are processed by one strictly sequential
//! loop, so event order per connection equals on-wire frame order, and a
//! handshake transition is always observable before the next frame is
//! decoded.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::SocketAddr;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::handshake::Handshake;
use crate::wire::codec::write_frame;
use crate::wire::encode::build_version;
use crate::wire::framer::Framer;
use crate::wire::message::{Block, Command, Encode, GetBlocksMessage, InvVect, Message, Transaction};

/// Something that happened on a connection.
///
/// The connection handle itself accompanies every event: with the pull
/// API the caller already holds it, and [`Connection::drive`] passes it
/// into the handler alongside the event.
#[derive(Debug)]
pub enum Event {
    /// A freshly dialed connection is up and the local `version` is out.
    Connect,
    /// A recognized message arrived. The variant of [`Message`] is the
    /// command it traveled under.
    Message(Message),
    /// The peer closed the stream.
    Disconnect,
    /// The transport failed; the connection is finished.
    Error(Error),
}

/// A connection to one remote peer.
///
/// Generic over the stream so tests (and exotic transports) can supply
/// anything `Read + Write`. The connection exclusively owns its stream,
/// parse buffer, and handshake state; nothing is shared across peers.
pub struct Connection<S> {
    stream: S,
    peer: SocketAddr,
    inbound: bool,
    config: Config,
    framer: Framer,
    handshake: Handshake,
    sent_getaddr: bool,
    pending: VecDeque<Event>,
    closed: bool,
}

impl<S: Read + Write> Connection<S> {
    /// Wraps a stream we dialed: announces the local `version` right away
    /// and queues [`Event::Connect`].
    pub fn outbound(stream: S, peer: SocketAddr, config: Config) -> Result<Self> {
        let mut conn = Self::with_parts(stream, peer, config, false);
        conn.send_version()?;
        conn.pending.push_back(Event::Connect);
        Ok(conn)
    }

    /// Wraps a stream the remote dialed. Nothing is sent until the caller
    /// decides to, typically a [`send_version`](Connection::send_version)
    /// once the peer's own `version` shows up.
    pub fn inbound(stream: S, peer: SocketAddr, config: Config) -> Self {
        Self::with_parts(stream, peer, config, true)
    }

    fn with_parts(stream: S, peer: SocketAddr, config: Config, inbound: bool) -> Self {
        let framer = Framer::new(config.magic);
        let handshake = Handshake::new(config.protocol_version);
        Self {
            stream,
            peer,
            inbound,
            config,
            framer,
            handshake,
            sent_getaddr: false,
            pending: VecDeque::new(),
            closed: false,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Whether the remote initiated this connection.
    pub fn is_inbound(&self) -> bool {
        self.inbound
    }

    /// True once the peer's `verack` has been received.
    pub fn active(&self) -> bool {
        self.handshake.active()
    }

    pub fn recv_ver(&self) -> u32 {
        self.handshake.recv_ver()
    }

    pub fn send_ver(&self) -> u32 {
        self.handshake.send_ver()
    }

    /// Chain height the peer claimed during the handshake.
    pub fn best_height(&self) -> u32 {
        self.handshake.best_height()
    }

    /// Whether `getaddr` has been sent on this session.
    pub fn sent_getaddr(&self) -> bool {
        self.sent_getaddr
    }

    /// Blocks until the next event.
    ///
    /// Frame and codec failures are logged and skipped here: only
    /// recognized, well-formed messages surface, in exact on-wire order.
    /// After [`Event::Disconnect`] or [`Event::Error`] the connection is
    /// finished and every further call returns [`Event::Disconnect`].
    pub fn next_event(&mut self) -> Event {
        if let Some(event) = self.pending.pop_front() {
            return event;
        }
        if self.closed {
            return Event::Disconnect;
        }

        let mut chunk = [0u8; 4096];
        loop {
            // Drain whatever is already buffered before touching the
            // socket; the receive version is re-read for every frame.
            loop {
                match self.framer.poll(self.handshake.recv_ver()) {
                    Ok(Some(frame)) => {
                        if frame.garbage > 0 {
                            debug!(
                                peer = %self.peer,
                                bytes = frame.garbage,
                                "skipped inter-message garbage"
                            );
                        }
                        let command = frame.command.clone();
                        match Message::try_from(frame) {
                            Ok(Message::Unknown { command, .. }) => {
                                debug!(peer = %self.peer, %command, "dropping unrecognized command");
                            }
                            Ok(message) => {
                                if let Err(e) = self.apply(&message) {
                                    self.closed = true;
                                    return Event::Error(e);
                                }
                                return Event::Message(message);
                            }
                            Err(e) => {
                                let err = Error::Malformed {
                                    command,
                                    source: e,
                                };
                                warn!(peer = %self.peer, error = %err, "dropping frame");
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(peer = %self.peer, error = %e, "discarded frame");
                    }
                }
            }

            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    self.closed = true;
                    if self.framer.mid_frame() {
                        warn!(peer = %self.peer, "stream ended mid-frame");
                    }
                    return Event::Disconnect;
                }
                Ok(n) => self.framer.push(&chunk[..n]),
                Err(e) => {
                    self.closed = true;
                    return Event::Error(Error::Io(e));
                }
            }
        }
    }

    /// Runs the event loop to completion, handing every event to the
    /// handler together with the connection so it can reply inline.
    pub fn drive<F>(&mut self, mut handler: F)
    where
        F: FnMut(&mut Self, Event),
    {
        loop {
            let event = self.next_event();
            let finished = matches!(event, Event::Disconnect | Event::Error(_));
            handler(self, event);
            if finished {
                break;
            }
        }
    }

    /// Handshake bookkeeping, run before the message is surfaced so the
    /// transition is visible by the time the caller sees the event.
    fn apply(&mut self, message: &Message) -> Result<()> {
        match message {
            Message::Version(v) => {
                // The verack departs under the send version in effect
                // before negotiation, matching the historical ordering.
                let checksummed = self.handshake.send_checksums();
                if self.handshake.on_version(v) {
                    write_frame(
                        &mut self.stream,
                        self.config.magic,
                        Command::Verack.name(),
                        &[],
                        checksummed,
                    )?;
                    self.stream.flush()?;
                }
                debug!(
                    peer = %self.peer,
                    version = v.version,
                    height = v.start_height,
                    "received version"
                );
            }
            Message::Verack => {
                self.handshake.on_verack();
                info!(
                    peer = %self.peer,
                    version = self.handshake.recv_ver(),
                    "handshake complete"
                );
            }
            _ => {}
        }
        Ok(())
    }

    fn write(&mut self, command: &str, payload: &[u8]) -> Result<()> {
        write_frame(
            &mut self.stream,
            self.config.magic,
            command,
            payload,
            self.handshake.send_checksums(),
        )?;
        self.stream.flush()?;
        Ok(())
    }

    /// Announces the local node to the peer.
    pub fn send_version(&mut self) -> Result<()> {
        let msg = build_version(
            self.config.protocol_version,
            self.config.services,
            self.config.nonce,
            &self.config.sub_version,
            self.config.start_height,
        );
        self.write(Command::Version.name(), &msg.encode())
    }

    /// Asks the peer for addresses of other nodes, recording that we did.
    pub fn send_getaddr(&mut self) -> Result<()> {
        self.write(Command::GetAddr.name(), &[])?;
        self.sent_getaddr = true;
        Ok(())
    }

    /// Requests block inventory following the locator, up to `stop` (all
    /// zeroes for "no stop"). The payload announces the negotiated send
    /// version.
    pub fn send_getblocks(&mut self, locator: &[[u8; 32]], stop: [u8; 32]) -> Result<()> {
        let msg = GetBlocksMessage {
            version: self.handshake.send_ver(),
            locator: locator.to_vec(),
            stop,
        };
        self.write(Command::GetBlocks.name(), &msg.encode())
    }

    /// Requests the objects named by the inventory vectors.
    pub fn send_getdata(&mut self, invs: &[InvVect]) -> Result<()> {
        self.write(Command::GetData.name(), &invs.encode())
    }

    /// Advertises inventory to the peer.
    pub fn send_inv(&mut self, invs: &[InvVect]) -> Result<()> {
        self.write(Command::Inv.name(), &invs.encode())
    }

    /// Relays a transaction.
    pub fn send_tx(&mut self, tx: &Transaction) -> Result<()> {
        self.write(Command::Tx.name(), &tx.encode())
    }

    /// Relays a block with its transactions.
    pub fn send_block(&mut self, block: &Block) -> Result<()> {
        self.write(Command::Block.name(), &block.encode())
    }

    /// Sends an arbitrary command with a prebuilt payload. The command
    /// name must fit the 12-byte header field.
    pub fn send_message(&mut self, command: &str, payload: &[u8]) -> Result<()> {
        self.write(command, payload)
    }
}
