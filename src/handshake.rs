//! Per-connection version negotiation.
//!
//! Tracks the protocol versions used to interpret inbound and outbound
//! frames and the `active` flag, driven by the `version`/`verack`
//! exchange. The interesting part is asymmetry in timing: the send side
//! switches as soon as the peer's `version` arrives, but the receive side
//! holds its pre-handshake framing until the peer's `verack` confirms the
//! upgrade. Pre-209 peers are the exception: they never checksum at all.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::wire::constants::{CHECKSUM_CUTOFF_EPOCH, CHECKSUM_VERSION};
use crate::wire::message::VersionMessage;

/// Handshake state for one connection.
#[derive(Debug, Clone)]
pub struct Handshake {
    recv_ver: u32,
    send_ver: u32,
    active: bool,
    best_height: u32,
    /// Armed by an inbound `version` from a 209+ peer: the value `recv_ver`
    /// jumps to when the peer's `verack` lands.
    pending_recv_ver: Option<u32>,
    local_version: u32,
}

impl Handshake {
    /// Fresh handshake state, with initial framing versions taken from the
    /// wall clock: version-209 framing after the 20 Feb 2012 cutoff, bare
    /// framing before it.
    pub fn new(local_version: u32) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::at_epoch(local_version, now)
    }

    /// As [`new`](Handshake::new) with an explicit clock reading.
    pub fn at_epoch(local_version: u32, now_unix: u64) -> Self {
        let initial = if now_unix >= CHECKSUM_CUTOFF_EPOCH {
            CHECKSUM_VERSION
        } else {
            0
        };
        Self {
            recv_ver: initial,
            send_ver: initial,
            active: false,
            best_height: 0,
            pending_recv_ver: None,
            local_version,
        }
    }

    /// Protocol version used to interpret inbound frames.
    pub fn recv_ver(&self) -> u32 {
        self.recv_ver
    }

    /// Protocol version used for outbound frames.
    pub fn send_ver(&self) -> u32 {
        self.send_ver
    }

    /// Whether inbound frames carry a checksum field right now.
    pub fn recv_checksums(&self) -> bool {
        self.recv_ver >= CHECKSUM_VERSION
    }

    /// Whether outbound frames must carry a checksum right now.
    pub fn send_checksums(&self) -> bool {
        self.send_ver >= CHECKSUM_VERSION
    }

    /// True once the peer's `verack` has been received.
    pub fn active(&self) -> bool {
        self.active
    }

    /// Chain height the peer claimed in its `version` message.
    pub fn best_height(&self) -> u32 {
        self.best_height
    }

    /// Applies an inbound `version` message.
    ///
    /// Returns true when a `verack` is owed to the peer. Callers that honor
    /// the historical ordering send the `verack` under the send version in
    /// effect *before* this call.
    pub fn on_version(&mut self, msg: &VersionMessage) -> bool {
        let negotiated = msg.version.min(self.local_version);
        let ack = msg.version >= CHECKSUM_VERSION;

        self.send_ver = negotiated;
        if msg.version < CHECKSUM_VERSION {
            // Pre-209 peer: no checksums on receive, ever, for this
            // session.
            self.recv_ver = negotiated;
        } else {
            // Checksummed receive framing begins only after the peer
            // confirms with `verack`.
            self.pending_recv_ver = Some(negotiated);
        }
        self.best_height = msg.start_height;

        ack
    }

    /// Applies an inbound `verack`: fires the armed receive-version
    /// transition and marks the connection active.
    ///
    /// A `verack` with nothing armed (no `version` seen yet) falls back to
    /// the negotiated send version, keeping both directions consistent.
    pub fn on_verack(&mut self) {
        self.recv_ver = self.pending_recv_ver.take().unwrap_or(self.send_ver);
        self.active = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encode::build_version;
    use crate::wire::message::Services;

    const POST_CUTOFF: u64 = CHECKSUM_CUTOFF_EPOCH + 1;
    const PRE_CUTOFF: u64 = CHECKSUM_CUTOFF_EPOCH - 1;

    fn peer_version(version: u32, start_height: u32) -> VersionMessage {
        let mut msg = build_version(version, Services::NODE_NETWORK, 1, "", start_height);
        msg.timestamp = 0;
        msg
    }

    #[test]
    fn initial_versions_follow_the_cutoff_clock() {
        let pre = Handshake::at_epoch(60002, PRE_CUTOFF);
        assert_eq!(pre.recv_ver(), 0);
        assert_eq!(pre.send_ver(), 0);
        assert!(!pre.recv_checksums());

        let post = Handshake::at_epoch(60002, POST_CUTOFF);
        assert_eq!(post.recv_ver(), 209);
        assert_eq!(post.send_ver(), 209);
        assert!(post.recv_checksums());
    }

    #[test]
    fn modern_peer_delays_recv_upgrade_until_verack() {
        let mut hs = Handshake::at_epoch(60002, POST_CUTOFF);

        let ack = hs.on_version(&peer_version(60001, 42));
        assert!(ack, "209+ peer gets an immediate verack");
        assert_eq!(hs.send_ver(), 60001);
        assert_eq!(hs.recv_ver(), 209, "recv version holds until verack");
        assert_eq!(hs.best_height(), 42);
        assert!(!hs.active());

        hs.on_verack();
        assert_eq!(hs.recv_ver(), 60001);
        assert!(hs.active());
    }

    #[test]
    fn negotiation_takes_the_minimum_of_both_versions() {
        let mut hs = Handshake::at_epoch(500, POST_CUTOFF);
        hs.on_version(&peer_version(60001, 0));
        assert_eq!(hs.send_ver(), 500);
        hs.on_verack();
        assert_eq!(hs.recv_ver(), 500);
    }

    #[test]
    fn legacy_peer_downgrades_recv_immediately_and_gets_no_verack() {
        let mut hs = Handshake::at_epoch(60002, PRE_CUTOFF);

        let ack = hs.on_version(&peer_version(200, 7));
        assert!(!ack, "pre-209 peer gets no verack");
        assert_eq!(hs.send_ver(), 200);
        assert_eq!(hs.recv_ver(), 200);
        assert!(!hs.recv_checksums());
        assert!(!hs.send_checksums());
        assert!(!hs.active(), "active waits for a verack");

        hs.on_verack();
        assert!(hs.active());
        assert_eq!(hs.recv_ver(), 200);
    }

    #[test]
    fn verack_before_version_falls_back_to_send_version() {
        let mut hs = Handshake::at_epoch(60002, POST_CUTOFF);
        hs.on_verack();
        assert!(hs.active());
        assert_eq!(hs.recv_ver(), 209);
    }

    #[test]
    fn versions_never_decrease_on_the_modern_path() {
        let mut hs = Handshake::at_epoch(60002, POST_CUTOFF);
        let (r0, s0) = (hs.recv_ver(), hs.send_ver());

        hs.on_version(&peer_version(60001, 0));
        assert!(hs.send_ver() >= s0);
        assert!(hs.recv_ver() >= r0);
        let r1 = hs.recv_ver();

        hs.on_verack();
        assert!(hs.recv_ver() >= r1);
    }
}
