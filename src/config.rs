//! Network and local-identity configuration.

use rand::Rng;

use crate::wire::constants::{MAIN_NET_MAGIC, PROTOCOL_VERSION, REGTEST_MAGIC, TEST_NET_MAGIC};
use crate::wire::message::Services;

/// Everything a connection needs to know about its network and the local
/// node: which magic to frame with and what to announce in `version`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Network magic; distinct per network.
    pub magic: u32,
    /// Protocol version announced in our `version` message.
    pub protocol_version: u32,
    /// Service flags announced in our `version` message.
    pub services: Services,
    /// Claimed height of the local chain. A full node passes its actual
    /// chain tip; the default of 0 is fine for protocol-only clients.
    pub start_height: u32,
    /// Sub-version string announced to peers (may be empty).
    pub sub_version: String,
    /// Local nonce, echoed back by peers; lets a node detect a connection
    /// to itself.
    pub nonce: u64,
}

impl Config {
    pub fn mainnet() -> Self {
        Self::for_magic(MAIN_NET_MAGIC)
    }

    pub fn testnet() -> Self {
        Self::for_magic(TEST_NET_MAGIC)
    }

    pub fn regtest() -> Self {
        Self::for_magic(REGTEST_MAGIC)
    }

    fn for_magic(magic: u32) -> Self {
        Self {
            magic,
            protocol_version: PROTOCOL_VERSION,
            services: Services::NODE_NETWORK,
            start_height: 0,
            sub_version: String::new(),
            nonce: rand::thread_rng().gen(),
        }
    }
}
