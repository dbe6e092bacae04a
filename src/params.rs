//! Network parameter tables and the protocol contract constants.
//!
//! The constants here are part of the wire contract with the coordinator,
//! not tunables: changing any of them produces a client that other
//! participants will reject.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed 8-byte frame prefix for every coordinator message.
pub const MAGIC: [u8; 8] = [0x76, 0x5b, 0xe8, 0xb4, 0xe4, 0x39, 0x6d, 0xcf];

/// Protocol epoch announced in the client greeting.
pub const PROTOCOL_VERSION: &[u8] = b"alpha13";

/// Upper bound on a single framed message.
pub const MAX_MESSAGE_SIZE: usize = 10_000_000;

/// Default receive timeout for ordinary protocol messages.
pub const STANDARD_TIMEOUT: Duration = Duration::from_secs(3);

/// Announced delay between `FusionBegin` and the first round.
pub const WARMUP_TIME: Duration = Duration::from_secs(30);

/// Tolerated deviation from the warm-up window.
pub const WARMUP_SLOP: Duration = Duration::from_secs(3);

/// Maximum tolerated |server clock − local clock|, in seconds.
pub const MAX_CLOCK_DISCREPANCY: u64 = 5;

/// Smallest output value a fusion will create.
pub const MIN_OUTPUT: u64 = 10_000;

/// Hard cap on the excess fee a client will ever contribute.
pub const MAX_EXCESS_FEE: u64 = 10_000;

/// Hard cap on components (inputs + outputs + blanks) per participant.
pub const MAX_COMPONENTS: u64 = 40;

/// Minimum distinct components a settlement transaction must reach.
pub const MIN_TX_COMPONENTS: u64 = 11;

/// Serialized size of a standard P2PKH output component.
pub const OUTPUT_COMPONENT_SIZE: u64 = 34;

// Covert phase offsets, all measured from the receipt of `StartRound`.
pub const COVERT_COMPONENT_WINDOW_START: Duration = Duration::from_secs(5);
pub const COVERT_COMPONENT_WINDOW_END: Duration = Duration::from_secs(15);
pub const COVERT_REVEAL_DEADLINE: Duration = Duration::from_secs(20);
pub const COVERT_SIGNATURE_WINDOW_START: Duration = Duration::from_secs(20);
pub const COVERT_SIGNATURE_WINDOW_END: Duration = Duration::from_secs(30);

/// How long to wait for the terminal `FusionResult`.
pub const FUSION_RESULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Receive timeout while parked in the tier pools.
pub const POOL_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra covert connections opened beyond one per component.
pub const COVERT_SPARE_CONNECTIONS: usize = 6;

/// Fee for one component of `size` bytes at `feerate` sat/kB, rounded up.
pub fn component_fee(size: u64, feerate: u64) -> u64 {
    (size * feerate + 999) / 1000
}

/// Serialized size of an input component spending a key of this length.
pub fn input_component_size(pubkey_len: usize) -> u64 {
    108 + pubkey_len as u64
}

/// Serialized size of an output component paying to this script.
pub fn output_component_size(script_len: usize) -> u64 {
    9 + script_len as u64
}

/// Per-chain constants the wallet collaborator hands to the engine.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkParameters {
    pub name: String,
    /// Little-endian genesis block hash, echoed in the client greeting.
    pub genesis_hash: [u8; 32],
    pub default_port: u16,
    pub dust_limit: u64,
}

/// Main network parameters.
pub fn mainnet() -> NetworkParameters {
    NetworkParameters {
        name: "mainnet".into(),
        genesis_hash: [
            0x6f, 0xe2, 0x8c, 0x0a, 0xb6, 0xf1, 0xb3, 0x72, 0xc1, 0xa6, 0xa2, 0x46, 0xae, 0x63,
            0xf7, 0x4f, 0x93, 0x1e, 0x83, 0x65, 0xe1, 0x5a, 0x08, 0x9c, 0x68, 0xd6, 0x19, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ],
        default_port: 8787,
        dust_limit: 546,
    }
}

/// Testnet4 parameters.
pub fn testnet() -> NetworkParameters {
    NetworkParameters {
        name: "testnet".into(),
        genesis_hash: [
            0x7b, 0x9f, 0xfd, 0x44, 0xdd, 0x73, 0xc0, 0x5f, 0x2a, 0x15, 0xd3, 0x74, 0x74, 0x79,
            0xcc, 0x18, 0x17, 0x75, 0x26, 0xce, 0x68, 0x86, 0x78, 0x9a, 0xc4, 0x10, 0xd4, 0x1d,
            0x00, 0x00, 0x00, 0x00,
        ],
        default_port: 18787,
        dust_limit: 546,
    }
}

/// Look a network up by name.
pub fn by_name(name: &str) -> Option<NetworkParameters> {
    match name {
        "mainnet" => Some(mainnet()),
        "testnet" => Some(testnet()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_fee_rounds_up() {
        assert_eq!(component_fee(141, 1000), 141);
        assert_eq!(component_fee(141, 1), 1);
        assert_eq!(component_fee(1000, 1), 1);
        assert_eq!(component_fee(1001, 1), 2);
        assert_eq!(component_fee(0, 1000), 0);
    }

    #[test]
    fn p2pkh_output_size_matches_constant() {
        // 25-byte P2PKH script.
        assert_eq!(output_component_size(25), OUTPUT_COMPONENT_SIZE);
    }

    #[test]
    fn input_size_tracks_pubkey() {
        assert_eq!(input_component_size(32), 140);
        assert_eq!(input_component_size(33), 141);
    }

    #[test]
    fn network_lookup() {
        assert_eq!(by_name("mainnet").unwrap().name, "mainnet");
        assert_eq!(by_name("testnet").unwrap().default_port, 18787);
        assert!(by_name("signet").is_none());
    }
}
