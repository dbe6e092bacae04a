//! Protocol messages exchanged with the fusion coordinator.
//!
//! Three channels carry these: the main authenticated connection
//! ([`ClientMessage`]/[`ServerMessage`]) and the short-lived covert
//! connections ([`CovertMessage`]). Commitments and components travel as
//! opaque serialized bytes so they can be hashed, compared, and echoed back
//! byte-for-byte without re-encoding.

use crate::error::FusionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum ClientMessage {
    /// Greeting: protocol epoch plus the chain we expect to settle on.
    ClientHello { version: Vec<u8>, genesis_hash: [u8; 32] },

    /// Register for every tier we produced a feasible output plan for.
    JoinPools { tiers: Vec<u64> },

    /// Per-round commitment bundle.
    PlayerCommit {
        random_number_commitment: [u8; 32],
        pedersen_total_nonce: [u8; 32],
        excess_fee: u64,
        initial_commitments: Vec<Vec<u8>>,
        blind_sig_requests: Vec<[u8; 32]>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum ServerMessage {
    /// Handshake response: component budget, fee schedule, offered tiers.
    ServerHello {
        num_components: u64,
        component_feerate: u64,
        min_excess_fee: u64,
        max_excess_fee: u64,
        tiers: Vec<u64>,
    },

    /// Informational pool fill levels while waiting.
    TierStatusUpdate { statuses: BTreeMap<u64, TierStatus> },

    /// A tier filled; covert endpoint and timing for the rounds to come.
    FusionBegin {
        tier: u64,
        covert_domain: Vec<u8>,
        covert_port: u16,
        covert_ssl: bool,
        server_time: u64,
    },

    /// Round opening: ephemeral round key and one blind nonce per component.
    StartRound {
        round_pubkey: [u8; 32],
        blind_nonce_points: Vec<[u8; 32]>,
        server_time: u64,
    },

    /// One blind signature scalar per submitted request, same order.
    BlindSigResponses { scalars: Vec<[u8; 32]> },

    /// Every participant's initial commitments, shuffled.
    AllCommitments { initial_commitments: Vec<Vec<u8>> },

    /// Every covertly received component, shuffled.
    ShareCovertComponents {
        components: Vec<Vec<u8>>,
        session_hash: Option<[u8; 32]>,
        skip_signatures: bool,
    },

    /// Terminal round verdict.
    FusionResult { ok: bool },
}

/// Messages delivered over anonymized one-shot connections.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum CovertMessage {
    Component {
        round_pubkey: [u8; 32],
        component: Vec<u8>,
        signature: Vec<u8>,
    },
    Signature {
        round_pubkey: [u8; 32],
        txsignature: Vec<u8>,
        which_input: u32,
    },
    /// Keepalive for a pre-warmed connection.
    Ping,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierStatus {
    pub players: u32,
    pub min_players: u32,
}

/// One atomic contribution to the shared transaction.
///
/// The serialized form of this struct is what gets committed to, covertly
/// submitted, and finally revealed by the server to all participants.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Component {
    /// SHA-256 of the salt whose preimage is revealed with the proof.
    pub salt_commitment: [u8; 32],
    pub payload: ComponentPayload,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum ComponentPayload {
    Input {
        prev_txid: [u8; 32],
        prev_index: u32,
        pubkey: Vec<u8>,
        amount: u64,
    },
    Output {
        scriptpubkey: Vec<u8>,
        amount: u64,
    },
    Blank,
}

/// The hashed commitment the server sees before any component is revealed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InitialCommitment {
    /// SHA-256(salt ‖ serialized component).
    pub salted_component_hash: [u8; 32],
    /// Compressed Pedersen commitment to the component's signed amount.
    pub amount_commitment: [u8; 32],
    /// Fresh per-component key for later addressed communication.
    pub communication_key: [u8; 32],
}

macro_rules! wire_codec {
    ($ty:ty) => {
        impl $ty {
            pub fn serialize(&self) -> Vec<u8> {
                bincode::serialize(self).expect("Serialization failed")
            }

            pub fn deserialize(bytes: &[u8]) -> Result<Self, FusionError> {
                bincode::deserialize(bytes)
                    .map_err(|e| FusionError::protocol(format!("undecodable message: {}", e)))
            }
        }
    };
}

wire_codec!(ClientMessage);
wire_codec!(ServerMessage);
wire_codec!(CovertMessage);
wire_codec!(Component);
wire_codec!(InitialCommitment);
