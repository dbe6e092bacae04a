//! Per-round component generation.
//!
//! Every round each participant contributes exactly the server's component
//! budget: one component per input, one per planned output, and blanks to
//! pad the count. Each component carries a Pedersen commitment to its
//! signed amount (inputs positive net of fee, outputs negative net of fee,
//! blanks zero), a fresh salt, and a fresh communication key. The
//! commitment set sums to the round's excess fee, provable from the
//! aggregate nonce without revealing any individual amount.

use crate::crypto::{pedersen, schnorr};
use crate::message::{Component, ComponentPayload, InitialCommitment};
use crate::params;
use crate::types::{sha256, sha256_concat, Coin};
use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use rand::RngCore;

/// One generated component with everything needed to later prove it.
pub struct GeneratedComponent {
    /// Serialized [`Component`]; hashed for the blind signature request and
    /// covertly revealed.
    pub comp_ser: Vec<u8>,
    /// Serialized [`InitialCommitment`]; submitted with `PlayerCommit`.
    pub commit_ser: Vec<u8>,
    pub salt: [u8; 32],
    pub pedersen_nonce: Scalar,
    pub communication_key: schnorr::Keypair,
}

/// The full component set for one round, in canonical order.
pub struct GeneratedComponents {
    pub components: Vec<GeneratedComponent>,
    /// Must equal the round's excess fee exactly.
    pub sum_amounts: i128,
    /// Aggregate Pedersen nonce, reduced mod the group order.
    pub pedersen_total_nonce: Scalar,
}

/// Generate all components for a round.
///
/// `outputs` pairs each bound script with its planned amount. The returned
/// list is sorted by serialized component bytes, a canonical key unrelated
/// to generation or submission order, so aggregation is deterministic.
pub fn generate_components(
    num_blanks: u64,
    inputs: &[Coin],
    outputs: &[(Vec<u8>, u64)],
    component_feerate: u64,
) -> GeneratedComponents {
    let mut payloads: Vec<(ComponentPayload, i128)> = Vec::new();

    for coin in inputs {
        let fee = params::component_fee(
            params::input_component_size(coin.pubkey.len()),
            component_feerate,
        );
        payloads.push((
            ComponentPayload::Input {
                prev_txid: coin.outpoint.txid,
                prev_index: coin.outpoint.index,
                pubkey: coin.pubkey.clone(),
                amount: coin.value,
            },
            coin.value as i128 - fee as i128,
        ));
    }

    for (script, value) in outputs {
        let fee = params::component_fee(
            params::output_component_size(script.len()),
            component_feerate,
        );
        payloads.push((
            ComponentPayload::Output {
                scriptpubkey: script.clone(),
                amount: *value,
            },
            -(*value as i128) - fee as i128,
        ));
    }

    for _ in 0..num_blanks {
        payloads.push((ComponentPayload::Blank, 0));
    }

    let mut components = Vec::with_capacity(payloads.len());
    let mut sum_nonce = Scalar::ZERO;
    let mut sum_amounts: i128 = 0;

    for (payload, signed_amount) in payloads {
        let mut salt = [0u8; 32];
        OsRng.fill_bytes(&mut salt);

        let component = Component {
            salt_commitment: sha256(&salt),
            payload,
        };
        let comp_ser = component.serialize();

        let commitment = pedersen::commit(signed_amount as i64);
        sum_nonce += commitment.nonce;
        sum_amounts += signed_amount;

        let communication_key = schnorr::Keypair::generate();
        let initial = InitialCommitment {
            salted_component_hash: sha256_concat(&salt, &comp_ser),
            amount_commitment: commitment.to_bytes(),
            communication_key: communication_key.public_bytes(),
        };

        components.push(GeneratedComponent {
            comp_ser,
            commit_ser: initial.serialize(),
            salt,
            pedersen_nonce: commitment.nonce,
            communication_key,
        });
    }

    components.sort_by(|a, b| a.comp_ser.cmp(&b.comp_ser));

    GeneratedComponents {
        components,
        sum_amounts,
        pedersen_total_nonce: sum_nonce,
    }
}
