//! Blind Schnorr signature requests.
//!
//! The round coordinator publishes a signing key `P` and one nonce point
//! `R` per component. The requester blinds both the nonce and the
//! challenge, so the signer sees only an opaque scalar and can never link
//! the signature it later observes to the request it served:
//!
//! ```text
//! requester: R' = R + a·G + b·P        a, b fresh random
//!            e' = H(R' ‖ P ‖ m)
//!            e  = e' + b               → signer
//! signer:    s  = k + e·x              → requester
//! requester: s' = s + a                signature (R', s') over m
//! ```

use super::{challenge, decode_point, decode_scalar, schnorr};
use crate::error::FusionError;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;

/// An in-flight blind signature request: the wire-ready blinded challenge
/// plus the secret unblinding context.
pub struct BlindSignatureRequest {
    pubkey: RistrettoPoint,
    blinded_nonce: RistrettoPoint,
    a: Scalar,
    blinded_challenge: Scalar,
    message_hash: [u8; 32],
}

impl BlindSignatureRequest {
    pub fn new(
        pubkey: &[u8; 32],
        nonce_point: &[u8; 32],
        message_hash: [u8; 32],
    ) -> Result<Self, FusionError> {
        let pubkey = decode_point(pubkey)
            .ok_or_else(|| FusionError::crypto("invalid round public key"))?;
        let nonce = decode_point(nonce_point)
            .ok_or_else(|| FusionError::crypto("invalid blind nonce point"))?;

        let a = Scalar::random(&mut OsRng);
        let b = Scalar::random(&mut OsRng);
        let blinded_nonce = nonce + RistrettoPoint::mul_base(&a) + b * pubkey;
        let e = challenge(&blinded_nonce, &pubkey, &message_hash);

        Ok(Self {
            pubkey,
            blinded_nonce,
            a,
            blinded_challenge: e + b,
            message_hash,
        })
    }

    /// The blinded challenge scalar to submit to the signer.
    pub fn request(&self) -> [u8; 32] {
        self.blinded_challenge.to_bytes()
    }

    /// Unblind the signer's response into a signature over the original
    /// message, verifying it in the process.
    pub fn finalize(&self, server_scalar: &[u8; 32]) -> Result<[u8; 64], FusionError> {
        let s = decode_scalar(server_scalar)
            .ok_or_else(|| FusionError::crypto("non-canonical blind signature scalar"))?;
        let s_prime = s + self.a;

        let mut sig = [0u8; 64];
        sig[..32].copy_from_slice(self.blinded_nonce.compress().as_bytes());
        sig[32..].copy_from_slice(&s_prime.to_bytes());

        if !schnorr::verify(&self.pubkey.compress().to_bytes(), &self.message_hash, &sig) {
            return Err(FusionError::crypto("unblinded signature failed verification"));
        }
        Ok(sig)
    }
}

/// Signer side of the exchange. The protocol client never signs; this
/// exists for coordinator harnesses.
pub fn server_sign(secret: &Scalar, nonce: &Scalar, blinded_challenge: &[u8; 32]) -> Option<[u8; 32]> {
    let e = decode_scalar(blinded_challenge)?;
    Some((nonce + e * secret).to_bytes())
}
