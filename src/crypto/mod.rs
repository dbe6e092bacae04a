//! Cryptographic primitives for the fusion protocol.
//!
//! Everything operates over the Ristretto group. [`pedersen`] provides the
//! additively homomorphic amount commitments, [`blind`] the blind
//! Schnorr request/finalize pair used against the round key, and
//! [`schnorr`] plain signing for settlement inputs. All three share one
//! Fiat–Shamir challenge so a signature unblinded by [`blind`] verifies
//! under [`schnorr::verify`].

pub mod blind;
pub mod pedersen;
pub mod schnorr;

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use sha2::{Digest, Sha512};

const CHALLENGE_DOMAIN_TAG: &[u8] = b"CashFusion Schnorr challenge";

pub(crate) fn decode_point(bytes: &[u8; 32]) -> Option<RistrettoPoint> {
    CompressedRistretto(*bytes).decompress()
}

pub(crate) fn decode_scalar(bytes: &[u8; 32]) -> Option<Scalar> {
    Scalar::from_canonical_bytes(*bytes).into()
}

/// Challenge scalar binding the nonce point, the signer key, and the message.
pub(crate) fn challenge(
    nonce: &RistrettoPoint,
    pubkey: &RistrettoPoint,
    message: &[u8],
) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(CHALLENGE_DOMAIN_TAG);
    hasher.update(nonce.compress().as_bytes());
    hasher.update(pubkey.compress().as_bytes());
    hasher.update(message);
    Scalar::from_hash(hasher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn point_codec_round_trip() {
        let p = RistrettoPoint::mul_base(&Scalar::random(&mut OsRng));
        let bytes = p.compress().to_bytes();
        assert_eq!(decode_point(&bytes), Some(p));
    }

    #[test]
    fn non_canonical_scalar_rejected() {
        // The group order minus nothing: all-0xff is far above the order.
        assert!(decode_scalar(&[0xff; 32]).is_none());
    }

    #[test]
    fn challenge_depends_on_every_input() {
        let p = RistrettoPoint::mul_base(&Scalar::random(&mut OsRng));
        let q = RistrettoPoint::mul_base(&Scalar::random(&mut OsRng));
        let e = challenge(&p, &q, b"m");
        assert_ne!(e, challenge(&q, &p, b"m"));
        assert_ne!(e, challenge(&p, &q, b"n"));
    }
}
