//! Plain Schnorr signatures over Ristretto.
//!
//! Used for settlement input signing and as the verification half of the
//! blind scheme. Signatures are 64 bytes: compressed nonce point followed
//! by the response scalar.

use super::challenge;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use sha2::{Digest, Sha512};

const KEY_DOMAIN_TAG: &[u8] = b"CashFusion key";
const NONCE_DOMAIN_TAG: &[u8] = b"CashFusion signing nonce";

#[derive(Clone, Debug)]
pub struct Keypair {
    secret: Scalar,
    public: RistrettoPoint,
}

impl Keypair {
    pub fn generate() -> Self {
        Self::from_secret(Scalar::random(&mut OsRng))
    }

    pub fn from_secret(secret: Scalar) -> Self {
        let public = RistrettoPoint::mul_base(&secret);
        Self { secret, public }
    }

    /// Derive a keypair deterministically from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let mut hasher = Sha512::new();
        hasher.update(KEY_DOMAIN_TAG);
        hasher.update(seed);
        Self::from_secret(Scalar::from_hash(hasher))
    }

    pub fn secret(&self) -> &Scalar {
        &self.secret
    }

    pub fn public(&self) -> &RistrettoPoint {
        &self.public
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.public.compress().to_bytes()
    }

    /// Sign a message with a deterministic nonce.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        let mut hasher = Sha512::new();
        hasher.update(NONCE_DOMAIN_TAG);
        hasher.update(self.secret.to_bytes());
        hasher.update(message);
        let k = Scalar::from_hash(hasher);

        let nonce_point = RistrettoPoint::mul_base(&k);
        let e = challenge(&nonce_point, &self.public, message);
        let s = k + e * self.secret;

        let mut sig = [0u8; 64];
        sig[..32].copy_from_slice(nonce_point.compress().as_bytes());
        sig[32..].copy_from_slice(&s.to_bytes());
        sig
    }
}

/// Verify a 64-byte signature against a compressed public key.
pub fn verify(pubkey: &[u8; 32], message: &[u8], sig: &[u8; 64]) -> bool {
    let mut nonce_bytes = [0u8; 32];
    nonce_bytes.copy_from_slice(&sig[..32]);
    let mut s_bytes = [0u8; 32];
    s_bytes.copy_from_slice(&sig[32..]);

    let (Some(public), Some(nonce_point), Some(s)) = (
        super::decode_point(pubkey),
        super::decode_point(&nonce_bytes),
        super::decode_scalar(&s_bytes),
    ) else {
        return false;
    };

    let e = challenge(&nonce_point, &public, message);
    RistrettoPoint::mul_base(&s) == nonce_point + e * public
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"settle this");
        assert!(verify(&kp.public_bytes(), b"settle this", &sig));
    }

    #[test]
    fn wrong_message_fails() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"settle this");
        assert!(!verify(&kp.public_bytes(), b"settle that", &sig));
    }

    #[test]
    fn wrong_key_fails() {
        let kp = Keypair::generate();
        let other = Keypair::generate();
        let sig = kp.sign(b"settle this");
        assert!(!verify(&other.public_bytes(), b"settle this", &sig));
    }

    #[test]
    fn corrupted_signature_fails() {
        let kp = Keypair::generate();
        let mut sig = kp.sign(b"settle this");
        sig[40] ^= 1;
        assert!(!verify(&kp.public_bytes(), b"settle this", &sig));
    }

    #[test]
    fn seed_derivation_deterministic() {
        let a = Keypair::from_seed(&[9; 32]);
        let b = Keypair::from_seed(&[9; 32]);
        assert_eq!(a.public_bytes(), b.public_bytes());
        assert_ne!(a.public_bytes(), Keypair::from_seed(&[10; 32]).public_bytes());
    }

    #[test]
    fn signing_is_deterministic() {
        let kp = Keypair::from_seed(&[3; 32]);
        assert_eq!(kp.sign(b"m"), kp.sign(b"m"));
    }
}
