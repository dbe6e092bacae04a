//! Pedersen amount commitments.
//!
//! A commitment is `C = amount · H + nonce · G` with `G` the Ristretto
//! basepoint and `H` derived by hash-to-curve from a fixed domain string, so
//! the discrete log between the generators is unknown. Commitments are
//! hiding, binding, and additively homomorphic: the component generator
//! relies on `Σ Cᵢ` opening to `(Σ amountᵢ, Σ nonceᵢ)`.

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use sha2::{Digest, Sha512};

/// Domain input for the amount generator.
const AMOUNT_GENERATOR_DOMAIN: &[u8] = b"CashFusion gives us fungibility.";

/// The blinding generator `G`.
pub fn blinding_generator() -> RistrettoPoint {
    RISTRETTO_BASEPOINT_POINT
}

/// The amount generator `H`, independent of `G`.
pub fn amount_generator() -> RistrettoPoint {
    let mut hasher = Sha512::new();
    hasher.update(AMOUNT_GENERATOR_DOMAIN);
    RistrettoPoint::from_hash(hasher)
}

/// Map a signed amount onto the scalar field. Inputs commit positive,
/// outputs negative, blanks zero.
pub fn signed_scalar(amount: i128) -> Scalar {
    if amount >= 0 {
        Scalar::from(amount as u64)
    } else {
        -Scalar::from(amount.unsigned_abs() as u64)
    }
}

/// A commitment together with the nonce that opens it.
#[derive(Clone, Debug)]
pub struct Commitment {
    pub point: RistrettoPoint,
    pub nonce: Scalar,
}

impl Commitment {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.point.compress().to_bytes()
    }
}

/// Commit to a signed amount with a fresh random nonce.
pub fn commit(amount: i64) -> Commitment {
    let nonce = Scalar::random(&mut OsRng);
    Commitment {
        point: commit_with_nonce(amount, &nonce),
        nonce,
    }
}

/// Commit to a signed amount with a caller-chosen nonce.
pub fn commit_with_nonce(amount: i64, nonce: &Scalar) -> RistrettoPoint {
    signed_scalar(amount as i128) * amount_generator() + nonce * blinding_generator()
}

/// Check that a set of commitments opens, in aggregate, to the claimed
/// amount sum under the claimed nonce sum.
pub fn verify_sum(commitments: &[RistrettoPoint], amount_sum: i128, nonce_sum: &Scalar) -> bool {
    let total: RistrettoPoint = commitments.iter().sum();
    total == signed_scalar(amount_sum) * amount_generator() + nonce_sum * blinding_generator()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generators_are_independent() {
        assert_ne!(amount_generator(), blinding_generator());
    }

    #[test]
    fn signed_scalar_negation() {
        assert_eq!(signed_scalar(-5), -signed_scalar(5));
        assert_eq!(signed_scalar(0), Scalar::ZERO);
        assert_eq!(signed_scalar(7) + signed_scalar(-7), Scalar::ZERO);
    }

    #[test]
    fn commitment_opens_with_its_nonce() {
        let c = commit(42);
        assert_eq!(c.point, commit_with_nonce(42, &c.nonce));
        assert_ne!(c.point, commit_with_nonce(43, &c.nonce));
    }

    #[test]
    fn same_amount_different_nonces_differ() {
        assert_ne!(commit(1000).to_bytes(), commit(1000).to_bytes());
    }

    #[test]
    fn additively_homomorphic() {
        let a = commit(70_000);
        let b = commit(-50_000);
        let c = commit(-19_000);

        let amount_sum = 70_000 - 50_000 - 19_000;
        let nonce_sum = a.nonce + b.nonce + c.nonce;
        let points = [a.point, b.point, c.point];
        assert!(verify_sum(&points, amount_sum, &nonce_sum));
        assert!(!verify_sum(&points, amount_sum + 1, &nonce_sum));
        assert!(!verify_sum(&points, amount_sum, &(nonce_sum + Scalar::ONE)));
    }

    #[test]
    fn zero_amount_commits_to_nonce_only() {
        let c = commit(0);
        assert_eq!(c.point, &c.nonce * blinding_generator());
    }
}
