use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hash a byte slice with SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Concatenate two byte slices and hash them with SHA-256.
pub fn sha256_concat(a: &[u8], b: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(a);
    hasher.update(b);
    hasher.finalize().into()
}

/// Append `data` to `buf` behind a 4-byte big-endian length prefix.
///
/// Every variable-length field in the session transcript is framed this way
/// so that no two field sequences can collide.
pub fn push_prefixed(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
    buf.extend_from_slice(data);
}

/// Short display: first 8 hex chars + "…" + last 4 hex chars.
pub fn short_hex(bytes: &[u8; 32]) -> String {
    let h = hex::encode(bytes);
    format!("{}…{}", &h[..8], &h[60..])
}

/// Reference to a prior transaction output.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Outpoint {
    pub txid: [u8; 32],
    pub index: u32,
}

/// An owned spendable output contributed to a fusion session.
///
/// Supplied once at session creation and immutable afterwards. The owning
/// key stays inside the wallet collaborator; only the public key travels
/// with the coin.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Coin {
    pub outpoint: Outpoint,
    pub value: u64,
    pub pubkey: Vec<u8>,
}

/// Observable state of one tier pool while waiting for a fusion to begin.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolStatus {
    pub tier: u64,
    pub players: u32,
    pub min_players: u32,
}

/// Progress marker for an in-flight fusion session.
///
/// Strictly advances within a round and resets to `NotFusing` when a round
/// aborts or the session ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FusionStatus {
    NotFusing,
    GeneratingComponents,
    MakingCommitments,
    SubmittingCommitments,
    ProducingBlindSignatures,
    CovertlySendingComponents,
    ReceivingAllCommitments,
    ReceivingAllComponents,
    Signing,
    CovertlySendingSignatures,
    Fused,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_deterministic() {
        assert_eq!(sha256(b"hello"), sha256(b"hello"));
        assert_ne!(sha256(b"hello"), sha256(b"world"));
    }

    #[test]
    fn sha256_concat_not_commutative() {
        assert_ne!(sha256_concat(b"alpha", b"beta"), sha256_concat(b"beta", b"alpha"));
    }

    #[test]
    fn sha256_concat_vs_manual() {
        let mut joined = Vec::new();
        joined.extend_from_slice(b"foo");
        joined.extend_from_slice(b"bar");
        assert_eq!(sha256_concat(b"foo", b"bar"), sha256(&joined));
    }

    #[test]
    fn push_prefixed_layout() {
        let mut buf = Vec::new();
        push_prefixed(&mut buf, b"abc");
        assert_eq!(buf, vec![0, 0, 0, 3, b'a', b'b', b'c']);

        push_prefixed(&mut buf, b"");
        assert_eq!(&buf[7..], &[0, 0, 0, 0]);
    }

    #[test]
    fn prefixed_fields_do_not_collide() {
        // ("ab", "c") and ("a", "bc") must frame differently.
        let mut one = Vec::new();
        push_prefixed(&mut one, b"ab");
        push_prefixed(&mut one, b"c");
        let mut two = Vec::new();
        push_prefixed(&mut two, b"a");
        push_prefixed(&mut two, b"bc");
        assert_ne!(one, two);
    }

    #[test]
    fn short_hex_format() {
        let bytes = [0xab; 32];
        assert_eq!(short_hex(&bytes), "abababab…abab");
    }
}
