use sha3::{Digest, Keccak256};

/// Keccak-256 hash (32 bytes).
pub type Hash = [u8; 32];

/// Hash arbitrary data using Keccak-256.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `0x`-prefixed hex encoding of a Keccak-256 digest.
pub fn keccak256_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(keccak256(data)))
}
