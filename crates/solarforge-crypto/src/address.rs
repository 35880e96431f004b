//! Signing credential → public settlement address.

use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint as _;

use crate::error::CryptoError;
use crate::hashing::keccak256;

/// Derives the public address a user is paid at on the settlement ledger.
///
/// Derivation must be deterministic: the same credential always yields the
/// same address.
pub trait AddressDeriver: Send + Sync {
    fn derive(&self, credential: &str) -> Result<String, CryptoError>;
}

/// EVM wallet derivation: the credential is a hex secp256k1 secret key and
/// the address is `keccak256(uncompressed_pubkey[1..])[12..]`, rendered with
/// the EIP-55 mixed-case checksum.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvmAddressDeriver;

impl EvmAddressDeriver {
    pub fn new() -> Self {
        Self
    }
}

impl AddressDeriver for EvmAddressDeriver {
    fn derive(&self, credential: &str) -> Result<String, CryptoError> {
        let key = parse_secret_key(credential)?;
        Ok(evm_address(&key))
    }
}

fn parse_secret_key(credential: &str) -> Result<SigningKey, CryptoError> {
    let trimmed = credential.trim();
    if trimmed.is_empty() {
        return Err(CryptoError::EmptyCredential);
    }
    let stripped = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(stripped).map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(CryptoError::InvalidKeyLength {
            expected: 32,
            actual: bytes.len(),
        });
    }
    SigningKey::from_slice(&bytes).map_err(|e| CryptoError::InvalidSecretKey(e.to_string()))
}

fn evm_address(key: &SigningKey) -> String {
    let encoded = key.verifying_key().to_encoded_point(false);
    // Skip the 0x04 prefix byte, hash the 64 bytes of (x, y).
    let hash = keccak256(&encoded.as_bytes()[1..]);
    checksum_address(&hash[12..])
}

/// EIP-55 rendering of a 20-byte address: a hex letter is uppercased when
/// the matching nibble of `keccak256(lowercase_hex)` is 8 or more.
pub fn checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());
    let mut out = String::with_capacity(lower.len() + 2);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        if nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}
