/// Cryptographic operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("signing credential is empty")]
    EmptyCredential,

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid hex encoding: {0}")]
    InvalidEncoding(String),

    #[error("invalid secp256k1 secret key: {0}")]
    InvalidSecretKey(String),
}
