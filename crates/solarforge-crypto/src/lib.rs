//! SolarForge Crypto — settlement address derivation and Keccak hashing.

pub mod address;
pub mod error;
pub mod hashing;

pub use address::{checksum_address, AddressDeriver, EvmAddressDeriver};
pub use error::CryptoError;
pub use hashing::{keccak256, keccak256_hex, Hash};
