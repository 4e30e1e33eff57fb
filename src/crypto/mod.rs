//! Server-side encryption of uploaded files.

use serde::{Serialize, Serializer};

pub mod envelope;

pub use envelope::{CodecError, EnvelopeCodec};

/// Cipher key size in bytes (AES-256)
pub const KEY_SIZE: usize = 32;

/// CBC initialization vector size in bytes
pub const IV_SIZE: usize = 16;

/// A 16-byte initialization vector, stored as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iv([u8; IV_SIZE]);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IvError {
    #[error("iv is not valid hex")]
    InvalidHex,

    #[error("iv must be {IV_SIZE} bytes, got {0}", IV_SIZE = IV_SIZE)]
    WrongLength(usize),
}

impl Iv {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IvError> {
        let array: [u8; IV_SIZE] = bytes
            .try_into()
            .map_err(|_| IvError::WrongLength(bytes.len()))?;
        Ok(Self(array))
    }

    pub fn from_hex(s: &str) -> Result<Self, IvError> {
        let bytes = hex::decode(s).map_err(|_| IvError::InvalidHex)?;
        Self::from_slice(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.0
    }
}

impl Serialize for Iv {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl From<[u8; IV_SIZE]> for Iv {
    fn from(bytes: [u8; IV_SIZE]) -> Self {
        Self(bytes)
    }
}
