//! Frame cipher plugin
//!
//! The cipher is selected per cryptor and carried in every encrypted frame as
//! a one-byte tag, so a receiver can detect a sender configured with a
//! different algorithm instead of silently producing garbage.

mod cbc;
mod gcm;

use std::{fmt, str::FromStr};

pub use cbc::CBC_TAG_SIZE;
pub use gcm::GCM_TAG_SIZE;

use crate::{error::CipherError, keys::FrameKey};

/// Symmetric cipher used to encrypt frame bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    /// AES-128-GCM with a 12-byte IV and 16-byte tag
    #[default]
    AesGcm,
    /// AES-128-CBC with a 16-byte IV, PKCS#7 padding and a 16-byte
    /// HMAC-SHA256 tag
    AesCbc,
}

impl Algorithm {
    /// Tag written into the frame trailer.
    pub const fn tag(self) -> u8 {
        match self {
            Self::AesGcm => 0x01,
            Self::AesCbc => 0x02,
        }
    }

    /// Parse a trailer tag.
    pub fn from_tag(tag: u8) -> Result<Self, CipherError> {
        match tag {
            0x01 => Ok(Self::AesGcm),
            0x02 => Ok(Self::AesCbc),
            other => Err(CipherError::UnsupportedAlgorithm(format!("tag {other:#04x}"))),
        }
    }

    /// IV length in bytes.
    pub const fn iv_len(self) -> usize {
        match self {
            Self::AesGcm => gcm::IV_SIZE,
            Self::AesCbc => cbc::IV_SIZE,
        }
    }

    /// Encrypt `plaintext`.
    ///
    /// `aad` is authenticated by both ciphers.
    pub fn seal(
        self,
        key: &FrameKey,
        iv: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CipherError> {
        match self {
            Self::AesGcm => gcm::seal(key, iv, aad, plaintext),
            Self::AesCbc => cbc::seal(key, iv, aad, plaintext),
        }
    }

    /// Decrypt `ciphertext`.
    ///
    /// # Errors
    ///
    /// - `DecryptionFailed`: tag mismatch, bad padding or length
    /// - `InvalidIvLength`: IV does not match [`Self::iv_len`]
    pub fn open(
        self,
        key: &FrameKey,
        iv: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CipherError> {
        match self {
            Self::AesGcm => gcm::open(key, iv, aad, ciphertext),
            Self::AesCbc => cbc::open(key, iv, aad, ciphertext),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AesGcm => f.write_str("aes-gcm"),
            Self::AesCbc => f.write_str("aes-cbc"),
        }
    }
}

impl FromStr for Algorithm {
    type Err = CipherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aes-gcm" | "aesgcm" | "gcm" => Ok(Self::AesGcm),
            "aes-cbc" | "aescbc" | "cbc" => Ok(Self::AesCbc),
            _ => Err(CipherError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl TryFrom<u8> for Algorithm {
    type Error = CipherError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Self::from_tag(tag)
    }
}
