//! Error types for key management, frame parsing and cryptor construction.
//!
//! Strongly-typed errors per layer: key provisioning errors are returned to
//! the caller, transform errors are classified into a [`CryptionState`] and
//! never leave the cryptor, and construction errors prevent a cryptor from
//! existing at all.

use framecryptor_crypto::{Algorithm, CipherError};
use thiserror::Error;

use crate::observer::CryptionState;

/// Errors from key provisioning and ratcheting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Key index outside the configured key ring
    #[error("key index {index} outside key ring of size {ring_size}")]
    InvalidIndex {
        /// Requested index
        index: i32,
        /// Configured ring size
        ring_size: usize,
    },

    /// No key material at the requested slot
    #[error("no key material at index {index}")]
    MissingKey {
        /// Requested index
        index: i32,
    },

    /// Slot cannot be ratcheted any further; provision a fresh key
    #[error("ratchet exhausted at index {index} (generation {generation})")]
    RatchetExhausted {
        /// Slot index
        index: i32,
        /// Generation at which ratcheting stopped
        generation: u32,
    },

    /// Provider options are inconsistent
    #[error("invalid key provider options: {reason}")]
    InvalidOptions {
        /// What is wrong with the options
        reason: &'static str,
    },
}

/// Structural problems with an encrypted frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedFrame {
    /// Frame too short to hold a trailer
    #[error("frame too short: {len} bytes, need at least {min}")]
    TooShort {
        /// Frame length
        len: usize,
        /// Minimum length
        min: usize,
    },

    /// Header or IV lengths in the trailer overrun the frame
    #[error("truncated frame: {len} bytes cannot hold header {header_len} and iv {iv_len}")]
    Truncated {
        /// Frame length
        len: usize,
        /// Declared clear header length
        header_len: usize,
        /// Declared IV length
        iv_len: usize,
    },

    /// Trailer names an algorithm we do not implement
    #[error("unknown algorithm tag {0:#04x}")]
    UnknownAlgorithm(u8),

    /// Trailer IV length does not match the algorithm
    #[error("iv length {actual} does not match algorithm (expected {expected})")]
    IvLength {
        /// IV length required by the algorithm
        expected: usize,
        /// IV length declared in the trailer
        actual: usize,
    },
}

/// Per-frame transform failures.
///
/// These never propagate to the media pipeline. The frame is dropped and the
/// error is reduced to a [`CryptionState`] via [`TransformError::state`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// No key material for the participant at the index
    #[error("no key material at index {key_index}")]
    MissingKey {
        /// Key index that was looked up
        key_index: i32,
    },

    /// Key index outside the key ring
    #[error("key index {key_index} outside key ring of size {ring_size}")]
    InvalidKeyIndex {
        /// Key index that was requested
        key_index: i32,
        /// Configured ring size
        ring_size: usize,
    },

    /// Cipher refused to encrypt
    #[error("encryption failed: {0}")]
    EncryptionFailed(#[source] CipherError),

    /// Neither the current key nor any ratchet step within the window
    /// decrypted the frame
    #[error("decryption failed at key index {key_index} after {attempts} attempts")]
    DecryptionFailed {
        /// Key index carried by the frame
        key_index: u8,
        /// Keys tried (current generation plus ratchet steps)
        attempts: u32,
    },

    /// Frame was encrypted with a different algorithm than configured
    #[error("algorithm mismatch: configured {configured}, frame uses {received}")]
    AlgorithmMismatch {
        /// Algorithm this cryptor was built with
        configured: Algorithm,
        /// Algorithm named by the frame trailer
        received: Algorithm,
    },

    /// Key handler exceeded its failure tolerance and waits for a new key
    #[error("key at index {key_index} invalidated after repeated decryption failures")]
    KeyInvalidated {
        /// Key index carried by the frame
        key_index: u8,
    },

    /// Frame metadata is unusable
    #[error("malformed frame: {0}")]
    Malformed(#[from] MalformedFrame),
}

impl TransformError {
    /// Outcome kind reported to observers.
    pub fn state(&self) -> CryptionState {
        match self {
            Self::MissingKey { .. } => CryptionState::MissingKey,
            Self::EncryptionFailed(_) => CryptionState::EncryptionFailed,
            Self::DecryptionFailed { .. }
            | Self::AlgorithmMismatch { .. }
            | Self::KeyInvalidated { .. } => CryptionState::DecryptionFailed,
            Self::InvalidKeyIndex { .. } | Self::Malformed(_) => CryptionState::InternalError,
        }
    }
}

/// Errors that prevent a frame cryptor from being constructed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptorError {
    /// Participant identity is empty
    #[error("participant identity must not be empty")]
    EmptyParticipant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_maps_to_missing_key_state() {
        assert_eq!(TransformError::MissingKey { key_index: 0 }.state(), CryptionState::MissingKey);
    }

    #[test]
    fn decrypt_side_failures_map_to_decryption_failed() {
        let errors = [
            TransformError::DecryptionFailed { key_index: 0, attempts: 3 },
            TransformError::AlgorithmMismatch {
                configured: Algorithm::AesGcm,
                received: Algorithm::AesCbc,
            },
            TransformError::KeyInvalidated { key_index: 1 },
        ];

        for err in errors {
            assert_eq!(err.state(), CryptionState::DecryptionFailed, "{err}");
        }
    }

    #[test]
    fn malformed_metadata_is_internal_error() {
        let err = TransformError::from(MalformedFrame::UnknownAlgorithm(0x7F));
        assert_eq!(err.state(), CryptionState::InternalError);

        let err = TransformError::InvalidKeyIndex { key_index: 99, ring_size: 16 };
        assert_eq!(err.state(), CryptionState::InternalError);
    }

    #[test]
    fn encryption_failure_state() {
        let err = TransformError::EncryptionFailed(CipherError::EncryptionFailed {
            reason: "aes-gcm rejected the input",
        });
        assert_eq!(err.state(), CryptionState::EncryptionFailed);
    }

    #[test]
    fn error_display() {
        insta::assert_snapshot!(
            KeyError::InvalidIndex { index: 300, ring_size: 16 },
            @"key index 300 outside key ring of size 16"
        );
        insta::assert_snapshot!(
            MalformedFrame::UnknownAlgorithm(0x7F),
            @"unknown algorithm tag 0x7f"
        );
        insta::assert_snapshot!(
            TransformError::DecryptionFailed { key_index: 2, attempts: 17 },
            @"decryption failed at key index 2 after 17 attempts"
        );
    }
}
