//! Error types for cipher and key derivation operations

use thiserror::Error;

/// Errors from frame cipher and ratchet operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// Algorithm tag or name is not one we implement
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// IV has the wrong length for the cipher
    #[error("invalid iv length: expected {expected}, got {actual}")]
    InvalidIvLength {
        /// Expected IV length
        expected: usize,
        /// Actual IV length
        actual: usize,
    },

    /// Cipher refused to encrypt
    #[error("encryption failed: {reason}")]
    EncryptionFailed {
        /// Reason for encryption failure
        reason: &'static str,
    },

    /// Authentication tag mismatch, bad padding or truncated ciphertext
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Reason for decryption failure
        reason: &'static str,
    },

    /// Ratchet generation would overflow
    #[error("ratchet generation overflow at {current}")]
    GenerationOverflow {
        /// Current generation when overflow was detected
        current: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CipherError::InvalidIvLength { expected: 12, actual: 3 };
        assert_eq!(err.to_string(), "invalid iv length: expected 12, got 3");
    }
}
