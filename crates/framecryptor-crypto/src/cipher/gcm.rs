//! AES-128-GCM frame cipher

use aes_gcm::{
    Aes128Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};

use crate::{error::CipherError, keys::FrameKey};

/// GCM IV size (96 bits)
pub(super) const IV_SIZE: usize = 12;

/// GCM authentication tag size (16 bytes)
pub const GCM_TAG_SIZE: usize = 16;

pub(super) fn seal(
    key: &FrameKey,
    iv: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CipherError> {
    check_iv(iv)?;
    let cipher = Aes128Gcm::new(key.as_bytes().into());

    cipher
        .encrypt(Nonce::from_slice(iv), Payload { msg: plaintext, aad })
        .map_err(|_| CipherError::EncryptionFailed { reason: "aes-gcm rejected the input" })
}

pub(super) fn open(
    key: &FrameKey,
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CipherError> {
    check_iv(iv)?;
    if ciphertext.len() < GCM_TAG_SIZE {
        return Err(CipherError::DecryptionFailed { reason: "ciphertext shorter than tag" });
    }

    let cipher = Aes128Gcm::new(key.as_bytes().into());

    cipher
        .decrypt(Nonce::from_slice(iv), Payload { msg: ciphertext, aad })
        .map_err(|_| CipherError::DecryptionFailed { reason: "authentication failed" })
}

fn check_iv(iv: &[u8]) -> Result<(), CipherError> {
    if iv.len() == IV_SIZE {
        Ok(())
    } else {
        Err(CipherError::InvalidIvLength { expected: IV_SIZE, actual: iv.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> FrameKey {
        FrameKey::from_bytes([7u8; 16])
    }

    #[test]
    fn ciphertext_carries_tag() {
        let sealed = seal(&key(), &[0u8; IV_SIZE], &[], b"test message").unwrap();
        assert_eq!(sealed.len(), b"test message".len() + GCM_TAG_SIZE);
    }

    #[test]
    fn truncated_ciphertext_fails() {
        let result = open(&key(), &[0u8; IV_SIZE], &[], &[0u8; GCM_TAG_SIZE - 1]);
        assert!(matches!(result, Err(CipherError::DecryptionFailed { .. })));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let mut sealed = seal(&key(), &[0u8; IV_SIZE], &[], b"original message").unwrap();
        sealed[0] ^= 0xFF;

        assert!(open(&key(), &[0u8; IV_SIZE], &[], &sealed).is_err());
    }

    #[test]
    fn different_ivs_produce_different_ciphertexts() {
        let a = seal(&key(), &[0x00; IV_SIZE], &[], b"test").unwrap();
        let b = seal(&key(), &[0xFF; IV_SIZE], &[], b"test").unwrap();

        assert_ne!(a, b);
    }
}
