//! AES-128-CBC frame cipher (PKCS#7 padding, encrypt-then-MAC)
//!
//! CBC padding alone cannot tell a wrong key from the right one: roughly one
//! wrong key in 256 still yields valid padding. Every sealed body therefore
//! ends in a truncated HMAC-SHA256 tag over `aad || iv || ciphertext`, keyed
//! by a MAC key derived from the frame key. The tag is checked before any
//! block is decrypted.
//!
//! ```text
//! ┌──────────────────────────────┬──────────────┐
//! │ ciphertext (PKCS#7 padded)   │ tag (16)     │
//! └──────────────────────────────┴──────────────┘
//! ```

use aes::Aes128;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{error::CipherError, keys::FrameKey};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type HmacSha256 = Hmac<Sha256>;

/// CBC IV size (one AES block)
pub(super) const IV_SIZE: usize = 16;

/// Truncated HMAC-SHA256 tag appended to CBC ciphertext
pub const CBC_TAG_SIZE: usize = 16;

const BLOCK_SIZE: usize = 16;

/// Label separating the MAC key from the encryption key
const MAC_KEY_LABEL: &[u8] = b"FrameCryptorCbcMacV1";

pub(super) fn seal(
    key: &FrameKey,
    iv: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let encryptor = Aes128CbcEnc::new_from_slices(key.as_bytes(), iv)
        .map_err(|_| CipherError::InvalidIvLength { expected: IV_SIZE, actual: iv.len() })?;

    let mut sealed = encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    let tag = authenticator(key, iv, aad, &sealed).finalize().into_bytes();
    sealed.extend_from_slice(&tag[..CBC_TAG_SIZE]);
    Ok(sealed)
}

pub(super) fn open(
    key: &FrameKey,
    iv: &[u8],
    aad: &[u8],
    sealed: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let decryptor = Aes128CbcDec::new_from_slices(key.as_bytes(), iv)
        .map_err(|_| CipherError::InvalidIvLength { expected: IV_SIZE, actual: iv.len() })?;

    let Some(split) = sealed.len().checked_sub(CBC_TAG_SIZE) else {
        return Err(CipherError::DecryptionFailed { reason: "ciphertext shorter than tag" });
    };
    let (ciphertext, tag) = sealed.split_at(split);
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CipherError::DecryptionFailed { reason: "ciphertext is not block aligned" });
    }

    authenticator(key, iv, aad, ciphertext)
        .verify_truncated_left(tag)
        .map_err(|_| CipherError::DecryptionFailed { reason: "authentication failed" })?;

    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CipherError::DecryptionFailed { reason: "invalid padding" })
}

/// HMAC over everything the receiver relies on, before finalization.
fn authenticator(key: &FrameKey, iv: &[u8], aad: &[u8], ciphertext: &[u8]) -> HmacSha256 {
    let mac_key = mac_key(key);
    let Ok(mut mac) = HmacSha256::new_from_slice(mac_key.as_slice()) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(aad);
    mac.update(iv);
    mac.update(ciphertext);
    mac
}

fn mac_key(key: &FrameKey) -> Zeroizing<Vec<u8>> {
    let Ok(mut mac) = HmacSha256::new_from_slice(key.as_bytes()) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(MAC_KEY_LABEL);
    Zeroizing::new(mac.finalize().into_bytes().to_vec())
}
