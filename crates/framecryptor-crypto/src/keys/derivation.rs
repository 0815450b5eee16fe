//! Frame key derivation (HKDF) and ratchet step (HMAC)

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Label used for frame key derivation
const FRAME_KEY_LABEL: &[u8] = b"FrameCryptorKeyV1";

/// Label used for the ratchet step
const RATCHET_LABEL: &[u8] = b"FrameCryptorRatchetV1";

/// Size of a derived AES-128 frame key
pub const FRAME_KEY_SIZE: usize = 16;

/// Size of ratcheted key material
pub const RATCHET_MATERIAL_SIZE: usize = 32;

/// Derive the AES frame key for one generation of key material.
///
/// The ratchet salt doubles as the HKDF salt, so providers configured with
/// different salts never share frame keys even when handed the same raw
/// material.
///
/// # Security
///
/// - Deterministic: same inputs always produce same output
/// - Material of any length (including empty) is accepted
pub fn derive_frame_key(material: &[u8], salt: &[u8]) -> [u8; FRAME_KEY_SIZE] {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), material);

    let mut key = [0u8; FRAME_KEY_SIZE];
    let Ok(()) = hkdf.expand(FRAME_KEY_LABEL, &mut key) else {
        unreachable!("16 bytes is a valid HKDF-SHA256 output length");
    };

    key
}

/// Derive the next generation of key material.
///
/// `next = HMAC-SHA256(material, label || salt)`. One-way: knowing `next`
/// reveals nothing about `material`.
pub fn ratchet_material(material: &[u8], salt: &[u8]) -> [u8; RATCHET_MATERIAL_SIZE] {
    let Ok(mut mac) = HmacSha256::new_from_slice(material) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(RATCHET_LABEL);
    mac.update(salt);
    let result = mac.finalize().into_bytes();

    let mut next = [0u8; RATCHET_MATERIAL_SIZE];
    next.copy_from_slice(&result);
    next
}
