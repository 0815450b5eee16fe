//! Key material for one key slot generation
//!
//! # Security Properties
//!
//! - Material and derived keys are zeroized on drop
//! - Ratcheting is deterministic: same material and salt, same successor
//! - Generations only increase

use std::fmt;

use zeroize::{Zeroize, Zeroizing};

use super::derivation::{FRAME_KEY_SIZE, derive_frame_key, ratchet_material};
use crate::error::CipherError;

/// AES-128 key derived from one generation of key material.
#[derive(Clone)]
pub struct FrameKey {
    key: [u8; FRAME_KEY_SIZE],
}

impl FrameKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(key: [u8; FRAME_KEY_SIZE]) -> Self {
        Self { key }
    }

    /// 16-byte key for AES-128-GCM / AES-128-CBC.
    pub fn as_bytes(&self) -> &[u8; FRAME_KEY_SIZE] {
        &self.key
    }
}

impl Drop for FrameKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FrameKey([REDACTED])")
    }
}

/// Key material at a specific ratchet generation, with its frame key.
///
/// Cloning is cheap (one small allocation) and is how callers take a
/// snapshot of a slot to try decryption without holding the slot lock.
#[derive(Clone)]
pub struct KeyMaterial {
    material: Zeroizing<Vec<u8>>,
    generation: u32,
    frame_key: FrameKey,
}

impl KeyMaterial {
    /// Key material supplied by the application (generation 0).
    pub fn new(raw: &[u8], salt: &[u8]) -> Self {
        Self::at_generation(raw, salt, 0)
    }

    /// Key material that is already `generation` ratchet steps from the
    /// application-supplied material.
    pub fn at_generation(raw: &[u8], salt: &[u8], generation: u32) -> Self {
        Self {
            material: Zeroizing::new(raw.to_vec()),
            generation,
            frame_key: FrameKey::from_bytes(derive_frame_key(raw, salt)),
        }
    }

    /// Raw material bytes.
    pub fn material(&self) -> &[u8] {
        &self.material
    }

    /// Number of ratchet steps since the material was provisioned.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Frame key for this generation.
    pub fn frame_key(&self) -> &FrameKey {
        &self.frame_key
    }

    /// Derive the next generation.
    ///
    /// Does not modify `self`; callers decide whether to commit the result.
    pub fn ratchet(&self, salt: &[u8]) -> Result<Self, CipherError> {
        if self.generation == u32::MAX {
            return Err(CipherError::GenerationOverflow { current: self.generation });
        }

        let mut next = ratchet_material(&self.material, salt);
        let advanced = Self::at_generation(&next, salt, self.generation + 1);
        next.zeroize();

        Ok(advanced)
    }

    /// True if both hold the same material bytes (generation is ignored).
    pub fn same_material(&self, other: &Self) -> bool {
        self.material.as_slice() == other.material.as_slice()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("generation", &self.generation)
            .field("material", &format_args!("[REDACTED] {} bytes", self.material.len()))
            .finish()
    }
}
