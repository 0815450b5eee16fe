//! Per-participant key ring.
//!
//! A [`KeyHandler`] owns a fixed number of key slots. Each slot holds the
//! current [`KeyMaterial`] and its ratchet generation. The ring is guarded by
//! its own lock, independent of any cryptor lock, so sender and receiver
//! cryptors of the same participant can share it without lock ordering
//! concerns.
//!
//! # Invariants
//!
//! - A slot's generation never decreases except when `set_key` provisions
//!   fresh material
//! - Decryption retries never write to a slot; only
//!   [`KeyHandler::commit_ratchet`] does, and only if the slot still holds
//!   the material the retry started from

use framecryptor_crypto::KeyMaterial;
use parking_lot::Mutex;

use crate::error::KeyError;

/// Key ring for one participant (or the shared ring).
#[derive(Debug)]
pub struct KeyHandler {
    salt: Vec<u8>,
    failure_tolerance: Option<u32>,
    ring: Mutex<KeyRing>,
}

#[derive(Debug)]
struct KeyRing {
    slots: Vec<Option<KeyMaterial>>,
    failures: u32,
    invalidated: bool,
}

impl KeyHandler {
    /// Create an empty ring with `ring_size` slots.
    pub fn new(ring_size: usize, salt: &[u8], failure_tolerance: Option<u32>) -> Self {
        Self {
            salt: salt.to_vec(),
            failure_tolerance,
            ring: Mutex::new(KeyRing {
                slots: vec![None; ring_size],
                failures: 0,
                invalidated: false,
            }),
        }
    }

    /// Number of slots.
    pub fn ring_size(&self) -> usize {
        self.ring.lock().slots.len()
    }

    /// Salt used for frame key derivation and ratcheting.
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    fn slot_index(ring: &KeyRing, index: i32) -> Result<usize, KeyError> {
        usize::try_from(index)
            .ok()
            .filter(|&i| i < ring.slots.len())
            .ok_or(KeyError::InvalidIndex { index, ring_size: ring.slots.len() })
    }

    /// Install raw key material at generation 0.
    ///
    /// Clears any failure-tolerance invalidation.
    pub fn set_key(&self, index: i32, raw: &[u8]) -> Result<(), KeyError> {
        let mut ring = self.ring.lock();
        let slot = Self::slot_index(&ring, index)?;

        ring.slots[slot] = Some(KeyMaterial::new(raw, &self.salt));
        ring.failures = 0;
        ring.invalidated = false;
        Ok(())
    }

    /// Advance the slot one generation and return the new material.
    ///
    /// # Errors
    ///
    /// - `InvalidIndex`: index outside the ring
    /// - `MissingKey`: slot never provisioned
    /// - `RatchetExhausted`: generation counter would overflow
    pub fn ratchet_key(&self, index: i32) -> Result<Vec<u8>, KeyError> {
        let mut ring = self.ring.lock();
        let slot = Self::slot_index(&ring, index)?;

        let Some(current) = ring.slots[slot].as_ref() else {
            return Err(KeyError::MissingKey { index });
        };
        let next = current
            .ratchet(&self.salt)
            .map_err(|_| KeyError::RatchetExhausted { index, generation: current.generation() })?;

        let material = next.material().to_vec();
        ring.slots[slot] = Some(next);
        Ok(material)
    }

    /// Current material at the slot, if any.
    pub fn get_key(&self, index: i32) -> Option<Vec<u8>> {
        self.key_set(index).map(|key| key.material().to_vec())
    }

    /// Ratchet generation of the slot, if provisioned.
    pub fn generation(&self, index: i32) -> Option<u32> {
        self.key_set(index).map(|key| key.generation())
    }

    /// Snapshot of the slot for encryption or a decryption attempt.
    pub fn key_set(&self, index: i32) -> Option<KeyMaterial> {
        let ring = self.ring.lock();
        let slot = Self::slot_index(&ring, index).ok()?;
        ring.slots[slot].clone()
    }

    /// Replace the slot with `advanced` if it still holds `base`.
    ///
    /// Returns false if the slot changed since `base` was taken (fresh key
    /// provisioned, or another cryptor already advanced it).
    pub fn commit_ratchet(&self, index: i32, base: &KeyMaterial, advanced: KeyMaterial) -> bool {
        let mut ring = self.ring.lock();
        let Ok(slot) = Self::slot_index(&ring, index) else {
            return false;
        };

        let unchanged = ring.slots[slot].as_ref().is_some_and(|current| {
            current.generation() == base.generation() && current.same_material(base)
        });
        if unchanged {
            ring.slots[slot] = Some(advanced);
        }
        unchanged
    }

    /// True once failures exceeded the tolerance and no new key arrived.
    pub fn is_invalidated(&self) -> bool {
        self.ring.lock().invalidated
    }

    /// Reset the failure counter after a successful decryption.
    pub fn record_success(&self) {
        self.ring.lock().failures = 0;
    }

    /// Count a decryption failure. Returns true if it invalidated the ring.
    pub fn record_failure(&self) -> bool {
        let Some(tolerance) = self.failure_tolerance else {
            return false;
        };

        let mut ring = self.ring.lock();
        ring.failures = ring.failures.saturating_add(1);
        if !ring.invalidated && ring.failures > tolerance {
            ring.invalidated = true;
            tracing::warn!(failures = ring.failures, tolerance, "key ring invalidated");
            return true;
        }
        false
    }
}
