//! Session-wide key registry.
//!
//! A [`KeyProvider`] is created once per session and shared (via `Arc`) by
//! every cryptor. It maps participant identities to [`KeyHandler`]s, or, in
//! shared-key mode, resolves every participant to one shared handler.
//!
//! Keys are supplied by the application; the provider never generates or
//! exchanges key material.

use std::sync::Arc;

use dashmap::DashMap;

use crate::{error::KeyError, key_handler::KeyHandler, participant::ParticipantId};

/// Default salt for key derivation and ratcheting.
pub const DEFAULT_RATCHET_SALT: &[u8] = b"LKFrameEncryptionKey";

/// Default marker for frames exempt from encryption.
pub const DEFAULT_MAGIC_BYTES: &[u8] = b"LK-ROCKS";

/// Default number of ratchet steps tried before a decryption fails.
pub const DEFAULT_RATCHET_WINDOW_SIZE: u32 = 16;

/// Default number of key slots per participant.
pub const DEFAULT_KEY_RING_SIZE: usize = 16;

/// Largest key ring; key indices travel as one byte.
pub const MAX_KEY_RING_SIZE: usize = 256;

/// Provider configuration, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyProviderOptions {
    /// One key ring for all participants instead of one per participant
    pub shared_key: bool,
    /// Salt for frame key derivation and ratcheting
    pub ratchet_salt: Vec<u8>,
    /// Ratchet steps tried when the current key fails to decrypt
    pub ratchet_window_size: u32,
    /// Marker for frames left in clear (empty disables the bypass)
    pub uncrypted_magic_bytes: Vec<u8>,
    /// Key slots per ring
    pub key_ring_size: usize,
    /// Consecutive decryption failures tolerated before a ring is
    /// invalidated (`None` tolerates any number)
    pub failure_tolerance: Option<u32>,
}

impl Default for KeyProviderOptions {
    fn default() -> Self {
        Self {
            shared_key: false,
            ratchet_salt: DEFAULT_RATCHET_SALT.to_vec(),
            ratchet_window_size: DEFAULT_RATCHET_WINDOW_SIZE,
            uncrypted_magic_bytes: DEFAULT_MAGIC_BYTES.to_vec(),
            key_ring_size: DEFAULT_KEY_RING_SIZE,
            failure_tolerance: None,
        }
    }
}

impl KeyProviderOptions {
    /// Check the options are usable.
    pub fn validate(&self) -> Result<(), KeyError> {
        if self.key_ring_size == 0 {
            return Err(KeyError::InvalidOptions { reason: "key ring must hold at least one slot" });
        }
        if self.key_ring_size > MAX_KEY_RING_SIZE {
            return Err(KeyError::InvalidOptions { reason: "key ring larger than 256 slots" });
        }
        Ok(())
    }
}

/// Shared registry of participant key rings.
#[derive(Debug)]
pub struct KeyProvider {
    options: KeyProviderOptions,
    shared: Arc<KeyHandler>,
    handlers: DashMap<ParticipantId, Arc<KeyHandler>>,
}

impl KeyProvider {
    /// Create a provider.
    ///
    /// # Errors
    ///
    /// `InvalidOptions` if [`KeyProviderOptions::validate`] fails.
    pub fn new(options: KeyProviderOptions) -> Result<Arc<Self>, KeyError> {
        options.validate()?;

        let shared = Arc::new(Self::new_handler(&options));
        Ok(Arc::new(Self { options, shared, handlers: DashMap::new() }))
    }

    /// Provider in shared-key mode with `key` installed at index 0.
    ///
    /// `options.shared_key` is forced on.
    pub fn with_shared_key(options: KeyProviderOptions, key: &[u8]) -> Result<Arc<Self>, KeyError> {
        let provider = Self::new(KeyProviderOptions { shared_key: true, ..options })?;
        provider.set_shared_key(0, key)?;
        Ok(provider)
    }

    fn new_handler(options: &KeyProviderOptions) -> KeyHandler {
        KeyHandler::new(options.key_ring_size, &options.ratchet_salt, options.failure_tolerance)
    }

    /// Configuration the provider was built with.
    pub fn options(&self) -> &KeyProviderOptions {
        &self.options
    }

    fn check_index(&self, index: i32) -> Result<(), KeyError> {
        let ring_size = self.options.key_ring_size;
        match usize::try_from(index) {
            Ok(i) if i < ring_size => Ok(()),
            _ => Err(KeyError::InvalidIndex { index, ring_size }),
        }
    }

    /// Key ring for `participant`, if it has one.
    ///
    /// In shared-key mode this is always the shared ring.
    pub fn handler(&self, participant: &str) -> Option<Arc<KeyHandler>> {
        if self.options.shared_key {
            return Some(Arc::clone(&self.shared));
        }
        self.handlers.get(participant).map(|entry| Arc::clone(entry.value()))
    }

    fn handler_or_insert(&self, participant: &str) -> Arc<KeyHandler> {
        if self.options.shared_key {
            return Arc::clone(&self.shared);
        }
        let entry = self
            .handlers
            .entry(ParticipantId::from(participant))
            .or_insert_with(|| Arc::new(Self::new_handler(&self.options)));
        Arc::clone(entry.value())
    }

    /// Install key material for `participant` at `index`.
    ///
    /// In shared-key mode the participant is ignored.
    pub fn set_key(&self, participant: &str, index: i32, key: &[u8]) -> Result<(), KeyError> {
        self.check_index(index)?;
        self.handler_or_insert(participant).set_key(index, key)?;

        tracing::debug!(participant, index, shared = self.options.shared_key, "key set");
        Ok(())
    }

    /// Ratchet `participant`'s key at `index` and return the new material.
    ///
    /// # Errors
    ///
    /// - `InvalidIndex`: index outside the ring
    /// - `MissingKey`: participant or slot has no key
    /// - `RatchetExhausted`: generation counter would overflow
    pub fn ratchet_key(&self, participant: &str, index: i32) -> Result<Vec<u8>, KeyError> {
        self.check_index(index)?;
        let handler = self.handler(participant).ok_or(KeyError::MissingKey { index })?;
        let material = handler.ratchet_key(index)?;

        tracing::debug!(participant, index, generation = handler.generation(index), "key ratcheted");
        Ok(material)
    }

    /// Current key material for `participant` at `index`.
    pub fn get_key(&self, participant: &str, index: i32) -> Option<Vec<u8>> {
        self.handler(participant)?.get_key(index)
    }

    /// Install key material in the shared ring.
    pub fn set_shared_key(&self, index: i32, key: &[u8]) -> Result<(), KeyError> {
        self.check_index(index)?;
        self.shared.set_key(index, key)?;

        tracing::debug!(index, "shared key set");
        Ok(())
    }

    /// Ratchet the shared ring at `index`.
    pub fn ratchet_shared_key(&self, index: i32) -> Result<Vec<u8>, KeyError> {
        self.check_index(index)?;
        let material = self.shared.ratchet_key(index)?;

        tracing::debug!(index, generation = self.shared.generation(index), "shared key ratcheted");
        Ok(material)
    }

    /// Current shared key material at `index`.
    pub fn get_shared_key(&self, index: i32) -> Option<Vec<u8>> {
        self.shared.get_key(index)
    }

    /// Forget a participant's key ring. Returns true if one existed.
    ///
    /// Cryptors holding the ring keep using it until they look it up again.
    pub fn remove_participant(&self, participant: &str) -> bool {
        let removed = self.handlers.remove(participant).is_some();
        if removed {
            tracing::debug!(participant, "participant keys removed");
        }
        removed
    }
}
