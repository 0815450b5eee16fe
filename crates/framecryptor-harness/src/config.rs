//! Simulation scenario configuration.
//!
//! Scenarios are TOML files. Every field has a default, so an empty file is
//! a valid scenario:
//!
//! ```toml
//! participant = "alice"
//! algorithm = "aes-gcm"
//! media = "video"
//! ratchet_window_size = 4
//! frames = 400
//! ratchet_every = 100
//! workers = 4
//! seed = 42
//! ```

use std::path::Path;

use framecryptor_core::{
    Algorithm, DEFAULT_KEY_RING_SIZE, DEFAULT_RATCHET_WINDOW_SIZE, KeyProviderOptions, MediaKind,
};
use framecryptor_crypto::CipherError;
use serde::Deserialize;
use thiserror::Error;

/// Errors loading or interpreting a scenario.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Scenario file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// Scenario is not valid TOML for [`SimConfig`]
    #[error("invalid scenario: {0}")]
    Parse(#[from] toml::de::Error),

    /// Unknown algorithm name
    #[error("invalid algorithm: {0}")]
    Algorithm(#[from] CipherError),

    /// Unknown media kind
    #[error("unknown media kind {0:?} (expected \"audio\" or \"video\")")]
    Media(String),

    /// Field values that cannot run
    #[error("invalid scenario: {0}")]
    Invalid(&'static str),
}

/// One loopback scenario.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Participant identity of the simulated remote
    pub participant: String,
    /// Cipher name (`aes-gcm` or `aes-cbc`)
    pub algorithm: String,
    /// `audio` or `video`
    pub media: String,
    /// Use one shared key ring
    pub shared_key: bool,
    /// Ratchet salt as UTF-8
    pub ratchet_salt: String,
    /// Ratchet steps tried on decryption failure
    pub ratchet_window_size: u32,
    /// Unencrypted-frame marker as UTF-8
    pub magic_bytes: String,
    /// Slots per key ring
    pub key_ring_size: usize,
    /// Decryption failures tolerated before a ring is invalidated
    pub failure_tolerance: Option<u32>,
    /// Initial key material as UTF-8
    pub key: String,
    /// Key slot used by the sender
    pub key_index: i32,
    /// Frames to send
    pub frames: u32,
    /// Payload size per frame
    pub frame_size: usize,
    /// Every n-th video frame is a key frame (0 = none)
    pub key_frame_interval: u32,
    /// Sender ratchets after every n frames (0 = never)
    pub ratchet_every: u32,
    /// Pipeline threads pushing frames concurrently
    pub workers: usize,
    /// Seed for IVs and payloads
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            participant: "remote".to_string(),
            algorithm: Algorithm::default().to_string(),
            media: "video".to_string(),
            shared_key: false,
            ratchet_salt: "LKFrameEncryptionKey".to_string(),
            ratchet_window_size: DEFAULT_RATCHET_WINDOW_SIZE,
            magic_bytes: "LK-ROCKS".to_string(),
            key_ring_size: DEFAULT_KEY_RING_SIZE,
            failure_tolerance: None,
            key: "initial-key".to_string(),
            key_index: 0,
            frames: 200,
            frame_size: 256,
            key_frame_interval: 30,
            ratchet_every: 50,
            workers: 4,
            seed: 0,
        }
    }
}

impl SimConfig {
    /// Parse a scenario from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a scenario file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        Self::from_toml_str(&text)
    }

    /// Check values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.algorithm()?;
        self.media_kind()?;
        if self.participant.is_empty() {
            return Err(ConfigError::Invalid("participant must not be empty"));
        }
        if self.key.is_empty() {
            return Err(ConfigError::Invalid("key must not be empty"));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1"));
        }
        Ok(())
    }

    /// Parsed cipher.
    pub fn algorithm(&self) -> Result<Algorithm, ConfigError> {
        Ok(self.algorithm.parse()?)
    }

    /// Parsed media kind.
    pub fn media_kind(&self) -> Result<MediaKind, ConfigError> {
        match self.media.to_ascii_lowercase().as_str() {
            "audio" => Ok(MediaKind::Audio),
            "video" => Ok(MediaKind::Video),
            _ => Err(ConfigError::Media(self.media.clone())),
        }
    }

    /// Options for both key providers of the call.
    pub fn key_provider_options(&self) -> KeyProviderOptions {
        KeyProviderOptions {
            shared_key: self.shared_key,
            ratchet_salt: self.ratchet_salt.as_bytes().to_vec(),
            ratchet_window_size: self.ratchet_window_size,
            uncrypted_magic_bytes: self.magic_bytes.as_bytes().to_vec(),
            key_ring_size: self.key_ring_size,
            failure_tolerance: self.failure_tolerance,
        }
    }
}
