//! Frame Cryptor Core
//!
//! End-to-end encryption of encoded media frames, inserted between the
//! encoder and packetizer on the sending side and between the depacketizer
//! and decoder on the receiving side.
//!
//! # Components
//!
//! ```text
//! media pipeline ──► FrameCryptor::transform(frame)
//!                         │
//!                         ├──► KeyProvider::handler(participant) ──► KeyHandler[key_index]
//!                         │
//!                         ├──► transform::encrypt / transform::decrypt
//!                         │
//!                         └──► CryptorObserver (state changes only, outside the lock)
//! ```
//!
//! - [`KeyProvider`]: shared registry of per-participant [`KeyHandler`]s,
//!   configured once with [`KeyProviderOptions`]
//! - [`transform`]: frame framing, bypass marker, ratchet-window retry and
//!   outcome classification
//! - [`FrameCryptor`]: binds one media path, holds `enabled`/`key_index` and
//!   the observer, reports [`CryptionState`] transitions
//! - [`MediaPath`]/[`FrameTransformer`]: the only surface the cryptor sees of
//!   the media transport
//!
//! # Failure Model
//!
//! Per-frame failures never reach the pipeline as errors. A frame that cannot
//! be processed is dropped and the outcome is reported to the observer if it
//! differs from the previous one. Only construction-time misconfiguration is
//! returned to the caller.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cryptor;
pub mod env;
pub mod error;
pub mod frame;
pub mod hook;
pub mod key_handler;
pub mod key_provider;
pub mod observer;
pub mod participant;
pub mod system_env;
pub mod transform;

pub use cryptor::{Direction, FrameCryptor};
pub use env::Environment;
pub use error::{CryptorError, KeyError, MalformedFrame, TransformError};
pub use frame::{Frame, FrameTrailer, MediaKind, SealedFrame};
pub use framecryptor_crypto::Algorithm;
pub use hook::{FrameTransformer, MediaPath};
pub use key_handler::KeyHandler;
pub use key_provider::{
    DEFAULT_KEY_RING_SIZE, DEFAULT_MAGIC_BYTES, DEFAULT_RATCHET_SALT, DEFAULT_RATCHET_WINDOW_SIZE,
    KeyProvider, KeyProviderOptions, MAX_KEY_RING_SIZE,
};
pub use observer::{ChannelObserver, CryptionEvent, CryptionState, CryptorObserver};
pub use participant::ParticipantId;
pub use system_env::SystemEnv;
pub use transform::Decrypted;
