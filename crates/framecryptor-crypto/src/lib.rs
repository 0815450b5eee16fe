//! Frame Cryptor Primitives
//!
//! Cryptographic building blocks for media frame encryption. Pure functions
//! with deterministic outputs. Callers provide IV bytes so that frames can be
//! reproduced in simulation.
//!
//! # Key Lifecycle
//!
//! Raw key material is supplied out of band (signaling, a shared passphrase,
//! an MLS exporter). Each key slot holds material plus a generation counter.
//! The AES key is never used directly from the raw material: it is derived
//! with HKDF so that every generation of material yields an independent
//! frame key.
//!
//! ```text
//! Raw Key Material (generation 0)
//!        │
//!        ├──► HKDF(salt) → Frame Key → AES-GCM / AES-CBC
//!        │
//!        ▼ HMAC(salt)
//! Material (generation 1)
//!        │
//!        ├──► HKDF(salt) → Frame Key
//!        ▼
//!       ...
//! ```
//!
//! # Security
//!
//! Forward Secrecy:
//! - Ratcheting replaces material with a one-way function of itself
//! - Old material is zeroized when the slot is overwritten or dropped
//!
//! Convergence:
//! - The ratchet is a pure function of (material, salt)
//! - Two parties starting from the same material and salt agree on every
//!   generation without exchanging messages
//!
//! Authenticity:
//! - AES-GCM binds the clear frame header and trailer as associated data
//! - AES-CBC is encrypt-then-MAC: a truncated HMAC-SHA256 tag covers the
//!   same associated data, the IV and the ciphertext

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cipher;
pub mod error;
pub mod keys;

pub use cipher::{Algorithm, CBC_TAG_SIZE, GCM_TAG_SIZE};
pub use error::CipherError;
pub use keys::{
    FRAME_KEY_SIZE, FrameKey, KeyMaterial, RATCHET_MATERIAL_SIZE, derive_frame_key,
    ratchet_material,
};
