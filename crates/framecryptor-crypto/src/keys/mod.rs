//! Key material, frame key derivation and the symmetric ratchet
//!
//! ```text
//! material[g] ──HMAC(label || salt)──► material[g + 1]
//!      │
//!      └──HKDF(salt, label)──► frame_key[g] (AES-128)
//! ```

pub mod derivation;
pub mod material;

pub use derivation::{FRAME_KEY_SIZE, RATCHET_MATERIAL_SIZE, derive_frame_key, ratchet_material};
pub use material::{FrameKey, KeyMaterial};
