//! Frame encryption and decryption.
//!
//! Pure functions over a [`KeyProvider`]: no per-cryptor state lives here.
//! The cryptor decides what to do with the outcome; this module only produces
//! the transformed payload or a classified [`TransformError`].
//!
//! # Decryption Order
//!
//! 1. Empty payloads and marker frames pass through
//! 2. Trailer parsed (malformed metadata is an internal error)
//! 3. Algorithm tag checked against the configured algorithm
//! 4. Key looked up by the index embedded in the frame
//! 5. Current generation tried, then up to `ratchet_window_size` forward
//!    ratchet steps on a scratch copy
//! 6. On success after ratcheting, the slot is advanced to the generation
//!    that worked; on failure it is left untouched

use bytes::{BufMut, Bytes, BytesMut};
use framecryptor_crypto::{Algorithm, KeyMaterial};

use crate::{
    env::Environment,
    error::TransformError,
    frame::{Frame, FrameTrailer, SealedFrame},
    key_handler::KeyHandler,
    key_provider::KeyProvider,
};

/// Result of a successful decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    /// Clear payload
    pub payload: Bytes,
    /// Ratchet steps needed to find the key (0 if the current key worked)
    pub ratchet_steps: u32,
}

/// Payload of a frame exempt from encryption, or `None`.
///
/// A frame is exempt if it equals `magic`, or ends with `magic` followed by
/// one extra byte. In the second case the marker and the extra byte are
/// stripped from the returned payload.
pub fn unencrypted_payload(payload: &Bytes, magic: &[u8]) -> Option<Bytes> {
    if magic.is_empty() {
        return None;
    }
    if payload.as_ref() == magic {
        return Some(payload.clone());
    }

    let marker_start = payload.len().checked_sub(magic.len() + 1)?;
    let marker = &payload[marker_start..payload.len() - 1];
    (marker == magic).then(|| payload.slice(..marker_start))
}

fn key_slot(keys: &KeyProvider, key_index: i32) -> Result<u8, TransformError> {
    let ring_size = keys.options().key_ring_size;
    u8::try_from(key_index)
        .ok()
        .filter(|&i| usize::from(i) < ring_size)
        .ok_or(TransformError::InvalidKeyIndex { key_index, ring_size })
}

/// Encrypt `frame` with `participant`'s key at `key_index`.
///
/// The returned payload carries the key index and algorithm in its trailer.
///
/// # Errors
///
/// - `InvalidKeyIndex`: index outside the key ring
/// - `MissingKey`: no material at the index
/// - `EncryptionFailed`: cipher error
pub fn encrypt<E: Environment>(
    env: &E,
    keys: &KeyProvider,
    participant: &str,
    algorithm: Algorithm,
    key_index: i32,
    frame: &Frame,
) -> Result<Bytes, TransformError> {
    let payload = &frame.payload;
    if payload.is_empty() {
        return Ok(payload.clone());
    }
    if unencrypted_payload(payload, &keys.options().uncrypted_magic_bytes).is_some() {
        return Ok(payload.clone());
    }

    let slot = key_slot(keys, key_index)?;
    let key = keys
        .handler(participant)
        .and_then(|handler| handler.key_set(key_index))
        .ok_or(TransformError::MissingKey { key_index })?;

    let header_len = frame.header_len();
    let (header, body) = payload.split_at(header_len);

    let mut iv = vec![0u8; algorithm.iv_len()];
    env.random_bytes(&mut iv);

    let trailer = FrameTrailer {
        header_len: header_len as u8,
        algorithm,
        iv_len: iv.len() as u8,
        key_index: slot,
    }
    .to_bytes();

    let mut aad = Vec::with_capacity(header_len + trailer.len());
    aad.extend_from_slice(header);
    aad.extend_from_slice(&trailer);

    let ciphertext = algorithm
        .seal(key.frame_key(), &iv, &aad, body)
        .map_err(TransformError::EncryptionFailed)?;

    let mut out = BytesMut::with_capacity(header_len + ciphertext.len() + iv.len() + trailer.len());
    out.put_slice(header);
    out.put_slice(&ciphertext);
    out.put_slice(&iv);
    out.put_slice(&trailer);
    Ok(out.freeze())
}

/// Decrypt `frame` with the key index embedded in it.
///
/// May advance the participant's key slot if a ratchet step was needed.
///
/// # Errors
///
/// - `Malformed`: trailer unusable
/// - `AlgorithmMismatch`: frame encrypted with another algorithm
/// - `InvalidKeyIndex`: embedded index outside the key ring
/// - `MissingKey`: no material at the embedded index
/// - `KeyInvalidated`: ring exceeded its failure tolerance
/// - `DecryptionFailed`: no key within the ratchet window worked
pub fn decrypt(
    keys: &KeyProvider,
    participant: &str,
    algorithm: Algorithm,
    frame: &Frame,
) -> Result<Decrypted, TransformError> {
    let payload = &frame.payload;
    if payload.is_empty() {
        return Ok(Decrypted { payload: payload.clone(), ratchet_steps: 0 });
    }
    if let Some(clear) = unencrypted_payload(payload, &keys.options().uncrypted_magic_bytes) {
        return Ok(Decrypted { payload: clear, ratchet_steps: 0 });
    }

    let sealed = FrameTrailer::parse(payload)?;
    let received = sealed.trailer.algorithm;
    if received != algorithm {
        tracing::warn!(participant, %algorithm, %received, "frame algorithm mismatch");
        return Err(TransformError::AlgorithmMismatch { configured: algorithm, received });
    }

    let key_index = i32::from(sealed.trailer.key_index);
    key_slot(keys, key_index)?;

    let handler = keys.handler(participant).ok_or(TransformError::MissingKey { key_index })?;
    let base = handler.key_set(key_index).ok_or(TransformError::MissingKey { key_index })?;
    if handler.is_invalidated() {
        return Err(TransformError::KeyInvalidated { key_index: sealed.trailer.key_index });
    }

    let aad = sealed.aad();
    if let Some(clear) = open(&sealed, &aad, &base) {
        handler.record_success();
        return Ok(Decrypted { payload: clear, ratchet_steps: 0 });
    }

    let window = keys.options().ratchet_window_size;
    match ratchet_search(&handler, &sealed, &aad, &base, window) {
        Some((candidate, steps, clear)) => {
            let committed = handler.commit_ratchet(key_index, &base, candidate);
            handler.record_success();
            tracing::debug!(participant, key_index, steps, committed, "receiver key ratcheted");
            Ok(Decrypted { payload: clear, ratchet_steps: steps })
        },
        None => {
            handler.record_failure();
            Err(TransformError::DecryptionFailed {
                key_index: sealed.trailer.key_index,
                attempts: window.saturating_add(1),
            })
        },
    }
}

/// Try successive generations after `base`. Never touches the slot.
fn ratchet_search(
    handler: &KeyHandler,
    sealed: &SealedFrame<'_>,
    aad: &[u8],
    base: &KeyMaterial,
    window: u32,
) -> Option<(KeyMaterial, u32, Bytes)> {
    let mut candidate = base.clone();
    for step in 1..=window {
        candidate = candidate.ratchet(handler.salt()).ok()?;
        if let Some(clear) = open(sealed, aad, &candidate) {
            return Some((candidate, step, clear));
        }
    }
    None
}

fn open(sealed: &SealedFrame<'_>, aad: &[u8], key: &KeyMaterial) -> Option<Bytes> {
    let body = sealed
        .trailer
        .algorithm
        .open(key.frame_key(), sealed.iv, aad, sealed.ciphertext)
        .ok()?;

    let mut out = BytesMut::with_capacity(sealed.header.len() + body.len());
    out.put_slice(sealed.header);
    out.put_slice(&body);
    Some(out.freeze())
}
