//! Media frames and the encrypted frame layout.
//!
//! An encrypted frame keeps a short codec header in clear so packetizers and
//! forwarding servers can still read it, and ends in a fixed trailer that
//! makes the frame self-describing:
//!
//! ```text
//! ┌──────────┬─────────────────────┬────────┬─────┬─────┬─────┬───────────┐
//! │ header h │ ciphertext (+ tag)  │ iv (n) │ h   │ alg │ n   │ key_index │
//! └──────────┴─────────────────────┴────────┴─────┴─────┴─────┴───────────┘
//!                                           └────── trailer (4 bytes) ────┘
//! ```
//!
//! For AES-GCM the additional authenticated data is `header || trailer`.

use std::fmt;

use bytes::Bytes;
use framecryptor_crypto::Algorithm;

use crate::error::MalformedFrame;

/// Kind of media carried by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Audio frames
    Audio,
    /// Video frames
    Video,
}

impl MediaKind {
    /// Bytes at the start of a frame that stay unencrypted.
    ///
    /// Audio keeps the TOC byte; video keeps enough of the codec header for
    /// a key frame (10) or a delta frame (3).
    pub const fn unencrypted_bytes(self, key_frame: bool) -> usize {
        match (self, key_frame) {
            (Self::Audio, _) => 1,
            (Self::Video, true) => 10,
            (Self::Video, false) => 3,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// One encoded media frame as handed over by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Media kind of the stream the frame belongs to
    pub kind: MediaKind,
    /// Video key frame flag (always false for audio)
    pub key_frame: bool,
    /// Encoded payload
    pub payload: Bytes,
}

impl Frame {
    /// Audio frame.
    pub fn audio(payload: impl Into<Bytes>) -> Self {
        Self { kind: MediaKind::Audio, key_frame: false, payload: payload.into() }
    }

    /// Video frame.
    pub fn video(payload: impl Into<Bytes>, key_frame: bool) -> Self {
        Self { kind: MediaKind::Video, key_frame, payload: payload.into() }
    }

    /// Same frame metadata with a replaced payload.
    #[must_use]
    pub fn with_payload(self, payload: impl Into<Bytes>) -> Self {
        Self { payload: payload.into(), ..self }
    }

    /// Length of the clear header for this frame.
    ///
    /// Never covers the whole payload, so at least one byte is encrypted.
    pub fn header_len(&self) -> usize {
        self.kind.unencrypted_bytes(self.key_frame).min(self.payload.len().saturating_sub(1))
    }
}

/// Fixed-size metadata at the end of every encrypted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTrailer {
    /// Clear header length
    pub header_len: u8,
    /// Cipher used for the body
    pub algorithm: Algorithm,
    /// IV length
    pub iv_len: u8,
    /// Key slot the sender used
    pub key_index: u8,
}

/// Borrowed view of a parsed encrypted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealedFrame<'a> {
    /// Decoded trailer
    pub trailer: FrameTrailer,
    /// Clear header bytes
    pub header: &'a [u8],
    /// Encrypted body (including the GCM tag)
    pub ciphertext: &'a [u8],
    /// IV bytes
    pub iv: &'a [u8],
}

impl FrameTrailer {
    /// Encoded trailer size in bytes.
    pub const SIZE: usize = 4;

    /// Encode to wire bytes.
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        [self.header_len, self.algorithm.tag(), self.iv_len, self.key_index]
    }

    /// Split an encrypted frame into its parts.
    ///
    /// # Errors
    ///
    /// - `TooShort`: frame cannot hold a trailer
    /// - `UnknownAlgorithm`: algorithm tag not recognised
    /// - `IvLength`: IV length disagrees with the algorithm
    /// - `Truncated`: header and IV do not fit in the frame
    pub fn parse(frame: &[u8]) -> Result<SealedFrame<'_>, MalformedFrame> {
        let Some(body_len) = frame.len().checked_sub(Self::SIZE) else {
            return Err(MalformedFrame::TooShort { len: frame.len(), min: Self::SIZE });
        };

        let [header_len, tag, iv_len, key_index] = [
            frame[body_len],
            frame[body_len + 1],
            frame[body_len + 2],
            frame[body_len + 3],
        ];

        let algorithm =
            Algorithm::from_tag(tag).map_err(|_| MalformedFrame::UnknownAlgorithm(tag))?;

        let (h, n) = (usize::from(header_len), usize::from(iv_len));
        if n != algorithm.iv_len() {
            return Err(MalformedFrame::IvLength { expected: algorithm.iv_len(), actual: n });
        }
        if h + n > body_len {
            return Err(MalformedFrame::Truncated { len: frame.len(), header_len: h, iv_len: n });
        }

        let iv_start = body_len - n;
        Ok(SealedFrame {
            trailer: Self { header_len, algorithm, iv_len, key_index },
            header: &frame[..h],
            ciphertext: &frame[h..iv_start],
            iv: &frame[iv_start..body_len],
        })
    }
}

impl SealedFrame<'_> {
    /// Additional authenticated data: clear header followed by the trailer.
    pub fn aad(&self) -> Vec<u8> {
        let mut aad = Vec::with_capacity(self.header.len() + FrameTrailer::SIZE);
        aad.extend_from_slice(self.header);
        aad.extend_from_slice(&self.trailer.to_bytes());
        aad
    }
}
