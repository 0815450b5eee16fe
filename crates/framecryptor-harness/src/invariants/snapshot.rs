//! Observable state of a loopback call.

use bytes::Bytes;
use framecryptor_core::CryptionState;

/// Snapshot of a call at one point in time.
#[derive(Debug, Clone, Default)]
pub struct CallSnapshot {
    /// Unencrypted-frame marker in effect.
    pub magic_bytes: Vec<u8>,
    /// Every frame sent, in send order.
    pub frames: Vec<FrameRecord>,
    /// Transitions reported by the sender cryptor.
    pub sender_states: Vec<CryptionState>,
    /// Transitions reported by the receiver cryptor.
    pub receiver_states: Vec<CryptionState>,
    /// Receiver slot generation observed after each frame.
    pub receiver_generations: Vec<u32>,
}

impl CallSnapshot {
    /// Snapshot of a call that sent nothing.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// One frame's journey through the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    /// Payload handed to the sender.
    pub plaintext: Bytes,
    /// Whether the sender cryptor was enabled when the frame was sent.
    pub encrypted: bool,
    /// Payload on the wire. `None` if the sender dropped it.
    pub wire: Option<Bytes>,
    /// Payload handed to the decoder. `None` if dropped on either side.
    pub delivered: Option<Bytes>,
}
