//! Standard invariant checks.

use bytes::Bytes;
use framecryptor_core::{CryptionState, transform::unencrypted_payload};

use super::{CallSnapshot, Invariant, InvariantResult, Violation};

/// Frames sent with encryption enabled never reach the wire in clear.
///
/// Exempt: empty frames and frames carrying the unencrypted marker.
pub struct NoPlaintextLeak;

impl Invariant for NoPlaintextLeak {
    fn name(&self) -> &'static str {
        "NoPlaintextLeak"
    }

    fn check(&self, state: &CallSnapshot) -> InvariantResult {
        for (seq, frame) in state.frames.iter().enumerate() {
            let Some(wire) = &frame.wire else { continue };
            if !frame.encrypted
                || frame.plaintext.is_empty()
                || unencrypted_payload(&frame.plaintext, &state.magic_bytes).is_some()
            {
                continue;
            }

            if wire == &frame.plaintext || wire.len() <= frame.plaintext.len() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "frame {seq}: {} plaintext bytes sent as {} wire bytes without encryption",
                        frame.plaintext.len(),
                        wire.len()
                    ),
                });
            }
        }
        Ok(())
    }
}

/// A delivered frame is exactly what the sender sent.
///
/// Marker frames are delivered with the marker trailer stripped. Dropping is
/// allowed; corrupting is not.
pub struct DeliveredIntact;

impl Invariant for DeliveredIntact {
    fn name(&self) -> &'static str {
        "DeliveredIntact"
    }

    fn check(&self, state: &CallSnapshot) -> InvariantResult {
        for (seq, frame) in state.frames.iter().enumerate() {
            let Some(delivered) = &frame.delivered else { continue };
            if !frame.encrypted {
                continue;
            }

            let expected: Bytes = unencrypted_payload(&frame.plaintext, &state.magic_bytes)
                .unwrap_or_else(|| frame.plaintext.clone());
            if delivered != &expected {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "frame {seq}: delivered {} bytes differ from the {} bytes sent",
                        delivered.len(),
                        expected.len()
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Observers never receive the same state twice in a row.
pub struct SuppressedTransitions;

impl SuppressedTransitions {
    fn check_side(&self, side: &str, states: &[CryptionState]) -> InvariantResult {
        for (index, pair) in states.windows(2).enumerate() {
            if pair[0] == pair[1] {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{side} reported {} twice in a row at event {}",
                        pair[1],
                        index + 1
                    ),
                });
            }
        }
        Ok(())
    }
}

impl Invariant for SuppressedTransitions {
    fn name(&self) -> &'static str {
        "SuppressedTransitions"
    }

    fn check(&self, state: &CallSnapshot) -> InvariantResult {
        self.check_side("sender", &state.sender_states)?;
        self.check_side("receiver", &state.receiver_states)
    }
}

/// Receiver key generations never decrease between re-provisionings.
pub struct GenerationMonotonicity;

impl Invariant for GenerationMonotonicity {
    fn name(&self) -> &'static str {
        "GenerationMonotonicity"
    }

    fn check(&self, state: &CallSnapshot) -> InvariantResult {
        for window in state.receiver_generations.windows(2) {
            if window[1] < window[0] {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("generation decreased {} → {}", window[0], window[1]),
                });
            }
        }
        Ok(())
    }
}
