//! Cryption state reporting.
//!
//! A cryptor reports the outcome of a transform only when it differs from the
//! previous outcome. Observers are invoked on the pipeline thread after the
//! cryptor has released its lock, so they may call back into the cryptor.
//! Observers that must not block the pipeline forward events elsewhere, as
//! [`ChannelObserver`] does.

use std::fmt;

use tokio::sync::mpsc;

use crate::participant::ParticipantId;

/// Classified outcome of one encrypt or decrypt attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CryptionState {
    /// Frame encrypted or decrypted
    Ok,
    /// Cipher failed to encrypt; frame dropped
    EncryptionFailed,
    /// No key in the ratchet window decrypted the frame; frame dropped
    DecryptionFailed,
    /// No key material at the requested index; frame dropped
    MissingKey,
    /// Receiver advanced its key to match the sender
    KeyRatcheted,
    /// Malformed frame metadata; frame dropped
    InternalError,
}

impl CryptionState {
    /// True for outcomes that dropped the frame.
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Ok | Self::KeyRatcheted)
    }
}

impl fmt::Display for CryptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "ok",
            Self::EncryptionFailed => "encryption-failed",
            Self::DecryptionFailed => "decryption-failed",
            Self::MissingKey => "missing-key",
            Self::KeyRatcheted => "key-ratcheted",
            Self::InternalError => "internal-error",
        };
        f.write_str(name)
    }
}

/// Receives cryption state transitions.
pub trait CryptorObserver: Send + Sync {
    /// Called once per transition, never while the cryptor lock is held.
    fn on_state_changed(&self, participant: &ParticipantId, state: CryptionState);
}

impl<F> CryptorObserver for F
where
    F: Fn(&ParticipantId, CryptionState) + Send + Sync,
{
    fn on_state_changed(&self, participant: &ParticipantId, state: CryptionState) {
        self(participant, state);
    }
}

/// State transition as delivered over a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptionEvent {
    /// Participant the cryptor is bound to
    pub participant: ParticipantId,
    /// New state
    pub state: CryptionState,
}

/// Observer that forwards transitions to an unbounded channel.
///
/// Sending never blocks the pipeline thread. Events sent after the receiver
/// is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<CryptionEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CryptionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl CryptorObserver for ChannelObserver {
    fn on_state_changed(&self, participant: &ParticipantId, state: CryptionState) {
        let _ = self.tx.send(CryptionEvent { participant: participant.clone(), state });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn failure_classification() {
        assert!(!CryptionState::Ok.is_failure());
        assert!(!CryptionState::KeyRatcheted.is_failure());
        assert!(CryptionState::MissingKey.is_failure());
        assert!(CryptionState::DecryptionFailed.is_failure());
        assert!(CryptionState::EncryptionFailed.is_failure());
        assert!(CryptionState::InternalError.is_failure());
    }

    #[test]
    fn closure_observer() {
        let seen = Mutex::new(Vec::new());
        let observer = |participant: &ParticipantId, state: CryptionState| {
            seen.lock().unwrap().push((participant.to_string(), state));
        };

        observer.on_state_changed(&ParticipantId::from("alice"), CryptionState::MissingKey);

        assert_eq!(
            seen.into_inner().unwrap(),
            vec![("alice".to_string(), CryptionState::MissingKey)]
        );
    }

    #[test]
    fn channel_observer_forwards() {
        let (observer, mut rx) = ChannelObserver::new();
        observer.on_state_changed(&ParticipantId::from("bob"), CryptionState::Ok);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.participant.as_str(), "bob");
        assert_eq!(event.state, CryptionState::Ok);
    }

    #[test]
    fn channel_observer_survives_closed_receiver() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);

        observer.on_state_changed(&ParticipantId::from("bob"), CryptionState::Ok);
    }

    #[test]
    fn state_names() {
        insta::assert_snapshot!(CryptionState::KeyRatcheted, @"key-ratcheted");
        insta::assert_snapshot!(CryptionState::DecryptionFailed, @"decryption-failed");
    }
}
