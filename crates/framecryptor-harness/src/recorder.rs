//! Observer that records every transition it receives.

use framecryptor_core::{CryptionEvent, CryptionState, CryptorObserver, ParticipantId};
use parking_lot::Mutex;

/// Records cryption events in arrival order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<CryptionEvent>>,
}

impl RecordingObserver {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events so far.
    pub fn events(&self) -> Vec<CryptionEvent> {
        self.events.lock().clone()
    }

    /// States reported for `participant`, in order.
    pub fn states(&self, participant: &str) -> Vec<CryptionState> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.participant.as_str() == participant)
            .map(|event| event.state)
            .collect()
    }

    /// Drain recorded events.
    pub fn take(&self) -> Vec<CryptionEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl CryptorObserver for RecordingObserver {
    fn on_state_changed(&self, participant: &ParticipantId, state: CryptionState) {
        self.events.lock().push(CryptionEvent { participant: participant.clone(), state });
    }
}
