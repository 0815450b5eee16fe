//! Frame cryptor: one per media stream.
//!
//! A [`FrameCryptor`] is installed on a [`MediaPath`] at construction and
//! removed from it on drop. Every frame on the path goes through
//! [`FrameCryptor::transform`], which encrypts (sender) or decrypts
//! (receiver) when enabled, and reports outcome transitions to the observer.
//!
//! # State Machine
//!
//! ```text
//!                 transform() outcome differs from last?
//!   (unknown) ───────────────────────────────────────────► state
//!                     yes: notify observer               │    ▲
//!                     no:  suppress                      └────┘
//! ```
//!
//! There is no terminal state. A decryption that needed a ratchet step is
//! two outcomes in a row (`KeyRatcheted`, then `Ok`), each going through the
//! same suppression rule.
//!
//! # Locking
//!
//! `enabled`, `key_index`, the observer and the last reported state live
//! behind one mutex per cryptor. The transform itself runs under that mutex.
//! Key rings have their own locks and never call back into a cryptor. The
//! observer is cloned out and notified after the mutex is released.

use std::{fmt, sync::Arc};

use bytes::Bytes;
use framecryptor_crypto::Algorithm;
use parking_lot::Mutex;

use crate::{
    env::Environment,
    error::{CryptorError, TransformError},
    frame::{Frame, MediaKind},
    hook::{FrameTransformer, MediaPath},
    key_provider::KeyProvider,
    observer::{CryptionState, CryptorObserver},
    participant::ParticipantId,
    system_env::SystemEnv,
    transform,
};

/// Which side of the media path a cryptor sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Outgoing path: encrypts
    Sender,
    /// Incoming path: decrypts
    Receiver,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => f.write_str("sender"),
            Self::Receiver => f.write_str("receiver"),
        }
    }
}

/// End-to-end encryption for one media stream.
pub struct FrameCryptor<E: Environment = SystemEnv> {
    inner: Arc<CryptorInner<E>>,
    hook: Arc<dyn FrameTransformer>,
    path: Arc<dyn MediaPath>,
}

struct CryptorInner<E> {
    participant: ParticipantId,
    direction: Direction,
    algorithm: Algorithm,
    media_kind: MediaKind,
    key_provider: Arc<KeyProvider>,
    env: E,
    state: Mutex<CryptorState>,
}

struct CryptorState {
    enabled: bool,
    key_index: i32,
    observer: Option<Arc<dyn CryptorObserver>>,
    last_state: Option<CryptionState>,
    // Set once the owning FrameCryptor is dropped
    detached: bool,
}

impl CryptorState {
    /// Record an outcome. Returns true if it is a transition.
    fn record(&mut self, state: CryptionState, transitions: &mut Vec<CryptionState>) -> bool {
        if self.last_state == Some(state) {
            return false;
        }
        self.last_state = Some(state);
        transitions.push(state);
        true
    }
}

impl FrameCryptor<SystemEnv> {
    /// Cryptor that encrypts frames on an outgoing path.
    pub fn for_sender(
        participant: impl Into<ParticipantId>,
        algorithm: Algorithm,
        key_provider: Arc<KeyProvider>,
        path: Arc<dyn MediaPath>,
    ) -> Result<Self, CryptorError> {
        Self::with_env(SystemEnv, participant, Direction::Sender, algorithm, key_provider, path)
    }

    /// Cryptor that decrypts frames on an incoming path.
    pub fn for_receiver(
        participant: impl Into<ParticipantId>,
        algorithm: Algorithm,
        key_provider: Arc<KeyProvider>,
        path: Arc<dyn MediaPath>,
    ) -> Result<Self, CryptorError> {
        Self::with_env(SystemEnv, participant, Direction::Receiver, algorithm, key_provider, path)
    }
}

impl<E: Environment> FrameCryptor<E> {
    /// Cryptor drawing IVs from `env`.
    ///
    /// Installs itself as the path's transformer. The cryptor starts
    /// disabled with key index 0.
    ///
    /// # Errors
    ///
    /// `EmptyParticipant` if the identity is empty.
    pub fn with_env(
        env: E,
        participant: impl Into<ParticipantId>,
        direction: Direction,
        algorithm: Algorithm,
        key_provider: Arc<KeyProvider>,
        path: Arc<dyn MediaPath>,
    ) -> Result<Self, CryptorError> {
        let participant = participant.into();
        if participant.is_empty() {
            return Err(CryptorError::EmptyParticipant);
        }

        let inner = Arc::new(CryptorInner {
            participant,
            direction,
            algorithm,
            media_kind: path.media_kind(),
            key_provider,
            env,
            state: Mutex::new(CryptorState {
                enabled: false,
                key_index: 0,
                observer: None,
                last_state: None,
                detached: false,
            }),
        });

        let hook: Arc<dyn FrameTransformer> = inner.clone();
        path.install_transformer(Arc::clone(&hook));

        tracing::debug!(
            participant = %inner.participant,
            %direction,
            %algorithm,
            media_kind = %inner.media_kind,
            "frame cryptor attached"
        );

        Ok(Self { inner, hook, path })
    }

    /// Participant this cryptor is bound to.
    pub fn participant(&self) -> &ParticipantId {
        &self.inner.participant
    }

    /// Sender or receiver.
    pub fn direction(&self) -> Direction {
        self.inner.direction
    }

    /// Configured cipher.
    pub fn algorithm(&self) -> Algorithm {
        self.inner.algorithm
    }

    /// Media kind of the bound path.
    pub fn media_kind(&self) -> MediaKind {
        self.inner.media_kind
    }

    /// Shared key provider.
    pub fn key_provider(&self) -> &Arc<KeyProvider> {
        &self.inner.key_provider
    }

    /// Enable or disable encryption. Takes effect from the next frame.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.state.lock().enabled = enabled;
        tracing::debug!(participant = %self.inner.participant, enabled, "cryptor toggled");
    }

    /// Whether frames are being transformed.
    pub fn enabled(&self) -> bool {
        self.inner.state.lock().enabled
    }

    /// Key slot used for subsequent encryptions.
    ///
    /// Decryption always uses the index carried by the frame.
    pub fn set_key_index(&self, key_index: i32) {
        self.inner.state.lock().key_index = key_index;
    }

    /// Key slot used for encryption.
    pub fn key_index(&self) -> i32 {
        self.inner.state.lock().key_index
    }

    /// Install `observer`, replacing any previous one.
    pub fn register_observer(&self, observer: Arc<dyn CryptorObserver>) {
        self.inner.state.lock().observer = Some(observer);
    }

    /// Remove the observer. Later transitions are dropped.
    pub fn unregister_observer(&self) {
        self.inner.state.lock().observer = None;
    }

    /// Last reported state, `None` before the first enabled transform.
    pub fn last_state(&self) -> Option<CryptionState> {
        self.inner.state.lock().last_state
    }

    /// Transform one frame. `None` means the frame is dropped.
    pub fn transform(&self, frame: Frame) -> Option<Frame> {
        self.inner.process(frame)
    }
}

impl<E: Environment> CryptorInner<E> {
    fn process(&self, frame: Frame) -> Option<Frame> {
        let mut transitions = Vec::new();

        let (output, observer) = {
            let mut state = self.state.lock();
            if !state.enabled {
                return Some(frame);
            }

            let outcome = self.run(&frame, state.key_index);
            let output = match outcome {
                Ok((payload, ratchet_steps)) => {
                    if ratchet_steps > 0 {
                        state.record(CryptionState::KeyRatcheted, &mut transitions);
                    }
                    state.record(CryptionState::Ok, &mut transitions);
                    Some(frame.with_payload(payload))
                },
                Err(err) => {
                    if state.record(err.state(), &mut transitions) {
                        tracing::warn!(
                            participant = %self.participant,
                            direction = %self.direction,
                            error = %err,
                            "frame dropped"
                        );
                    }
                    None
                },
            };

            let observer = if transitions.is_empty() { None } else { state.observer.clone() };
            (output, observer)
        };

        for &state in &transitions {
            tracing::debug!(
                participant = %self.participant,
                direction = %self.direction,
                %state,
                "cryption state changed"
            );
            if let Some(observer) = &observer {
                // The cryptor may have been dropped or the observer replaced
                // since the snapshot was taken
                if !self.still_observed_by(observer) {
                    continue;
                }
                observer.on_state_changed(&self.participant, state);
            }
        }

        output
    }

    fn still_observed_by(&self, observer: &Arc<dyn CryptorObserver>) -> bool {
        let state = self.state.lock();
        !state.detached
            && state.observer.as_ref().is_some_and(|current| Arc::ptr_eq(current, observer))
    }

    fn run(&self, frame: &Frame, key_index: i32) -> Result<(Bytes, u32), TransformError> {
        let participant = self.participant.as_str();
        match self.direction {
            Direction::Sender => transform::encrypt(
                &self.env,
                &self.key_provider,
                participant,
                self.algorithm,
                key_index,
                frame,
            )
            .map(|payload| (payload, 0)),
            Direction::Receiver => {
                transform::decrypt(&self.key_provider, participant, self.algorithm, frame)
                    .map(|decrypted| (decrypted.payload, decrypted.ratchet_steps))
            },
        }
    }
}

impl<E: Environment> FrameTransformer for CryptorInner<E> {
    fn transform(&self, frame: Frame) -> Option<Frame> {
        self.process(frame)
    }
}

impl<E: Environment> Drop for FrameCryptor<E> {
    fn drop(&mut self) {
        self.path.remove_transformer(&self.hook);
        {
            let mut state = self.inner.state.lock();
            state.detached = true;
            state.observer = None;
        }

        tracing::debug!(
            participant = %self.inner.participant,
            direction = %self.inner.direction,
            "frame cryptor detached"
        );
    }
}

impl<E: Environment> fmt::Debug for FrameCryptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("FrameCryptor")
            .field("participant", &self.inner.participant)
            .field("direction", &self.inner.direction)
            .field("algorithm", &self.inner.algorithm)
            .field("media_kind", &self.inner.media_kind)
            .field("enabled", &state.enabled)
            .field("key_index", &state.key_index)
            .field("last_state", &state.last_state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use bytes::Bytes;

    use super::*;
    use crate::key_provider::KeyProviderOptions;

    #[derive(Default)]
    struct TestPath {
        installed: StdMutex<Option<Arc<dyn FrameTransformer>>>,
    }

    impl MediaPath for TestPath {
        fn media_kind(&self) -> MediaKind {
            MediaKind::Audio
        }

        fn install_transformer(&self, transformer: Arc<dyn FrameTransformer>) {
            *self.installed.lock().unwrap() = Some(transformer);
        }

        fn remove_transformer(&self, transformer: &Arc<dyn FrameTransformer>) {
            let mut installed = self.installed.lock().unwrap();
            if installed.as_ref().is_some_and(|current| Arc::ptr_eq(current, transformer)) {
                *installed = None;
            }
        }
    }

    fn provider() -> Arc<KeyProvider> {
        let keys = KeyProvider::new(KeyProviderOptions { shared_key: true, ..Default::default() })
            .unwrap();
        keys.set_shared_key(0, b"K").unwrap();
        keys
    }

    #[test]
    fn starts_disabled_at_index_zero() {
        let path = Arc::new(TestPath::default());
        let cryptor =
            FrameCryptor::for_sender("alice", Algorithm::AesGcm, provider(), path.clone()).unwrap();

        assert!(!cryptor.enabled());
        assert_eq!(cryptor.key_index(), 0);
        assert_eq!(cryptor.last_state(), None);
        assert_eq!(cryptor.direction(), Direction::Sender);
        assert_eq!(cryptor.media_kind(), MediaKind::Audio);
        assert!(path.installed.lock().unwrap().is_some());
    }

    #[test]
    fn empty_participant_rejected() {
        let path = Arc::new(TestPath::default());
        let result = FrameCryptor::for_receiver("", Algorithm::AesGcm, provider(), path.clone());

        assert!(matches!(result, Err(CryptorError::EmptyParticipant)));
        assert!(path.installed.lock().unwrap().is_none());
    }

    #[test]
    fn disabled_passes_through() {
        let path = Arc::new(TestPath::default());
        let cryptor =
            FrameCryptor::for_sender("alice", Algorithm::AesGcm, provider(), path).unwrap();

        let frame = Frame::audio(&b"clear"[..]);
        assert_eq!(cryptor.transform(frame.clone()), Some(frame));
        assert_eq!(cryptor.last_state(), None);
    }

    #[test]
    fn transform_through_installed_hook() {
        let path = Arc::new(TestPath::default());
        let cryptor =
            FrameCryptor::for_sender("alice", Algorithm::AesGcm, provider(), path.clone()).unwrap();
        cryptor.set_enabled(true);

        let hook = path.installed.lock().unwrap().clone().unwrap();
        let out = hook.transform(Frame::audio(&b"abcd"[..])).unwrap();

        assert_ne!(out.payload, Bytes::from_static(b"abcd"));
        assert_eq!(cryptor.last_state(), Some(CryptionState::Ok));
    }

    #[test]
    fn drop_detaches_only_own_hook() {
        let path = Arc::new(TestPath::default());
        let first =
            FrameCryptor::for_sender("alice", Algorithm::AesGcm, provider(), path.clone()).unwrap();
        let second =
            FrameCryptor::for_sender("alice", Algorithm::AesGcm, provider(), path.clone()).unwrap();

        drop(first);
        assert!(path.installed.lock().unwrap().is_some(), "replacement stays installed");

        drop(second);
        assert!(path.installed.lock().unwrap().is_none());
    }

}
