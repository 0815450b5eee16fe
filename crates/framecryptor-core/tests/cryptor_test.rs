//! Frame cryptor integration tests
//!
//! Drive sender and receiver cryptors through a minimal media path and check
//! the observable contract: pass-through when disabled, drop on failure,
//! change-only notifications, re-entrant observers, and detach on drop.

use std::{
    sync::{Arc, Mutex, Weak, mpsc},
    thread,
};

use bytes::Bytes;
use framecryptor_core::{
    Algorithm, ChannelObserver, CryptionState, CryptorObserver, Frame, FrameCryptor,
    FrameTransformer, KeyProvider, KeyProviderOptions, MediaKind, MediaPath, ParticipantId,
};

#[derive(Default)]
struct Path {
    kind: Option<MediaKind>,
    installed: Mutex<Option<Arc<dyn FrameTransformer>>>,
}

impl Path {
    fn video() -> Arc<Self> {
        Arc::new(Self { kind: Some(MediaKind::Video), ..Default::default() })
    }

    fn audio() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, frame: Frame) -> Option<Frame> {
        let hook = self.installed.lock().unwrap().clone();
        match hook {
            Some(hook) => hook.transform(frame),
            None => Some(frame),
        }
    }

    fn is_attached(&self) -> bool {
        self.installed.lock().unwrap().is_some()
    }
}

impl MediaPath for Path {
    fn media_kind(&self) -> MediaKind {
        self.kind.unwrap_or(MediaKind::Audio)
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

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<CryptionState>>,
}

impl Recorder {
    fn take(&self) -> Vec<CryptionState> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl CryptorObserver for Recorder {
    fn on_state_changed(&self, _participant: &ParticipantId, state: CryptionState) {
        self.events.lock().unwrap().push(state);
    }
}

fn provider(window: u32) -> Arc<KeyProvider> {
    KeyProvider::new(KeyProviderOptions {
        shared_key: true,
        ratchet_window_size: window,
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn disabled_cryptor_is_transparent_and_silent() {
    let keys = provider(0);
    let path = Path::audio();
    let cryptor =
        FrameCryptor::for_receiver("alice", Algorithm::AesGcm, keys, path.clone()).unwrap();
    let recorder = Arc::new(Recorder::default());
    cryptor.register_observer(recorder.clone());

    for payload in [&b""[..], &b"garbage"[..], &b"\xFF\x01\x02\x03\x04\x05"[..]] {
        let frame = Frame::audio(payload);
        assert_eq!(path.push(frame.clone()), Some(frame));
    }

    assert!(recorder.take().is_empty());
    assert_eq!(cryptor.last_state(), None);
}

#[test]
fn missing_key_drops_frame_and_reports_once() {
    let keys = provider(0);
    let path = Path::audio();
    let cryptor =
        FrameCryptor::for_sender("alice", Algorithm::AesGcm, keys.clone(), path.clone()).unwrap();
    let recorder = Arc::new(Recorder::default());
    cryptor.register_observer(recorder.clone());
    cryptor.set_enabled(true);

    for _ in 0..5 {
        assert_eq!(path.push(Frame::audio(&b"secret"[..])), None);
    }
    assert_eq!(recorder.take(), vec![CryptionState::MissingKey]);

    // Late key delivery recovers
    keys.set_shared_key(0, b"K").unwrap();
    assert!(path.push(Frame::audio(&b"secret"[..])).is_some());
    assert!(path.push(Frame::audio(&b"secret"[..])).is_some());
    assert_eq!(recorder.take(), vec![CryptionState::Ok]);
}

#[test]
fn out_of_ring_key_index_is_internal_error() {
    let keys = provider(0);
    keys.set_shared_key(0, b"K").unwrap();
    let path = Path::audio();
    let cryptor = FrameCryptor::for_sender("alice", Algorithm::AesGcm, keys, path.clone()).unwrap();
    cryptor.set_enabled(true);
    cryptor.set_key_index(99);

    assert_eq!(path.push(Frame::audio(&b"secret"[..])), None);
    assert_eq!(cryptor.last_state(), Some(CryptionState::InternalError));
}

#[test]
fn key_index_selects_encryption_slot_only() {
    let keys = provider(0);
    keys.set_shared_key(0, b"K0").unwrap();
    keys.set_shared_key(3, b"K3").unwrap();

    let out = Path::audio();
    let inbound = Path::audio();
    let sender = FrameCryptor::for_sender("alice", Algorithm::AesGcm, keys.clone(), out.clone())
        .unwrap();
    let receiver =
        FrameCryptor::for_receiver("alice", Algorithm::AesGcm, keys, inbound.clone()).unwrap();
    sender.set_enabled(true);
    receiver.set_enabled(true);
    sender.set_key_index(3);

    let sealed = out.push(Frame::audio(&b"hello"[..])).unwrap();
    assert_eq!(sealed.payload[sealed.payload.len() - 1], 3);

    // Receiver's own key index is irrelevant for decryption
    receiver.set_key_index(0);
    let opened = inbound.push(sealed).unwrap();
    assert_eq!(opened.payload, Bytes::from_static(b"hello"));
}

#[test]
fn shared_key_ratchet_scenario() {
    let sender_keys = provider(2);
    let receiver_keys = provider(2);
    sender_keys.set_key("alice", 0, b"K").unwrap();
    receiver_keys.set_key("alice", 0, b"K").unwrap();

    let out = Path::audio();
    let inbound = Path::audio();
    let sender =
        FrameCryptor::for_sender("alice", Algorithm::AesGcm, sender_keys.clone(), out.clone())
            .unwrap();
    let receiver = FrameCryptor::for_receiver(
        "alice",
        Algorithm::AesGcm,
        receiver_keys.clone(),
        inbound.clone(),
    )
    .unwrap();
    let recorder = Arc::new(Recorder::default());
    receiver.register_observer(recorder.clone());
    sender.set_enabled(true);
    receiver.set_enabled(true);

    let c1 = out.push(Frame::audio(&b"abcd"[..])).unwrap();
    assert_ne!(c1.payload, Bytes::from_static(b"abcd"));
    assert_eq!(inbound.push(c1).unwrap().payload, Bytes::from_static(b"abcd"));
    assert_eq!(recorder.take(), vec![CryptionState::Ok]);

    sender_keys.ratchet_key("alice", 0).unwrap();
    let c2 = out.push(Frame::audio(&b"efgh"[..])).unwrap();
    assert_eq!(inbound.push(c2).unwrap().payload, Bytes::from_static(b"efgh"));

    assert_eq!(recorder.take(), vec![CryptionState::KeyRatcheted, CryptionState::Ok]);
    assert_eq!(receiver.last_state(), Some(CryptionState::Ok));
    assert_eq!(receiver_keys.get_key("alice", 0), sender_keys.get_key("alice", 0));
}

#[test]
fn decryption_failure_drops_frame() {
    let sender_keys = provider(1);
    let receiver_keys = provider(1);
    sender_keys.set_shared_key(0, b"right").unwrap();
    receiver_keys.set_shared_key(0, b"wrong").unwrap();

    let out = Path::video();
    let inbound = Path::video();
    let sender =
        FrameCryptor::for_sender("bob", Algorithm::AesGcm, sender_keys, out.clone()).unwrap();
    let receiver =
        FrameCryptor::for_receiver("bob", Algorithm::AesGcm, receiver_keys, inbound.clone())
            .unwrap();
    sender.set_enabled(true);
    receiver.set_enabled(true);

    let sealed = out.push(Frame::video(&b"0123456789 key frame body"[..], true)).unwrap();
    assert_eq!(inbound.push(sealed), None);
    assert_eq!(receiver.last_state(), Some(CryptionState::DecryptionFailed));
}

#[test]
fn algorithm_mismatch_reports_decryption_failed() {
    let keys = provider(0);
    keys.set_shared_key(0, b"K").unwrap();
    let out = Path::audio();
    let inbound = Path::audio();
    let sender =
        FrameCryptor::for_sender("carol", Algorithm::AesCbc, keys.clone(), out.clone()).unwrap();
    let receiver =
        FrameCryptor::for_receiver("carol", Algorithm::AesGcm, keys, inbound.clone()).unwrap();
    sender.set_enabled(true);
    receiver.set_enabled(true);

    let sealed = out.push(Frame::audio(&b"payload"[..])).unwrap();
    assert_eq!(inbound.push(sealed), None);
    assert_eq!(receiver.last_state(), Some(CryptionState::DecryptionFailed));
}

#[test]
fn observer_replacement_and_removal() {
    let keys = provider(0);
    let path = Path::audio();
    let cryptor = FrameCryptor::for_sender("dave", Algorithm::AesGcm, keys.clone(), path.clone())
        .unwrap();
    cryptor.set_enabled(true);

    let first = Arc::new(Recorder::default());
    let second = Arc::new(Recorder::default());
    cryptor.register_observer(first.clone());
    cryptor.register_observer(second.clone());

    path.push(Frame::audio(&b"x"[..]));
    assert!(first.take().is_empty());
    assert_eq!(second.take(), vec![CryptionState::MissingKey]);

    cryptor.unregister_observer();
    keys.set_shared_key(0, b"K").unwrap();
    path.push(Frame::audio(&b"x"[..]));
    assert!(second.take().is_empty());
    assert_eq!(cryptor.last_state(), Some(CryptionState::Ok));
}

#[test]
fn observer_may_reenter_cryptor() {
    let keys = provider(0);
    let path = Path::audio();
    let cryptor =
        Arc::new(FrameCryptor::for_sender("erin", Algorithm::AesGcm, keys, path.clone()).unwrap());

    let handle: Arc<Mutex<Weak<FrameCryptor>>> = Arc::new(Mutex::new(Weak::new()));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let observer = {
        let handle = Arc::clone(&handle);
        let seen = Arc::clone(&seen);
        move |participant: &ParticipantId, state: CryptionState| {
            seen.lock().unwrap().push((participant.to_string(), state));
            let cryptor = handle.lock().unwrap().upgrade();
            if let Some(cryptor) = cryptor {
                assert!(cryptor.enabled());
                cryptor.unregister_observer();
                cryptor.set_key_index(1);
            }
        }
    };
    *handle.lock().unwrap() = Arc::downgrade(&cryptor);
    cryptor.register_observer(Arc::new(observer));
    cryptor.set_enabled(true);

    assert_eq!(path.push(Frame::audio(&b"x"[..])), None);
    assert_eq!(seen.lock().unwrap().clone(), vec![("erin".to_string(), CryptionState::MissingKey)]);
    assert_eq!(cryptor.key_index(), 1);
}

#[test]
fn channel_observer_receives_events_asynchronously() {
    let keys = provider(0);
    let path = Path::audio();
    let cryptor = FrameCryptor::for_sender("frank", Algorithm::AesGcm, keys.clone(), path.clone())
        .unwrap();
    let (observer, mut rx) = ChannelObserver::new();
    cryptor.register_observer(Arc::new(observer));
    cryptor.set_enabled(true);

    path.push(Frame::audio(&b"x"[..]));
    keys.set_shared_key(0, b"K").unwrap();
    path.push(Frame::audio(&b"x"[..]));

    let first = rx.try_recv().unwrap();
    let second = rx.try_recv().unwrap();
    assert_eq!(first.participant.as_str(), "frank");
    assert_eq!(first.state, CryptionState::MissingKey);
    assert_eq!(second.state, CryptionState::Ok);
    assert!(rx.try_recv().is_err());
}

#[test]
fn drop_detaches_and_silences() {
    let keys = provider(0);
    let path = Path::audio();
    let recorder = Arc::new(Recorder::default());
    {
        let cryptor =
            FrameCryptor::for_sender("gina", Algorithm::AesGcm, keys, path.clone()).unwrap();
        cryptor.register_observer(recorder.clone());
        cryptor.set_enabled(true);
        assert!(path.is_attached());
    }

    assert!(!path.is_attached());
    let frame = Frame::audio(&b"after drop"[..]);
    assert_eq!(path.push(frame.clone()), Some(frame));
    assert!(recorder.take().is_empty());
    assert_eq!(Arc::strong_count(&recorder), 1, "observer released on drop");
}

/// Observer that parks inside its `KeyRatcheted` callback until released.
struct ParkedObserver {
    entered: mpsc::Sender<()>,
    release: Mutex<mpsc::Receiver<()>>,
    seen: Mutex<Vec<CryptionState>>,
}

impl CryptorObserver for ParkedObserver {
    fn on_state_changed(&self, _participant: &ParticipantId, state: CryptionState) {
        self.seen.lock().unwrap().push(state);
        if state == CryptionState::KeyRatcheted {
            self.entered.send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
        }
    }
}

/// Run a receiver catch-up (`KeyRatcheted` then `Ok`) and call `interrupt`
/// while the observer is parked in the first callback. Whatever `interrupt`
/// returns stays alive until the catch-up finishes. Returns every state the
/// observer saw.
fn interrupt_catch_up(
    interrupt: impl FnOnce(FrameCryptor) -> Option<FrameCryptor>,
) -> Vec<CryptionState> {
    let sender_keys = provider(2);
    let receiver_keys = provider(2);
    sender_keys.set_shared_key(0, b"K").unwrap();
    receiver_keys.set_shared_key(0, b"K").unwrap();
    sender_keys.ratchet_shared_key(0).unwrap();

    let out = Path::video();
    let inbound = Path::video();
    let sender = FrameCryptor::for_sender("ivy", Algorithm::AesGcm, sender_keys, out.clone()).unwrap();
    let receiver =
        FrameCryptor::for_receiver("ivy", Algorithm::AesGcm, receiver_keys, inbound.clone()).unwrap();
    sender.set_enabled(true);
    receiver.set_enabled(true);

    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let observer = Arc::new(ParkedObserver {
        entered: entered_tx,
        release: Mutex::new(release_rx),
        seen: Mutex::new(Vec::new()),
    });
    receiver.register_observer(observer.clone());

    let wire = out.push(Frame::video(&b"catch up"[..], true)).unwrap();
    let hook = inbound.installed.lock().unwrap().clone().unwrap();

    thread::scope(|scope| {
        let pipeline = scope.spawn(move || hook.transform(wire));
        entered_rx.recv().unwrap();
        let kept = interrupt(receiver);
        release_tx.send(()).unwrap();
        assert!(pipeline.join().unwrap().is_some(), "in-flight frame still decrypts");
        drop(kept);
    });

    observer.seen.lock().unwrap().clone()
}

#[test]
fn drop_during_dispatch_silences_remaining_transitions() {
    let seen = interrupt_catch_up(|receiver| {
        drop(receiver);
        None
    });

    assert_eq!(seen, vec![CryptionState::KeyRatcheted]);
}

#[test]
fn unregister_during_dispatch_silences_remaining_transitions() {
    let seen = interrupt_catch_up(|receiver| {
        receiver.unregister_observer();
        assert_eq!(receiver.last_state(), Some(CryptionState::Ok));
        Some(receiver)
    });

    assert_eq!(seen, vec![CryptionState::KeyRatcheted]);
}

#[test]
fn concurrent_pipeline_threads() {
    let keys = provider(0);
    keys.set_shared_key(0, b"K").unwrap();
    let out = Path::video();
    let inbound = Path::video();
    let sender =
        FrameCryptor::for_sender("hank", Algorithm::AesGcm, keys.clone(), out.clone()).unwrap();
    let receiver =
        FrameCryptor::for_receiver("hank", Algorithm::AesGcm, keys, inbound.clone()).unwrap();
    let recorder = Arc::new(Recorder::default());
    receiver.register_observer(recorder.clone());
    sender.set_enabled(true);
    receiver.set_enabled(true);

    thread::scope(|scope| {
        for worker in 0u8..4 {
            let out = &out;
            let inbound = &inbound;
            scope.spawn(move || {
                for seq in 0u8..50 {
                    let payload = vec![worker, seq, 0xAB, 0xCD, 0xEF];
                    let sealed = out.push(Frame::video(payload.clone(), seq % 10 == 0)).unwrap();
                    let opened = inbound.push(sealed).unwrap();
                    assert_eq!(opened.payload, Bytes::from(payload));
                }
            });
        }
    });

    assert_eq!(recorder.take(), vec![CryptionState::Ok]);
    assert_eq!(sender.last_state(), Some(CryptionState::Ok));
}
