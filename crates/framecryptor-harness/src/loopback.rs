//! Loopback call: one sender pipeline feeding one receiver pipeline.
//!
//! ```text
//!  payload ─► outbound path ─► sender cryptor ─► wire ─► inbound path ─► receiver cryptor ─► decoder
//!                               (sender keys)                             (receiver keys)
//! ```
//!
//! Sender and receiver hold separate [`KeyProvider`]s provisioned with the
//! same key, like two endpoints that received the key out of band. Ratchets
//! on the sender side are not communicated; the receiver has to catch up
//! through its ratchet window.

use std::sync::Arc;

use bytes::Bytes;
use framecryptor_core::{
    CryptionState, Direction, Frame, FrameCryptor, KeyError, KeyProvider, MediaKind,
};
use parking_lot::Mutex;

use crate::{
    config::SimConfig,
    error::SimError,
    invariants::{CallSnapshot, FrameRecord},
    recorder::RecordingObserver,
    sim_env::SimEnv,
    sim_path::SimMediaPath,
};

/// Fate of one frame sent through the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Frame reached the decoder with this payload
    Delivered(Bytes),
    /// Sender cryptor dropped the frame
    DroppedAtSender,
    /// Receiver cryptor dropped the frame
    DroppedAtReceiver,
}

/// Two cryptors wired back to back.
pub struct LoopbackCall {
    participant: String,
    media: MediaKind,
    key_index: i32,
    magic_bytes: Vec<u8>,
    sender_keys: Arc<KeyProvider>,
    receiver_keys: Arc<KeyProvider>,
    outbound: Arc<SimMediaPath>,
    inbound: Arc<SimMediaPath>,
    sender: FrameCryptor<SimEnv>,
    receiver: FrameCryptor<SimEnv>,
    sender_events: Arc<RecordingObserver>,
    receiver_events: Arc<RecordingObserver>,
    frames: Mutex<Vec<FrameRecord>>,
    generations: Mutex<Vec<u32>>,
}

impl LoopbackCall {
    /// Build the call, provision the initial key and enable both cryptors.
    pub fn new(config: &SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let algorithm = config.algorithm()?;
        let media = config.media_kind()?;
        let options = config.key_provider_options();
        let env = SimEnv::with_seed(config.seed);

        let sender_keys = KeyProvider::new(options.clone())?;
        let receiver_keys = KeyProvider::new(options)?;
        let outbound = SimMediaPath::new(media);
        let inbound = SimMediaPath::new(media);

        let sender = FrameCryptor::with_env(
            env.clone(),
            config.participant.as_str(),
            Direction::Sender,
            algorithm,
            Arc::clone(&sender_keys),
            outbound.clone(),
        )?;
        let receiver = FrameCryptor::with_env(
            env,
            config.participant.as_str(),
            Direction::Receiver,
            algorithm,
            Arc::clone(&receiver_keys),
            inbound.clone(),
        )?;

        let sender_events = Arc::new(RecordingObserver::new());
        let receiver_events = Arc::new(RecordingObserver::new());
        sender.register_observer(sender_events.clone());
        receiver.register_observer(receiver_events.clone());
        sender.set_key_index(config.key_index);

        let call = Self {
            participant: config.participant.clone(),
            media,
            key_index: config.key_index,
            magic_bytes: config.magic_bytes.as_bytes().to_vec(),
            sender_keys,
            receiver_keys,
            outbound,
            inbound,
            sender,
            receiver,
            sender_events,
            receiver_events,
            frames: Mutex::new(Vec::new()),
            generations: Mutex::new(Vec::new()),
        };
        call.provision(config.key.as_bytes())?;
        call.sender.set_enabled(true);
        call.receiver.set_enabled(true);

        tracing::info!(
            participant = %call.participant,
            %algorithm,
            media = %media,
            key_index = call.key_index,
            "loopback call ready"
        );
        Ok(call)
    }

    /// Install `key` on both sides at the call's key index.
    ///
    /// Resets the receiver generation history, since fresh material restarts
    /// at generation 0.
    pub fn provision(&self, key: &[u8]) -> Result<(), KeyError> {
        self.sender_keys.set_key(&self.participant, self.key_index, key)?;
        self.receiver_keys.set_key(&self.participant, self.key_index, key)?;
        self.generations.lock().clear();
        Ok(())
    }

    /// Ratchet the sender's key without telling the receiver.
    pub fn ratchet_sender(&self) -> Result<(), KeyError> {
        self.sender_keys.ratchet_key(&self.participant, self.key_index).map(|_| ())
    }

    /// Send one frame end to end.
    pub fn send(&self, payload: impl Into<Bytes>, key_frame: bool) -> Delivery {
        let payload = payload.into();
        let frame = match self.media {
            MediaKind::Audio => Frame::audio(payload.clone()),
            MediaKind::Video => Frame::video(payload.clone(), key_frame),
        };

        let encrypted = self.sender.enabled();
        let wire = self.outbound.push(frame);
        let delivered = wire.clone().and_then(|frame| self.inbound.push(frame));

        let delivery = match (&wire, &delivered) {
            (None, _) => Delivery::DroppedAtSender,
            (Some(_), None) => Delivery::DroppedAtReceiver,
            (Some(_), Some(frame)) => Delivery::Delivered(frame.payload.clone()),
        };

        self.frames.lock().push(FrameRecord {
            plaintext: payload,
            encrypted,
            wire: wire.map(|frame| frame.payload),
            delivered: delivered.map(|frame| frame.payload),
        });
        // Read under the history lock so concurrent senders append in order
        let mut history = self.generations.lock();
        if let Some(generation) =
            self.receiver_keys.handler(&self.participant).and_then(|h| h.generation(self.key_index))
        {
            history.push(generation);
        }
        drop(history);

        delivery
    }

    /// Sender-side cryptor.
    pub fn sender(&self) -> &FrameCryptor<SimEnv> {
        &self.sender
    }

    /// Receiver-side cryptor.
    pub fn receiver(&self) -> &FrameCryptor<SimEnv> {
        &self.receiver
    }

    /// Sender key provider.
    pub fn sender_keys(&self) -> &Arc<KeyProvider> {
        &self.sender_keys
    }

    /// Receiver key provider.
    pub fn receiver_keys(&self) -> &Arc<KeyProvider> {
        &self.receiver_keys
    }

    /// Transitions reported by the sender cryptor.
    pub fn sender_states(&self) -> Vec<CryptionState> {
        self.sender_events.states(&self.participant)
    }

    /// Transitions reported by the receiver cryptor.
    pub fn receiver_states(&self) -> Vec<CryptionState> {
        self.receiver_events.states(&self.participant)
    }

    /// Frames (forwarded, dropped) on the outbound and inbound paths.
    pub fn path_counts(&self) -> ((u64, u64), (u64, u64)) {
        (
            (self.outbound.forwarded(), self.outbound.dropped()),
            (self.inbound.forwarded(), self.inbound.dropped()),
        )
    }

    /// Observable state for invariant checks.
    pub fn snapshot(&self) -> CallSnapshot {
        CallSnapshot {
            magic_bytes: self.magic_bytes.clone(),
            frames: self.frames.lock().clone(),
            sender_states: self.sender_states(),
            receiver_states: self.receiver_states(),
            receiver_generations: self.generations.lock().clone(),
        }
    }
}
