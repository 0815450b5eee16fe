//! Multi-threaded loopback simulation.
//!
//! Frames are sent in rounds of `ratchet_every` frames. Within a round,
//! `workers` threads push frames through the call concurrently, the way a
//! media pipeline calls a cryptor from several threads. Between rounds the
//! sender ratchets its key without telling the receiver.
//!
//! Payloads are derived from the seed and the frame number, so they are the
//! same whatever thread sends them.

use std::thread;

use framecryptor_core::CryptionState;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::{
    config::SimConfig,
    error::SimError,
    invariants::{InvariantRegistry, Violation},
    loopback::{Delivery, LoopbackCall},
};

/// Outcome of a simulation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimReport {
    /// Frames handed to the sender
    pub sent: u64,
    /// Frames that reached the decoder
    pub delivered: u64,
    /// Frames dropped by the sender cryptor
    pub dropped_at_sender: u64,
    /// Frames dropped by the receiver cryptor
    pub dropped_at_receiver: u64,
    /// Sender ratchets performed
    pub ratchets: u32,
    /// Receiver slot generation at the end of the run
    pub receiver_generation: Option<u32>,
    /// Transitions reported by the sender
    pub sender_states: Vec<CryptionState>,
    /// Transitions reported by the receiver
    pub receiver_states: Vec<CryptionState>,
    /// Invariants violated by the run
    pub violations: Vec<Violation>,
}

impl SimReport {
    /// True if every frame was delivered and no invariant was violated.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.delivered == self.sent
    }
}

/// Payload for frame `seq` of a run seeded with `seed`.
pub fn frame_payload(seed: u64, seq: u32, size: usize) -> Vec<u8> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed ^ ((u64::from(seq) << 32) | 0x5EED));
    let mut payload = vec![0u8; size];
    rng.fill_bytes(&mut payload);
    payload
}

/// Run the scenario described by `config`.
pub fn run(config: &SimConfig) -> Result<SimReport, SimError> {
    let call = LoopbackCall::new(config)?;
    let round_len = if config.ratchet_every == 0 { config.frames } else { config.ratchet_every };

    let mut report = SimReport::default();
    let mut start = 0u32;
    while start < config.frames {
        let end = start.saturating_add(round_len.max(1)).min(config.frames);
        let tallies = run_round(&call, config, start..end);
        for delivery in tallies {
            report.sent += 1;
            match delivery {
                Delivery::Delivered(_) => report.delivered += 1,
                Delivery::DroppedAtSender => report.dropped_at_sender += 1,
                Delivery::DroppedAtReceiver => report.dropped_at_receiver += 1,
            }
        }

        start = end;
        if start < config.frames && config.ratchet_every > 0 {
            call.ratchet_sender()?;
            report.ratchets += 1;
            tracing::debug!(frame = start, ratchets = report.ratchets, "sender ratcheted");
        }
    }

    let snapshot = call.snapshot();
    report.violations = InvariantRegistry::standard().check_all(&snapshot).err().unwrap_or_default();
    report.receiver_generation = snapshot.receiver_generations.last().copied();
    report.sender_states = snapshot.sender_states;
    report.receiver_states = snapshot.receiver_states;

    for violation in &report.violations {
        tracing::warn!(%violation, "invariant violated");
    }
    Ok(report)
}

fn run_round(
    call: &LoopbackCall,
    config: &SimConfig,
    frames: std::ops::Range<u32>,
) -> Vec<Delivery> {
    let workers = config.workers.max(1);
    thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let frames = frames.clone();
                scope.spawn(move || {
                    frames
                        .skip(worker)
                        .step_by(workers)
                        .map(|seq| {
                            let payload = frame_payload(config.seed, seq, config.frame_size);
                            let key_frame = config.key_frame_interval > 0
                                && seq % config.key_frame_interval == 0;
                            call.send(payload, key_frame)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    })
}
