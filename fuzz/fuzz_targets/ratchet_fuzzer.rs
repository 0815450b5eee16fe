//! Fuzz target for key provider operations and ratchet convergence
//!
//! # Strategy
//!
//! - Arbitrary key material (empty, short, long)
//! - Arbitrary key indices, including negative and out-of-ring values
//! - Random interleavings of set, ratchet, remove and send operations
//!
//! # Invariants
//!
//! - Provider operations never panic on any index
//! - Out-of-ring indices are rejected, never wrapped
//! - Two providers applying the same set/ratchet sequence hold equal keys
//! - A receiver lagging by at most the window decrypts every frame and ends
//!   up at the sender's key

#![no_main]

use std::collections::HashMap;

use arbitrary::Arbitrary;
use framecryptor_core::{Algorithm, Frame, KeyProvider, KeyProviderOptions, SystemEnv, transform};
use libfuzzer_sys::fuzz_target;

const PARTICIPANT: &str = "remote";
const WINDOW: u32 = 4;

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    shared_key: bool,
    ring_size: u8,
    operations: Vec<Operation>,
}

#[derive(Debug, Clone, Arbitrary)]
enum Operation {
    /// Install the same key on both sides
    SetKey { index: i16, key: Vec<u8> },
    /// Ratchet only the sender (clamped so the receiver can catch up)
    RatchetSender { index: i16 },
    /// Ratchet both sides in lockstep
    RatchetBoth { index: i16 },
    /// Drop the participant from both sides
    Remove,
    /// Send a frame at the index
    Send { index: i16, payload: Vec<u8> },
}

fuzz_target!(|scenario: Scenario| {
    let options = KeyProviderOptions {
        shared_key: scenario.shared_key,
        key_ring_size: usize::from(scenario.ring_size.max(1)),
        ratchet_window_size: WINDOW,
        ..KeyProviderOptions::default()
    };
    let ring_size = options.key_ring_size;
    let sender = KeyProvider::new(options.clone()).expect("ring size within bounds");
    let receiver = KeyProvider::new(options).expect("ring size within bounds");
    let env = SystemEnv::new();
    // Sender generations not yet seen by the receiver, per slot
    let mut lag: HashMap<i32, u32> = HashMap::new();

    for operation in scenario.operations.into_iter().take(64) {
        match operation {
            Operation::SetKey { index, key } => {
                let index = i32::from(index);
                let in_ring = usize::try_from(index).is_ok_and(|i| i < ring_size);
                assert_eq!(sender.set_key(PARTICIPANT, index, &key).is_ok(), in_ring);
                assert_eq!(receiver.set_key(PARTICIPANT, index, &key).is_ok(), in_ring);
                if in_ring {
                    lag.remove(&index);
                }
            },
            Operation::RatchetSender { index } => {
                let index = i32::from(index);
                let behind = lag.entry(index).or_default();
                if *behind < WINDOW && sender.ratchet_key(PARTICIPANT, index).is_ok() {
                    *behind += 1;
                }
            },
            Operation::RatchetBoth { index } => {
                let index = i32::from(index);
                let sent = sender.ratchet_key(PARTICIPANT, index);
                let received = receiver.ratchet_key(PARTICIPANT, index);
                assert_eq!(sent.is_ok(), received.is_ok());
            },
            Operation::Remove => {
                sender.remove_participant(PARTICIPANT);
                receiver.remove_participant(PARTICIPANT);
                if !scenario.shared_key {
                    lag.clear();
                }
            },
            Operation::Send { index, payload } => {
                let index = i32::from(index);
                let frame = Frame::video(payload.clone(), false);
                let Ok(sealed) =
                    transform::encrypt(&env, &sender, PARTICIPANT, Algorithm::AesGcm, index, &frame)
                else {
                    continue;
                };
                let clear =
                    transform::decrypt(&receiver, PARTICIPANT, Algorithm::AesGcm, &frame.with_payload(sealed))
                        .expect("receiver within window decrypts");
                assert_eq!(&clear.payload[..], &payload[..]);
                lag.remove(&index);
                assert_eq!(receiver.get_key(PARTICIPANT, index), sender.get_key(PARTICIPANT, index));
            },
        }
    }
});
