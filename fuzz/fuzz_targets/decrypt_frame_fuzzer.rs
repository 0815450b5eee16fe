//! Fuzz target for receiver-side frame decryption
//!
//! Encrypted frames arrive from the network and are fully attacker
//! controlled, including the trailer that names the key index, algorithm and
//! IV length.
//!
//! # Strategy
//!
//! - Raw bytes: arbitrary payloads straight into the decrypt path
//! - Tampered frames: a valid frame with one byte flipped or truncated
//! - Forged trailers: arbitrary trailer fields appended to arbitrary bodies
//!
//! # Invariants
//!
//! - NEVER panic, whatever the payload
//! - Tampered frames never decrypt, whatever the algorithm
//! - A failed decryption never moves the receiver's key slot

#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use framecryptor_core::{
    Algorithm, Frame, FrameTrailer, KeyProvider, KeyProviderOptions, SystemEnv, transform,
};
use libfuzzer_sys::fuzz_target;

const PARTICIPANT: &str = "remote";

#[derive(Debug, Clone, Arbitrary)]
enum Input {
    Raw { video: bool, key_frame: bool, bytes: Vec<u8> },
    Tampered { cbc: bool, payload: Vec<u8>, flip_at: u16, flip: u8, truncate: u8 },
    Forged { body: Vec<u8>, header_len: u8, algorithm: u8, iv_len: u8, key_index: u8 },
}

fn frame(video: bool, key_frame: bool, payload: impl Into<Bytes>) -> Frame {
    if video { Frame::video(payload, key_frame) } else { Frame::audio(payload) }
}

fn keys(window: u32) -> std::sync::Arc<KeyProvider> {
    let options = KeyProviderOptions { ratchet_window_size: window, ..KeyProviderOptions::default() };
    let keys = KeyProvider::new(options).expect("default options are valid");
    keys.set_key(PARTICIPANT, 0, b"fuzz key").expect("slot 0 exists");
    keys
}

fuzz_target!(|input: Input| {
    let receiver = keys(4);
    let before = receiver.get_key(PARTICIPANT, 0);

    match input {
        Input::Raw { video, key_frame, bytes } => {
            for algorithm in [Algorithm::AesGcm, Algorithm::AesCbc] {
                let _ = transform::decrypt(&receiver, PARTICIPANT, algorithm, &frame(video, key_frame, bytes.clone()));
            }
        },
        Input::Tampered { cbc, payload, flip_at, flip, truncate } => {
            let algorithm = if cbc { Algorithm::AesCbc } else { Algorithm::AesGcm };
            if payload.is_empty() || flip == 0 {
                return;
            }
            let sender = keys(4);
            let clear = frame(true, true, payload);
            let sealed =
                transform::encrypt(&SystemEnv::new(), &sender, PARTICIPANT, algorithm, 0, &clear)
                    .expect("sender has a key at slot 0");
            if sealed == clear.payload {
                // marker frame, sent in clear
                return;
            }

            let mut wire = sealed.to_vec();
            let at = usize::from(flip_at) % wire.len();
            wire[at] ^= flip;
            let keep = wire.len().saturating_sub(usize::from(truncate % 4));
            wire.truncate(keep);

            let result = transform::decrypt(&receiver, PARTICIPANT, algorithm, &clear.with_payload(wire));
            assert!(result.is_err(), "tampered frame decrypted");
            assert_eq!(receiver.get_key(PARTICIPANT, 0), before);
        },
        Input::Forged { body, header_len, algorithm, iv_len, key_index } => {
            let mut wire = body;
            wire.extend_from_slice(&[header_len, algorithm, iv_len, key_index]);
            let _ = FrameTrailer::parse(&wire);
            let result = transform::decrypt(&receiver, PARTICIPANT, Algorithm::AesGcm, &frame(false, false, wire));
            if result.is_err() {
                assert_eq!(receiver.get_key(PARTICIPANT, 0), before);
            }
        },
    }
});
