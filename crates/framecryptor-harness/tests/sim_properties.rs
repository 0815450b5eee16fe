//! Property-based simulation runs
//!
//! Random scenarios (seed, thread count, ratchet schedule, window) must
//! always deliver every frame and satisfy every standard invariant, as long
//! as the sender never ratchets further ahead than the receiver's window.

use framecryptor_core::CryptionState;
use framecryptor_harness::{SimConfig, sim_driver};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_concurrent_ratcheting_run_is_clean(
        seed in any::<u64>(),
        workers in 1usize..5,
        ratchet_every in 4u32..20,
        frames in 10u32..80,
        window in 1u32..4,
        video in any::<bool>(),
        shared_key in any::<bool>(),
        cbc in any::<bool>(),
    ) {
        let config = SimConfig {
            seed,
            workers,
            ratchet_every,
            frames,
            ratchet_window_size: window,
            media: if video { "video" } else { "audio" }.to_string(),
            shared_key,
            algorithm: if cbc { "aes-cbc" } else { "aes-gcm" }.to_string(),
            frame_size: 64,
            ..SimConfig::default()
        };

        let report = sim_driver::run(&config).unwrap();

        prop_assert!(report.is_clean(), "{:?}", report);
        prop_assert_eq!(report.sent, u64::from(frames));
        prop_assert_eq!(report.receiver_generation, Some(report.ratchets));
        prop_assert!(!report.receiver_states.contains(&CryptionState::DecryptionFailed));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_cbc_any_frame_size_is_clean(
        seed in any::<u64>(),
        workers in 1usize..5,
        frames in 1u32..60,
        frame_size in 1usize..300,
    ) {
        let config = SimConfig {
            seed,
            workers,
            frames,
            frame_size,
            algorithm: "aes-cbc".to_string(),
            ratchet_every: 0,
            ..SimConfig::default()
        };

        let report = sim_driver::run(&config).unwrap();

        prop_assert!(report.is_clean(), "{:?}", report);
        prop_assert_eq!(report.ratchets, 0);
        prop_assert_eq!(report.receiver_states, vec![CryptionState::Ok]);
    }
}

#[test]
fn zero_frames_is_a_clean_noop() {
    let report = sim_driver::run(&SimConfig { frames: 0, ..SimConfig::default() }).unwrap();

    assert!(report.is_clean());
    assert_eq!(report.sent, 0);
    assert!(report.receiver_states.is_empty());
}
