//! Deterministic simulation harness for frame cryptors.
//!
//! Wires a sender cryptor and a receiver cryptor back to back through
//! simulated media paths, drives them from several threads, and checks the
//! result against invariants.
//!
//! # Components
//!
//! - [`SimEnv`]: seeded [`framecryptor_core::Environment`] for reproducible
//!   IVs
//! - [`SimMediaPath`]: hook point that counts forwarded and dropped frames
//! - [`LoopbackCall`]: two endpoints with separate key providers
//! - [`RecordingObserver`]: captures every reported transition
//! - [`InvariantRegistry`]: behavioral checks over a [`CallSnapshot`]
//! - [`sim_driver::run`]: multi-threaded run of a [`SimConfig`] scenario

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod invariants;
pub mod loopback;
pub mod recorder;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_path;

pub use config::{ConfigError, SimConfig};
pub use error::SimError;
pub use invariants::{
    CallSnapshot, DeliveredIntact, FrameRecord, GenerationMonotonicity, Invariant,
    InvariantRegistry, InvariantResult, NoPlaintextLeak, SuppressedTransitions, Violation,
};
pub use loopback::{Delivery, LoopbackCall};
pub use recorder::RecordingObserver;
pub use sim_driver::SimReport;
pub use sim_env::SimEnv;
pub use sim_path::SimMediaPath;
