//! Loopback simulation binary.
//!
//! # Usage
//!
//! ```bash
//! # Default scenario: video, AES-GCM, 4 threads, ratchet every 50 frames
//! framecryptor-sim
//!
//! # Scenario file with overrides
//! framecryptor-sim --config scenario.toml --frames 1000 --seed 7
//! ```

use std::path::PathBuf;

use clap::Parser;
use framecryptor_harness::{SimConfig, sim_driver};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Frame cryptor loopback simulation
#[derive(Parser, Debug)]
#[command(name = "framecryptor-sim")]
#[command(about = "Drive a sender and receiver frame cryptor back to back")]
#[command(version)]
struct Args {
    /// Scenario file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Frames to send
    #[arg(long)]
    frames: Option<u32>,

    /// Pipeline threads
    #[arg(long)]
    workers: Option<usize>,

    /// Sender ratchets after every n frames (0 = never)
    #[arg(long)]
    ratchet_every: Option<u32>,

    /// Cipher (aes-gcm, aes-cbc)
    #[arg(long)]
    algorithm: Option<String>,

    /// RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn scenario(&self) -> Result<SimConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => SimConfig::load(path)?,
            None => SimConfig::default(),
        };

        if let Some(frames) = self.frames {
            config.frames = frames;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(ratchet_every) = self.ratchet_every {
            config.ratchet_every = ratchet_every;
        }
        if let Some(algorithm) = &self.algorithm {
            config.algorithm.clone_from(algorithm);
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = args.scenario()?;
    tracing::info!(
        frames = config.frames,
        workers = config.workers,
        ratchet_every = config.ratchet_every,
        algorithm = %config.algorithm,
        seed = config.seed,
        "simulation starting"
    );

    let report = sim_driver::run(&config)?;

    tracing::info!(
        sent = report.sent,
        delivered = report.delivered,
        dropped_at_sender = report.dropped_at_sender,
        dropped_at_receiver = report.dropped_at_receiver,
        ratchets = report.ratchets,
        receiver_generation = ?report.receiver_generation,
        receiver_states = ?report.receiver_states,
        "simulation finished"
    );

    if !report.violations.is_empty() {
        return Err(format!("{} invariant violations", report.violations.len()).into());
    }
    Ok(())
}
