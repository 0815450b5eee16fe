//! Simulation setup errors.

use framecryptor_core::{CryptorError, KeyError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that stop a simulation from starting or continuing.
#[derive(Error, Debug)]
pub enum SimError {
    /// Scenario is unusable
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Key provisioning or ratcheting failed
    #[error("key management: {0}")]
    Key(#[from] KeyError),

    /// Cryptor could not be constructed
    #[error("cryptor: {0}")]
    Cryptor(#[from] CryptorError),
}
