//! Participant identity.

use std::{borrow::Borrow, fmt};

/// Logical identity of one endpoint in the call.
///
/// Namespaces key material in a non-shared [`crate::KeyProvider`] and
/// attributes observer events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Wrap an identity string.
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    /// Identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty identity, which cryptors refuse.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(identity: &str) -> Self {
        Self(identity.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(identity: String) -> Self {
        Self(identity)
    }
}

impl From<&ParticipantId> for ParticipantId {
    fn from(identity: &ParticipantId) -> Self {
        identity.clone()
    }
}

impl Borrow<str> for ParticipantId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
