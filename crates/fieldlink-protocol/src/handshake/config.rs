use std::time::Duration;

use crate::envelope::EnvelopeConfig;

pub const DEFAULT_PREKEY_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Lifetimes used by [`HandshakeServer`](super::HandshakeServer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeConfig {
    /// Freshness window for both login envelopes.
    pub envelope: EnvelopeConfig,
    /// How long an issued pre-key index stays usable.
    pub prekey_ttl: Duration,
    /// How long a session token stays valid after login.
    pub session_ttl: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            envelope: EnvelopeConfig::default(),
            prekey_ttl: DEFAULT_PREKEY_TTL,
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }
}
