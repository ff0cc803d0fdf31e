//! JSON bodies of the two handshake rounds.
//!
//! Field names are the short ones used on the wire. Every field defaults to
//! empty so that an absent field surfaces as a missing-parameter error from
//! the handshake rather than a deserialization failure.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Client public keys: `a0` Ed25519, `a1`/`a2` X25519, all hex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreKeyRequest {
    pub a0: String,
    pub a1: String,
    pub a2: String,
}

/// Pre-key index `i`, server public keys `b0`..`b2` and the index TTL `d1` in seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreKeyResponse {
    pub i: String,
    pub b0: String,
    pub b1: String,
    pub b2: String,
    pub d1: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub i: String,
    /// Hex envelope holding the credentials.
    pub d: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginResponse {
    /// Hex envelope holding the session token.
    pub d: String,
}

pub(crate) fn require<'a>(value: &'a str, name: &'static str) -> Result<&'a str, ProtocolError> {
    if value.is_empty() {
        Err(ProtocolError::MissingParameter(name))
    } else {
        Ok(value)
    }
}
