use thiserror::Error;

use fieldlink_crypto::CryptoError;

/// Every way an envelope or handshake step can fail.
///
/// All variants are terminal for the handshake attempt. Callers facing an
/// untrusted peer should collapse them into one opaque failure (see
/// [`ProtocolError::is_authentication_failure`]) and only log [`ProtocolError::code`].
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("envelope does not contain exactly two parts (got {0})")]
    InvalidData(usize),

    #[error("envelope signature is invalid")]
    InvalidSignature,

    #[error("data block timestamp is outside the freshness window")]
    TimeExpired,

    #[error("data block is bound to a different pre-key index")]
    InvalidPreKey,

    #[error("data block hash does not match its data")]
    InvalidDataHash,

    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("pre-key index not found or expired")]
    PreKeyNotFound,

    #[error("invalid credential")]
    InvalidCredential,

    #[error("session not found or expired")]
    SessionNotFound,

    #[error("secure random source unavailable: {0}")]
    RandomUnavailable(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("store error: {0}")]
    Store(String),
}

impl ProtocolError {
    /// Stable machine-readable code, suitable for logs and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "DECODE_ERROR",
            Self::Encode(_) => "ENCODE_ERROR",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::TimeExpired => "TIME_EXPIRED",
            Self::InvalidPreKey => "INVALID_PREKEY",
            Self::InvalidDataHash => "INVALID_DATA_HASH",
            Self::MissingParameter(_) => "MISSING_PARAMETER",
            Self::PreKeyNotFound => "PREKEY_NOT_FOUND",
            Self::InvalidCredential => "INVALID_CREDENTIAL",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::RandomUnavailable(_) => "RANDOM_UNAVAILABLE",
            Self::Crypto(_) => "CRYPTO_ERROR",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// Whether this failure stems from what the peer sent (as opposed to a
    /// local fault such as the RNG or a store backend).
    pub fn is_authentication_failure(&self) -> bool {
        !matches!(
            self,
            Self::Encode(_) | Self::RandomUnavailable(_) | Self::Store(_) | Self::MissingParameter(_)
        )
    }
}

impl From<CryptoError> for ProtocolError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::RandomUnavailable(msg) => Self::RandomUnavailable(msg),
            CryptoError::InvalidKey(msg) => Self::Decode(msg),
            other => Self::Crypto(other.to_string()),
        }
    }
}
