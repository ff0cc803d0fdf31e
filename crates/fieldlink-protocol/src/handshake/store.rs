use std::time::Duration;

use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

use fieldlink_crypto::{DirectionalKeys, SigningIdentity, VerifyingKey};

use crate::error::ProtocolError;

/// Server state held between the pre-key round and the login round.
#[derive(Debug)]
pub struct PreKeyRecord {
    /// `PREKEY_<uuid v7>`
    pub index: String,
    /// The client's `A0`, which signs the login envelope.
    pub client_signing_key: VerifyingKey,
    /// The server's `B0`, which signs the reply.
    pub server_signing: SigningIdentity,
    pub keys: DirectionalKeys,
}

/// Credentials unpacked from a login envelope.
pub struct LoginAttempt {
    pub login_id: String,
    pub password: Zeroizing<String>,
    pub organization_uid: Option<String>,
}

impl std::fmt::Debug for LoginAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginAttempt")
            .field("login_id", &self.login_id)
            .field("organization_uid", &self.organization_uid)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub organization_uid: Option<String>,
}

#[derive(Clone)]
pub struct SessionRecord {
    pub token: String,
    pub user: AuthenticatedUser,
    pub issued_at: DateTime<Utc>,
}

impl std::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("user", &self.user)
            .field("issued_at", &self.issued_at)
            .finish_non_exhaustive()
    }
}

/// Checks login credentials.
///
/// `Ok(None)` means the credentials were well-formed but wrong.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, attempt: &LoginAttempt) -> Result<Option<AuthenticatedUser>, ProtocolError>;
}

/// Short-lived pre-key records, keyed by index.
///
/// Records are single-use: `take` removes what it returns.
pub trait PreKeyStore: Send + Sync {
    fn insert(&self, record: PreKeyRecord, ttl: Duration) -> Result<(), ProtocolError>;

    /// Remove and return the live record for `index`.
    fn take(&self, index: &str) -> Result<Option<PreKeyRecord>, ProtocolError>;

    /// Drop expired records, returning how many were removed.
    fn purge_expired(&self) -> Result<usize, ProtocolError>;
}

/// Issued session tokens.
pub trait SessionStore: Send + Sync {
    fn insert(&self, record: SessionRecord, ttl: Duration) -> Result<(), ProtocolError>;

    fn get(&self, token: &str) -> Result<Option<SessionRecord>, ProtocolError>;

    /// Like `get`, but a live session's expiry is pushed out to `ttl` from now.
    fn touch(&self, token: &str, ttl: Duration) -> Result<Option<SessionRecord>, ProtocolError>;

    /// Returns whether a live session was removed.
    fn invalidate(&self, token: &str) -> Result<bool, ProtocolError>;

    fn purge_expired(&self) -> Result<usize, ProtocolError>;
}
