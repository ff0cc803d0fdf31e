use chrono::Utc;
use uuid::Uuid;
use zeroize::Zeroizing;

use fieldlink_crypto::exchange::exchange_key_from_hex;
use fieldlink_crypto::identity::verifying_key_from_hex;
use fieldlink_crypto::random::random_vec;
use fieldlink_crypto::SessionKeyMaterial;

use crate::envelope;
use crate::error::ProtocolError;
use crate::handshake::config::HandshakeConfig;
use crate::handshake::memory_stores::{MemoryPreKeyStore, MemorySessionStore};
use crate::handshake::messages::{require, LoginRequest, LoginResponse, PreKeyRequest, PreKeyResponse};
use crate::handshake::store::{
    Authenticator, LoginAttempt, PreKeyRecord, PreKeyStore, SessionRecord, SessionStore,
};
use crate::lv::Lv;

/// Random bytes behind each session token (hex encoded on the wire).
pub const SESSION_TOKEN_LEN: usize = 64;

const PREKEY_INDEX_PREFIX: &str = "PREKEY_";

/// Server side of the handshake.
///
/// Stateless apart from its stores; share it behind an `Arc`.
pub struct HandshakeServer {
    authenticator: Box<dyn Authenticator>,
    prekey_store: Box<dyn PreKeyStore>,
    session_store: Box<dyn SessionStore>,
    config: HandshakeConfig,
}

impl HandshakeServer {
    pub fn new(
        authenticator: Box<dyn Authenticator>,
        prekey_store: Box<dyn PreKeyStore>,
        session_store: Box<dyn SessionStore>,
        config: HandshakeConfig,
    ) -> Self {
        Self {
            authenticator,
            prekey_store,
            session_store,
            config,
        }
    }

    /// A server backed by the in-memory stores.
    pub fn in_memory(authenticator: Box<dyn Authenticator>, config: HandshakeConfig) -> Self {
        Self::new(
            authenticator,
            Box::new(MemoryPreKeyStore::new()),
            Box::new(MemorySessionStore::new()),
            config,
        )
    }

    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// Round one: generate `B0`..`B2`, derive both shared keys and park them
    /// under a fresh pre-key index.
    pub fn issue_prekey(&self, request: &PreKeyRequest) -> Result<PreKeyResponse, ProtocolError> {
        let a0 = require(&request.a0, "a0")?;
        let a1 = require(&request.a1, "a1")?;
        let a2 = require(&request.a2, "a2")?;
        let client_signing_key = verifying_key_from_hex(a0)?;
        let a1 = exchange_key_from_hex(a1)?;
        let a2 = exchange_key_from_hex(a2)?;

        let material = SessionKeyMaterial::generate()?;
        let bundle = material.public_bundle();
        let keys = material.derive(&a1, &a2)?;
        let index = format!("{PREKEY_INDEX_PREFIX}{}", Uuid::now_v7());

        self.prekey_store.insert(
            PreKeyRecord {
                index: index.clone(),
                client_signing_key,
                server_signing: material.into_signing(),
                keys,
            },
            self.config.prekey_ttl,
        )?;
        tracing::info!(pre_key = %index, "pre-key issued");

        Ok(PreKeyResponse {
            i: index,
            b0: bundle.signing,
            b1: bundle.exchange_1,
            b2: bundle.exchange_2,
            d1: self.config.prekey_ttl.as_secs(),
        })
    }

    /// Round two: consume the pre-key record, check the credentials and
    /// return the session token sealed for the client.
    pub fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ProtocolError> {
        self.try_login(request).inspect_err(|e| {
            tracing::warn!(pre_key = %request.i, code = e.code(), "login rejected");
        })
    }

    fn try_login(&self, request: &LoginRequest) -> Result<LoginResponse, ProtocolError> {
        let index = require(&request.i, "i")?;
        let d = require(&request.d, "d")?;

        // Taken before unpacking so a failed attempt still burns the index.
        let record = self
            .prekey_store
            .take(index)?
            .ok_or(ProtocolError::PreKeyNotFound)?;

        let payloads = envelope::unpack(
            &record.index,
            &record.client_signing_key,
            &record.keys.client_to_server,
            d,
            &self.config.envelope,
        )?;
        let attempt = login_attempt(payloads)?;

        let user = self
            .authenticator
            .authenticate(&attempt)?
            .ok_or(ProtocolError::InvalidCredential)?;

        let token = hex::encode(random_vec(SESSION_TOKEN_LEN)?);
        let reply = envelope::pack(
            &record.index,
            &record.server_signing,
            &record.keys.server_to_client,
            &[Lv::from(token.as_str())],
        )?;

        tracing::info!(
            pre_key = %record.index,
            user_id = %user.user_id,
            "session issued"
        );
        self.session_store.insert(
            SessionRecord {
                token,
                user,
                issued_at: Utc::now(),
            },
            self.config.session_ttl,
        )?;

        Ok(LoginResponse { d: reply })
    }

    pub fn logout(&self, token: &str) -> Result<(), ProtocolError> {
        let token = require(token, "token")?;
        if self.session_store.invalidate(token)? {
            tracing::info!("session invalidated");
            Ok(())
        } else {
            Err(ProtocolError::SessionNotFound)
        }
    }

    /// The live session behind `token`. Each use renews it for another
    /// `session_ttl`.
    pub fn resolve_session(&self, token: &str) -> Result<SessionRecord, ProtocolError> {
        let token = require(token, "token")?;
        self.session_store
            .touch(token, self.config.session_ttl)?
            .ok_or(ProtocolError::SessionNotFound)
    }

    /// Drop expired pre-keys and sessions, returning `(pre_keys, sessions)` removed.
    pub fn purge_expired(&self) -> Result<(usize, usize), ProtocolError> {
        let prekeys = self.prekey_store.purge_expired()?;
        let sessions = self.session_store.purge_expired()?;
        if prekeys + sessions > 0 {
            tracing::debug!(prekeys, sessions, "expired handshake state purged");
        }
        Ok((prekeys, sessions))
    }
}

/// `[login_id, password]` with an optional trailing organization uid.
/// A malformed list reads as a wrong credential.
fn login_attempt(payloads: Vec<Lv>) -> Result<LoginAttempt, ProtocolError> {
    let mut payloads = payloads.into_iter();
    let (Some(login_id), Some(password)) = (payloads.next(), payloads.next()) else {
        return Err(ProtocolError::InvalidCredential);
    };
    let login_id = login_id.value_as_string()?;
    let password = Zeroizing::new(password.value_as_string()?);
    let organization_uid = payloads
        .next()
        .map(|lv| lv.value_as_string())
        .transpose()?
        .filter(|org| !org.is_empty());

    if login_id.is_empty() {
        return Err(ProtocolError::InvalidCredential);
    }
    Ok(LoginAttempt {
        login_id,
        password,
        organization_uid,
    })
}
