//! End-to-end handshake between a real client state machine and a real
//! in-memory server. No mocking beyond the credential check.

use std::time::Duration;

use fieldlink_protocol::envelope::EnvelopeConfig;
use fieldlink_protocol::handshake::{
    AuthenticatedUser, Authenticator, ClientHandshake, Credentials, EstablishedSession,
    HandshakeConfig, HandshakeServer, LoginAttempt, LoginRequest, LoginResponse,
};
use fieldlink_protocol::ProtocolError;

struct Directory;

impl Authenticator for Directory {
    fn authenticate(
        &self,
        attempt: &LoginAttempt,
    ) -> Result<Option<AuthenticatedUser>, ProtocolError> {
        if attempt.login_id == "alice" && attempt.password.as_str() == "secret123" {
            Ok(Some(AuthenticatedUser {
                user_id: "user-alice".into(),
                organization_uid: attempt.organization_uid.clone(),
            }))
        } else {
            Ok(None)
        }
    }
}

fn server_with(config: HandshakeConfig) -> HandshakeServer {
    HandshakeServer::in_memory(Box::new(Directory), config)
}

fn server() -> HandshakeServer {
    server_with(HandshakeConfig::default())
}

/// Run both rounds, returning the client session.
fn handshake(
    server: &HandshakeServer,
    credentials: &Credentials,
) -> Result<EstablishedSession, ProtocolError> {
    let (state, prekey_request) = ClientHandshake::start()?;
    let prekey_response = server.issue_prekey(&prekey_request)?;
    let (state, login_request) = state.derive_keys(&prekey_response)?.login(credentials)?;
    let login_response = server.login(&login_request)?;
    state.finish(&login_response, &EnvelopeConfig::default())
}

// ── Happy path ───────────────────────────────────────────────────────

#[test]
fn full_handshake_establishes_session() {
    let server = server();
    let session = handshake(&server, &Credentials::new("alice", "secret123")).unwrap();

    assert!(session.pre_key_index().starts_with("PREKEY_"));
    assert_eq!(session.token().len(), 128);
    assert!(session.bearer().starts_with("Bearer "));

    let record = server.resolve_session(session.token()).unwrap();
    assert_eq!(record.user.user_id, "user-alice");
    assert!(record.user.organization_uid.is_none());
}

#[test]
fn organization_uid_reaches_authenticator() {
    let server = server();
    let credentials = Credentials::new("alice", "secret123").with_organization("org-7");
    let session = handshake(&server, &credentials).unwrap();

    let record = server.resolve_session(session.token()).unwrap();
    assert_eq!(record.user.organization_uid.as_deref(), Some("org-7"));
}

#[test]
fn sessions_get_distinct_tokens() {
    let server = server();
    let creds = Credentials::new("alice", "secret123");
    let a = handshake(&server, &creds).unwrap();
    let b = handshake(&server, &creds).unwrap();
    assert_ne!(a.token(), b.token());
    assert_ne!(a.pre_key_index(), b.pre_key_index());
}

// ── Rejections ───────────────────────────────────────────────────────

#[test]
fn wrong_password_is_invalid_credential() {
    let err = handshake(&server(), &Credentials::new("alice", "hunter2")).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidCredential));
    assert!(err.is_authentication_failure());
}

#[test]
fn prekey_is_single_use() {
    let server = server();
    let (state, prekey_request) = ClientHandshake::start().unwrap();
    let prekey_response = server.issue_prekey(&prekey_request).unwrap();
    let (_, login_request) = state
        .derive_keys(&prekey_response)
        .unwrap()
        .login(&Credentials::new("alice", "secret123"))
        .unwrap();

    server.login(&login_request).unwrap();
    let replay = server.login(&login_request).unwrap_err();
    assert!(matches!(replay, ProtocolError::PreKeyNotFound));
}

#[test]
fn failed_login_burns_prekey() {
    let server = server();
    let (state, prekey_request) = ClientHandshake::start().unwrap();
    let prekey_response = server.issue_prekey(&prekey_request).unwrap();
    let (_, login_request) = state
        .derive_keys(&prekey_response)
        .unwrap()
        .login(&Credentials::new("alice", "wrong"))
        .unwrap();

    assert!(matches!(
        server.login(&login_request),
        Err(ProtocolError::InvalidCredential)
    ));
    assert!(matches!(
        server.login(&login_request),
        Err(ProtocolError::PreKeyNotFound)
    ));
}

#[test]
fn expired_prekey_is_not_found() {
    let server = server_with(HandshakeConfig {
        prekey_ttl: Duration::ZERO,
        ..HandshakeConfig::default()
    });
    let err = handshake(&server, &Credentials::new("alice", "secret123")).unwrap_err();
    assert!(matches!(err, ProtocolError::PreKeyNotFound));
}

#[test]
fn login_envelope_from_other_client_fails_signature() {
    let server = server();
    let creds = Credentials::new("alice", "secret123");

    let (victim, victim_request) = ClientHandshake::start().unwrap();
    let victim_response = server.issue_prekey(&victim_request).unwrap();

    let (attacker, attacker_request) = ClientHandshake::start().unwrap();
    let attacker_response = server.issue_prekey(&attacker_request).unwrap();
    let (_, attacker_login) = attacker
        .derive_keys(&attacker_response)
        .unwrap()
        .login(&creds)
        .unwrap();

    // Replay the attacker's envelope against the victim's index.
    let err = server
        .login(&LoginRequest {
            i: victim_response.i.clone(),
            d: attacker_login.d,
        })
        .unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidSignature));

    // The victim's index has been consumed by the failed attempt.
    let (_, victim_login) = victim
        .derive_keys(&victim_response)
        .unwrap()
        .login(&creds)
        .unwrap();
    assert!(matches!(
        server.login(&victim_login),
        Err(ProtocolError::PreKeyNotFound)
    ));
}

#[test]
fn client_rejects_tampered_reply() {
    let server = server();
    let (state, prekey_request) = ClientHandshake::start().unwrap();
    let prekey_response = server.issue_prekey(&prekey_request).unwrap();
    let (state, login_request) = state
        .derive_keys(&prekey_response)
        .unwrap()
        .login(&Credentials::new("alice", "secret123"))
        .unwrap();
    let reply = server.login(&login_request).unwrap();

    let mut bytes = hex::decode(&reply.d).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    let tampered = LoginResponse {
        d: hex::encode(bytes),
    };
    let err = state.finish(&tampered, &EnvelopeConfig::default()).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidSignature));
}

// ── Logout and session lifetime ──────────────────────────────────────

#[test]
fn logout_invalidates_token() {
    let server = server();
    let session = handshake(&server, &Credentials::new("alice", "secret123")).unwrap();

    server.logout(session.token()).unwrap();
    assert!(matches!(
        server.resolve_session(session.token()),
        Err(ProtocolError::SessionNotFound)
    ));
    assert!(matches!(
        server.logout(session.token()),
        Err(ProtocolError::SessionNotFound)
    ));
}

#[test]
fn expired_session_is_rejected() {
    let server = server_with(HandshakeConfig {
        session_ttl: Duration::ZERO,
        ..HandshakeConfig::default()
    });
    let session = handshake(&server, &Credentials::new("alice", "secret123")).unwrap();
    assert!(matches!(
        server.resolve_session(session.token()),
        Err(ProtocolError::SessionNotFound)
    ));
    assert_eq!(server.purge_expired().unwrap(), (0, 1));
}

#[test]
fn resolving_a_session_renews_it() {
    let server = server_with(HandshakeConfig {
        session_ttl: Duration::from_millis(800),
        ..HandshakeConfig::default()
    });
    let session = handshake(&server, &Credentials::new("alice", "secret123")).unwrap();

    std::thread::sleep(Duration::from_millis(500));
    server.resolve_session(session.token()).unwrap();
    std::thread::sleep(Duration::from_millis(500));
    // Past the original expiry, within the renewed one.
    server.resolve_session(session.token()).unwrap();

    std::thread::sleep(Duration::from_millis(1000));
    assert!(matches!(
        server.resolve_session(session.token()),
        Err(ProtocolError::SessionNotFound)
    ));
}
