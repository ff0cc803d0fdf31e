//! Two-round login handshake.
//!
//! Round one (`/self/prekey`) swaps fresh public keys and leaves a short-lived
//! pre-key record on the server. Round two (`/self/login`) carries the
//! credentials in an envelope keyed client→server and returns the session
//! token in an envelope keyed server→client.

pub mod client;
pub mod config;
pub mod memory_stores;
pub mod messages;
pub mod server;
pub mod store;

pub use client::{ClientHandshake, Credentials, EstablishedSession, KeysDerived, LoginSent, PreKeySent};
pub use config::HandshakeConfig;
pub use memory_stores::{MemoryPreKeyStore, MemorySessionStore};
pub use messages::{LoginRequest, LoginResponse, PreKeyRequest, PreKeyResponse};
pub use server::HandshakeServer;
pub use store::{
    AuthenticatedUser, Authenticator, LoginAttempt, PreKeyRecord, PreKeyStore, SessionRecord,
    SessionStore,
};
