//! Client side of the handshake as a chain of consuming states.
//!
//! Each step takes `self` by value, so a failed step drops the key material
//! it held and the caller has to begin again from [`ClientHandshake::start`].

use zeroize::Zeroizing;

use fieldlink_crypto::exchange::exchange_key_from_hex;
use fieldlink_crypto::identity::verifying_key_from_hex;
use fieldlink_crypto::{SessionKeyMaterial, SigningIdentity, SymmetricKey, VerifyingKey};

use crate::envelope::{self, EnvelopeConfig};
use crate::error::ProtocolError;
use crate::handshake::messages::{require, LoginRequest, LoginResponse, PreKeyRequest, PreKeyResponse};
use crate::lv::Lv;

/// What the user typed in.
pub struct Credentials {
    pub login_id: String,
    pub password: Zeroizing<String>,
    pub organization_uid: Option<String>,
}

impl Credentials {
    pub fn new(login_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login_id: login_id.into(),
            password: Zeroizing::new(password.into()),
            organization_uid: None,
        }
    }

    pub fn with_organization(mut self, organization_uid: impl Into<String>) -> Self {
        self.organization_uid = Some(organization_uid.into());
        self
    }

    fn to_payloads(&self) -> Vec<Lv> {
        let mut payloads = vec![
            Lv::from(self.login_id.as_str()),
            Lv::from(self.password.as_str()),
        ];
        if let Some(org) = &self.organization_uid {
            payloads.push(Lv::from(org.as_str()));
        }
        payloads
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login_id", &self.login_id)
            .field("organization_uid", &self.organization_uid)
            .finish_non_exhaustive()
    }
}

pub struct ClientHandshake;

impl ClientHandshake {
    /// Generate `A0`, `A1`, `A2` and the pre-key request carrying their public halves.
    pub fn start() -> Result<(PreKeySent, PreKeyRequest), ProtocolError> {
        let state = PreKeySent {
            material: SessionKeyMaterial::generate()?,
        };
        let request = state.request();
        tracing::debug!("pre-key request prepared");
        Ok((state, request))
    }
}

#[derive(Debug)]
pub struct PreKeySent {
    material: SessionKeyMaterial,
}

impl PreKeySent {
    pub fn request(&self) -> PreKeyRequest {
        let bundle = self.material.public_bundle();
        PreKeyRequest {
            a0: bundle.signing,
            a1: bundle.exchange_1,
            a2: bundle.exchange_2,
        }
    }

    /// Derive both shared keys from the server's pre-key response.
    pub fn derive_keys(self, response: &PreKeyResponse) -> Result<KeysDerived, ProtocolError> {
        let index = require(&response.i, "i")?;
        let server_signing_key = verifying_key_from_hex(require(&response.b0, "b0")?)?;
        let b1 = exchange_key_from_hex(require(&response.b1, "b1")?)?;
        let b2 = exchange_key_from_hex(require(&response.b2, "b2")?)?;

        let keys = self.material.derive(&b1, &b2)?;
        tracing::debug!(pre_key = %index, "shared keys derived");
        Ok(KeysDerived {
            index: index.to_string(),
            signing: self.material.into_signing(),
            server_signing_key,
            client_to_server: keys.client_to_server,
            server_to_client: keys.server_to_client,
        })
    }
}

#[derive(Debug)]
pub struct KeysDerived {
    index: String,
    signing: SigningIdentity,
    server_signing_key: VerifyingKey,
    client_to_server: SymmetricKey,
    server_to_client: SymmetricKey,
}

impl KeysDerived {
    pub fn pre_key_index(&self) -> &str {
        &self.index
    }

    /// Seal the credentials under `sharedKey1`, signed by `A0`.
    pub fn login(self, credentials: &Credentials) -> Result<(LoginSent, LoginRequest), ProtocolError> {
        let d = envelope::pack(
            &self.index,
            &self.signing,
            &self.client_to_server,
            &credentials.to_payloads(),
        )?;
        tracing::debug!(pre_key = %self.index, "login request sealed");
        let request = LoginRequest {
            i: self.index.clone(),
            d,
        };
        Ok((
            LoginSent {
                index: self.index,
                server_signing_key: self.server_signing_key,
                server_to_client: self.server_to_client,
            },
            request,
        ))
    }
}

#[derive(Debug)]
pub struct LoginSent {
    index: String,
    server_signing_key: VerifyingKey,
    server_to_client: SymmetricKey,
}

impl LoginSent {
    /// Open the server's reply with `sharedKey2` and `B0`, yielding the session token.
    pub fn finish(
        self,
        response: &LoginResponse,
        config: &EnvelopeConfig,
    ) -> Result<EstablishedSession, ProtocolError> {
        let d = require(&response.d, "d")?;
        let payloads = envelope::unpack(
            &self.index,
            &self.server_signing_key,
            &self.server_to_client,
            d,
            config,
        )?;
        let [token]: [Lv; 1] = payloads.try_into().map_err(|parts: Vec<Lv>| {
            ProtocolError::Decode(format!(
                "login reply must carry exactly one payload, got {}",
                parts.len()
            ))
        })?;
        let token = token.value_as_string()?;
        if token.is_empty() {
            return Err(ProtocolError::MissingParameter("token"));
        }
        tracing::debug!(pre_key = %self.index, "session established");
        Ok(EstablishedSession {
            index: self.index,
            token: Zeroizing::new(token),
        })
    }
}

pub struct EstablishedSession {
    index: String,
    token: Zeroizing<String>,
}

impl EstablishedSession {
    pub fn pre_key_index(&self) -> &str {
        &self.index
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token.as_str())
    }
}

impl std::fmt::Debug for EstablishedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EstablishedSession")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}
