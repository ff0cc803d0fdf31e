//! Key material owned by one side of one login handshake.
//!
//! Both sides hold the same shape: an Ed25519 signing key (`A0`/`B0`) and two
//! X25519 pairs (`A1`,`A2` / `B1`,`B2`). Exchange pair 1 keys client→server
//! traffic, pair 2 keys server→client traffic, so each direction has an
//! independent symmetric key.

use x25519_dalek::PublicKey;

use crate::error::CryptoError;
use crate::exchange::ExchangeKeyPair;
use crate::identity::SigningIdentity;
use crate::symmetric::SymmetricKey;

/// Hex-encoded public halves, as exchanged in the pre-key round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyBundle {
    pub signing: String,
    pub exchange_1: String,
    pub exchange_2: String,
}

pub struct SessionKeyMaterial {
    signing: SigningIdentity,
    exchange_1: ExchangeKeyPair,
    exchange_2: ExchangeKeyPair,
}

/// The two derived keys, named by traffic direction.
#[derive(Debug)]
pub struct DirectionalKeys {
    /// `sharedKey1`
    pub client_to_server: SymmetricKey,
    /// `sharedKey2`
    pub server_to_client: SymmetricKey,
}

impl SessionKeyMaterial {
    pub fn generate() -> Result<Self, CryptoError> {
        Ok(Self {
            signing: SigningIdentity::generate()?,
            exchange_1: ExchangeKeyPair::generate()?,
            exchange_2: ExchangeKeyPair::generate()?,
        })
    }

    pub fn signing(&self) -> &SigningIdentity {
        &self.signing
    }

    pub fn public_bundle(&self) -> PublicKeyBundle {
        PublicKeyBundle {
            signing: self.signing.public_key_hex(),
            exchange_1: self.exchange_1.public_key_hex(),
            exchange_2: self.exchange_2.public_key_hex(),
        }
    }

    /// Derive both directional keys against the peer's exchange public keys.
    ///
    /// Client and server call this with each other's keys and arrive at the
    /// same pair.
    pub fn derive(
        &self,
        peer_exchange_1: &PublicKey,
        peer_exchange_2: &PublicKey,
    ) -> Result<DirectionalKeys, CryptoError> {
        Ok(DirectionalKeys {
            client_to_server: self.exchange_1.agree(peer_exchange_1)?,
            server_to_client: self.exchange_2.agree(peer_exchange_2)?,
        })
    }

    /// Drop the exchange secrets once both keys are derived, keeping only
    /// the signing key for the rest of the handshake.
    pub fn into_signing(self) -> SigningIdentity {
        self.signing
    }
}

impl std::fmt::Debug for SessionKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeyMaterial")
            .field("public", &self.public_bundle())
            .finish_non_exhaustive()
    }
}
