use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;
use crate::random::random_array;
use crate::symmetric::SymmetricKey;

/// Ephemeral X25519 key pair used for one traffic direction of one handshake.
///
/// `StaticSecret` rather than `EphemeralSecret` because the server side has to
/// keep its half alive between the pre-key and login rounds.
#[derive(ZeroizeOnDrop)]
pub struct ExchangeKeyPair {
    secret: StaticSecret,
}

impl ExchangeKeyPair {
    pub fn generate() -> Result<Self, CryptoError> {
        let bytes = random_array::<32>()?;
        Ok(Self {
            secret: StaticSecret::from(bytes),
        })
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from(&self.secret)
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key().as_bytes())
    }

    /// Run X25519 against the peer's public key and use the raw shared secret
    /// as an AES-256 key.
    ///
    /// Low-order peer points yield an all-zero secret; those are rejected.
    pub fn agree(&self, peer_public: &PublicKey) -> Result<SymmetricKey, CryptoError> {
        let shared = self.secret.diffie_hellman(peer_public);
        if !shared.was_contributory() {
            tracing::warn!("rejected low-order X25519 peer key");
            return Err(CryptoError::KeyAgreement(
                "peer public key produced a non-contributory shared secret".into(),
            ));
        }
        Ok(SymmetricKey::from_bytes(*shared.as_bytes()))
    }
}

/// Parse a hex-encoded X25519 public key received from a peer.
pub fn exchange_key_from_hex(hex_str: &str) -> Result<PublicKey, CryptoError> {
    let bytes = hex::decode(hex_str)
        .map_err(|e| CryptoError::InvalidKey(format!("invalid X25519 public key hex: {e}")))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKey("X25519 public key must be 32 bytes".into()))?;
    Ok(PublicKey::from(bytes))
}

impl std::fmt::Debug for ExchangeKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeKeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}
