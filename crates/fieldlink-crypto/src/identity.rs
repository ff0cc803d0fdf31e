use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;
use crate::random::random_array;

/// Length of a raw Ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// Per-session Ed25519 signing key.
///
/// Each handshake party generates one of these per login attempt (`A0` on the
/// client, `B0` on the server). It signs the ciphertext of every envelope the
/// party sends; the peer learns the public half during the pre-key exchange.
#[derive(ZeroizeOnDrop)]
pub struct SigningIdentity {
    signing_key: SigningKey,
}

impl SigningIdentity {
    /// Generate a fresh signing key from the OS RNG.
    pub fn generate() -> Result<Self, CryptoError> {
        let seed = random_array::<32>()?;
        Ok(Self::from_secret_bytes(&seed))
    }

    /// Restore a signing key from its 32-byte seed.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Public key as lowercase hex, the form used in `a0`/`b0` fields.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Verify a raw signature against a public key.
    ///
    /// Uses strict verification, so malleable signatures and small-order
    /// public keys are rejected as well.
    pub fn verify(
        public_key: &VerifyingKey,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError> {
        let signature: [u8; SIGNATURE_LEN] = signature.try_into().map_err(|_| {
            CryptoError::VerificationError(format!(
                "signature must be {SIGNATURE_LEN} bytes, got {}",
                signature.len()
            ))
        })?;
        public_key
            .verify_strict(message, &Signature::from_bytes(&signature))
            .map_err(|e| CryptoError::VerificationError(e.to_string()))
    }
}

/// Parse a hex-encoded Ed25519 public key received from a peer.
pub fn verifying_key_from_hex(hex_str: &str) -> Result<VerifyingKey, CryptoError> {
    let bytes = hex::decode(hex_str)
        .map_err(|e| CryptoError::InvalidKey(format!("invalid Ed25519 public key hex: {e}")))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKey("Ed25519 public key must be 32 bytes".into()))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| CryptoError::InvalidKey(format!("invalid Ed25519 public key: {e}")))
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}
