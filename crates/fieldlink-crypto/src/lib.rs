pub mod digest;
pub mod error;
pub mod exchange;
pub mod identity;
pub mod random;
pub mod session_keys;
pub mod symmetric;

pub use error::CryptoError;
pub use exchange::ExchangeKeyPair;
pub use identity::SigningIdentity;
pub use session_keys::{DirectionalKeys, PublicKeyBundle, SessionKeyMaterial};
pub use symmetric::SymmetricKey;

pub use ed25519_dalek::VerifyingKey;
pub use x25519_dalek::PublicKey as ExchangePublicKey;
