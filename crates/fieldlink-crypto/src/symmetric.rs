use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;
use crate::random::random_array;

const BLOCK_LEN: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES-256 key derived from one X25519 exchange.
///
/// Wire format of a ciphertext: `[16-byte IV || AES-256-CBC(PKCS#7 padded plaintext)]`.
/// CBC gives no integrity on its own; envelopes sign the ciphertext and the
/// signature is checked before [`SymmetricKey::decrypt`] is ever reached.
#[derive(ZeroizeOnDrop)]
pub struct SymmetricKey {
    key: [u8; 32],
}

impl SymmetricKey {
    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn from_slice(key: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; 32] = key.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("AES-256 key must be 32 bytes, got {}", key.len()))
        })?;
        Ok(Self { key })
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// Encrypt with a fresh random IV, prepended to the output.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let iv = random_array::<BLOCK_LEN>()?;
        let cipher = Aes256CbcEnc::new_from_slices(&self.key, &iv)
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))?;
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut output = Vec::with_capacity(BLOCK_LEN + ciphertext.len());
        output.extend_from_slice(&iv);
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    /// Decrypt output of [`SymmetricKey::encrypt`] and strip the padding.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if data.len() < 2 * BLOCK_LEN || data.len() % BLOCK_LEN != 0 {
            return Err(CryptoError::DecryptionError(format!(
                "ciphertext length {} is not IV plus whole blocks",
                data.len()
            )));
        }
        let (iv, ciphertext) = data.split_at(BLOCK_LEN);
        let cipher = Aes256CbcDec::new_from_slices(&self.key, iv)
            .map_err(|e| CryptoError::DecryptionError(e.to_string()))?;
        cipher
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|e| CryptoError::DecryptionError(e.to_string()))
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}
