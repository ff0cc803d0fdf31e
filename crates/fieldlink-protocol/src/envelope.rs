//! Signed and encrypted envelopes around a [`DataBlock`].
//!
//! Wire form, hex encoded:
//!
//! ```text
//! LV( LV(iv || AES-256-CBC(LV(data block))) || LV(Ed25519 signature over the ciphertext) )
//! ```
//!
//! [`unpack`] checks in a fixed order: envelope shape, signature, decryption,
//! block shape, freshness, pre-key binding, data hash. Nothing is decrypted
//! until the signature has verified.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use fieldlink_crypto::{SigningIdentity, SymmetricKey, VerifyingKey};

use crate::datablock::DataBlock;
use crate::error::ProtocolError;
use crate::lv::Lv;

/// Default maximum age of a data block.
pub const DEFAULT_ENVELOPE_TTL: Duration = Duration::from_secs(5 * 60);

/// Verification settings for [`unpack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeConfig {
    /// How far a block's timestamp may lie from the verifier's clock, in
    /// either direction.
    pub ttl: Duration,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_ENVELOPE_TTL,
        }
    }
}

/// Pack `payloads` for `pre_key_index`, signed by `signer` and encrypted under `key`.
pub fn pack(
    pre_key_index: &str,
    signer: &SigningIdentity,
    key: &SymmetricKey,
    payloads: &[Lv],
) -> Result<String, ProtocolError> {
    pack_at(Utc::now(), pre_key_index, signer, key, payloads)
}

pub fn pack_at(
    now: DateTime<Utc>,
    pre_key_index: &str,
    signer: &SigningIdentity,
    key: &SymmetricKey,
    payloads: &[Lv],
) -> Result<String, ProtocolError> {
    let combined = Lv::combine(payloads)?.marshal_binary()?;
    let mut block = DataBlock::new_at(combined, now)?;
    block.set_pre_key(pre_key_index);
    seal(&block, signer, key)
}

/// Encrypt and sign an already assembled data block.
pub fn seal(
    block: &DataBlock,
    signer: &SigningIdentity,
    key: &SymmetricKey,
) -> Result<String, ProtocolError> {
    let plaintext = block.as_lv()?.marshal_binary()?;
    let ciphertext = key.encrypt(&plaintext)?;
    let signature = signer.sign(&ciphertext);

    let envelope = Lv::combine(&[Lv::from(ciphertext), Lv::from(signature.to_bytes().to_vec())])?;
    let encoded = envelope.as_hex_string()?;
    tracing::debug!(
        plaintext_len = plaintext.len(),
        envelope_len = encoded.len() / 2,
        "envelope sealed"
    );
    Ok(encoded)
}

/// Verify, decrypt and check an envelope, returning its payloads.
pub fn unpack(
    pre_key_index: &str,
    peer_public_key: &VerifyingKey,
    key: &SymmetricKey,
    envelope_hex: &str,
    config: &EnvelopeConfig,
) -> Result<Vec<Lv>, ProtocolError> {
    unpack_at(Utc::now(), pre_key_index, peer_public_key, key, envelope_hex, config)
}

pub fn unpack_at(
    now: DateTime<Utc>,
    pre_key_index: &str,
    peer_public_key: &VerifyingKey,
    key: &SymmetricKey,
    envelope_hex: &str,
    config: &EnvelopeConfig,
) -> Result<Vec<Lv>, ProtocolError> {
    let result = open(now, pre_key_index, peer_public_key, key, envelope_hex, config);
    if let Err(ref e) = result {
        tracing::debug!(code = e.code(), "envelope rejected");
    }
    result
}

fn open(
    now: DateTime<Utc>,
    pre_key_index: &str,
    peer_public_key: &VerifyingKey,
    key: &SymmetricKey,
    envelope_hex: &str,
    config: &EnvelopeConfig,
) -> Result<Vec<Lv>, ProtocolError> {
    let [encrypted, signature] = split_envelope(envelope_hex)?;

    SigningIdentity::verify(peer_public_key, encrypted.value(), signature.value())
        .map_err(|_| ProtocolError::InvalidSignature)?;

    let plaintext = key
        .decrypt(encrypted.value())
        .map_err(|e| ProtocolError::Decode(e.to_string()))?;
    let block = DataBlock::from_lv(&Lv::unmarshal_binary(&plaintext)?)?;

    if !is_fresh(block.timestamp()?, now, config.ttl) {
        return Err(ProtocolError::TimeExpired);
    }
    if block.pre_key.value() != pre_key_index.as_bytes() {
        return Err(ProtocolError::InvalidPreKey);
    }
    if !block.check_data_hash() {
        return Err(ProtocolError::InvalidDataHash);
    }

    Lv::unmarshal_binary(block.data.value())?.expand()
}

fn split_envelope(envelope_hex: &str) -> Result<[Lv; 2], ProtocolError> {
    let parts = Lv::from_hex_string(envelope_hex)?.expand()?;
    parts
        .try_into()
        .map_err(|parts: Vec<Lv>| ProtocolError::InvalidData(parts.len()))
}

fn is_fresh(stamped: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    let window = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
    now.signed_duration_since(stamped).abs() <= window
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Parties {
        signer: SigningIdentity,
        key: SymmetricKey,
    }

    fn parties() -> Parties {
        Parties {
            signer: SigningIdentity::generate().unwrap(),
            key: SymmetricKey::from_bytes([11u8; 32]),
        }
    }

    fn alice_credentials() -> Vec<Lv> {
        vec![Lv::from("alice"), Lv::from("secret123")]
    }

    #[test]
    fn roundtrip() {
        let p = parties();
        let packed = pack("sess-42", &p.signer, &p.key, &alice_credentials()).unwrap();
        let payloads = unpack(
            "sess-42",
            &p.signer.public_key(),
            &p.key,
            &packed,
            &EnvelopeConfig::default(),
        )
        .unwrap();
        assert_eq!(payloads, alice_credentials());
    }

    #[test]
    fn empty_payload_list_roundtrips() {
        let p = parties();
        let packed = pack("i", &p.signer, &p.key, &[]).unwrap();
        let payloads = unpack("i", &p.signer.public_key(), &p.key, &packed, &EnvelopeConfig::default())
            .unwrap();
        assert!(payloads.is_empty());
    }

    #[test]
    fn wrong_pre_key_index() {
        let p = parties();
        let packed = pack("sess-42", &p.signer, &p.key, &alice_credentials()).unwrap();
        let err = unpack("sess-99", &p.signer.public_key(), &p.key, &packed, &EnvelopeConfig::default())
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPreKey));
    }

    #[test]
    fn wrong_signer_rejected_before_decryption() {
        let p = parties();
        let other = SigningIdentity::generate().unwrap();
        let packed = pack("sess-42", &p.signer, &p.key, &alice_credentials()).unwrap();
        // A wrong symmetric key would fail decryption; the signature check must win.
        let wrong_key = SymmetricKey::from_bytes([0u8; 32]);
        let err = unpack("sess-42", &other.public_key(), &wrong_key, &packed, &EnvelopeConfig::default())
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidSignature));
    }

    #[test]
    fn stale_block_expires() {
        let p = parties();
        let now = Utc::now();
        let packed = pack_at(
            now - TimeDelta::minutes(6),
            "sess-42",
            &p.signer,
            &p.key,
            &alice_credentials(),
        )
        .unwrap();
        let err = unpack_at(now, "sess-42", &p.signer.public_key(), &p.key, &packed, &EnvelopeConfig::default())
            .unwrap_err();
        assert!(matches!(err, ProtocolError::TimeExpired));
    }

    #[test]
    fn future_block_expires() {
        let p = parties();
        let now = Utc::now();
        let packed = pack_at(now + TimeDelta::hours(1), "i", &p.signer, &p.key, &[]).unwrap();
        let err = unpack_at(now, "i", &p.signer.public_key(), &p.key, &packed, &EnvelopeConfig::default())
            .unwrap_err();
        assert!(matches!(err, ProtocolError::TimeExpired));
    }

    #[test]
    fn injected_ttl_is_honoured() {
        let p = parties();
        let now = Utc::now();
        let packed = pack_at(now - TimeDelta::seconds(30), "i", &p.signer, &p.key, &[]).unwrap();
        let strict = EnvelopeConfig {
            ttl: Duration::from_secs(10),
        };
        let relaxed = EnvelopeConfig {
            ttl: Duration::from_secs(60),
        };
        assert!(unpack_at(now, "i", &p.signer.public_key(), &p.key, &packed, &strict).is_err());
        assert!(unpack_at(now, "i", &p.signer.public_key(), &p.key, &packed, &relaxed).is_ok());
    }

    #[test]
    fn signed_block_with_mismatched_hash() {
        let p = parties();
        let payload = Lv::combine(&alice_credentials()).unwrap().marshal_binary().unwrap();
        let mut block = DataBlock::new(payload).unwrap();
        block.set_pre_key("sess-42");
        block.data = Lv::combine(&[Lv::from("mallory"), Lv::from("secret123")]).unwrap();

        let sealed = seal(&block, &p.signer, &p.key).unwrap();
        let err = unpack("sess-42", &p.signer.public_key(), &p.key, &sealed, &EnvelopeConfig::default())
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidDataHash));
    }

    #[test]
    fn three_part_envelope_is_invalid_data() {
        let p = parties();
        let bogus = Lv::combine(&[Lv::from("a"), Lv::from("b"), Lv::from("c")])
            .unwrap()
            .as_hex_string()
            .unwrap();
        let err = unpack("i", &p.signer.public_key(), &p.key, &bogus, &EnvelopeConfig::default())
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidData(3)));
    }

    #[test]
    fn non_hex_is_decode_error() {
        let p = parties();
        let err = unpack("i", &p.signer.public_key(), &p.key, "not-hex", &EnvelopeConfig::default())
            .unwrap_err();
        assert_eq!(err.code(), "DECODE_ERROR");
    }

    #[test]
    fn is_fresh_boundaries() {
        let now = Utc::now();
        let ttl = Duration::from_secs(300);
        assert!(is_fresh(now, now, ttl));
        assert!(is_fresh(now - TimeDelta::seconds(300), now, ttl));
        assert!(!is_fresh(now - TimeDelta::seconds(301), now, ttl));
        assert!(!is_fresh(now + TimeDelta::seconds(301), now, ttl));
    }
}
