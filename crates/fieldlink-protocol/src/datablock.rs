use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};

use fieldlink_crypto::digest::{constant_time_eq, sha512};
use fieldlink_crypto::random::random_array;

use crate::error::ProtocolError;
use crate::lv::Lv;

pub const NONCE_LEN: usize = 32;

/// The plaintext record sealed inside every envelope.
///
/// On the wire it is the combination of five LVs, always in field order:
/// `time`, `nonce`, `pre_key`, `data`, `data_hash`. That order is spelled out
/// only in [`DataBlock::as_lv`] and [`DataBlock::from_lv`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
    /// RFC 3339 UTC creation time, second precision.
    pub time: Lv,
    /// 32 random bytes.
    pub nonce: Lv,
    /// Pre-key index the block is bound to.
    pub pre_key: Lv,
    /// Application payload, itself a combined LV.
    pub data: Lv,
    /// SHA-512 of `data`.
    pub data_hash: Lv,
}

impl DataBlock {
    pub fn new(data: impl Into<Bytes>) -> Result<Self, ProtocolError> {
        Self::new_at(data, Utc::now())
    }

    /// Build a block stamped with `now` instead of the wall clock.
    pub fn new_at(data: impl Into<Bytes>, now: DateTime<Utc>) -> Result<Self, ProtocolError> {
        let mut block = Self {
            time: Lv::default(),
            nonce: Lv::default(),
            pre_key: Lv::default(),
            data: Lv::default(),
            data_hash: Lv::default(),
        };
        block.set_time(now);
        block.generate_nonce()?;
        block.set_data(data);
        Ok(block)
    }

    pub fn set_time(&mut self, now: DateTime<Utc>) {
        self.time = Lv::from(now.to_rfc3339_opts(SecondsFormat::Secs, true));
    }

    pub fn generate_nonce(&mut self) -> Result<(), ProtocolError> {
        self.nonce = Lv::from(random_array::<NONCE_LEN>()?.to_vec());
        Ok(())
    }

    /// Replace the payload and recompute its hash.
    pub fn set_data(&mut self, data: impl Into<Bytes>) {
        self.data = Lv::new(data);
        self.data_hash = Lv::from(sha512(self.data.value()).to_vec());
    }

    pub fn set_pre_key(&mut self, pre_key_index: &str) {
        self.pre_key = Lv::from(pre_key_index);
    }

    pub fn check_data_hash(&self) -> bool {
        constant_time_eq(&sha512(self.data.value()), self.data_hash.value())
    }

    pub fn timestamp(&self) -> Result<DateTime<Utc>, ProtocolError> {
        let text = self.time.value_as_string()?;
        DateTime::parse_from_rfc3339(&text)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| ProtocolError::Decode(format!("invalid data block time {text:?}: {e}")))
    }

    pub fn as_lv(&self) -> Result<Lv, ProtocolError> {
        Lv::combine([
            &self.time,
            &self.nonce,
            &self.pre_key,
            &self.data,
            &self.data_hash,
        ])
    }

    pub fn from_lv(lv: &Lv) -> Result<Self, ProtocolError> {
        let [time, nonce, pre_key, data, data_hash]: [Lv; 5] =
            lv.expand()?.try_into().map_err(|parts: Vec<Lv>| {
                ProtocolError::Decode(format!(
                    "data block must have 5 fields, got {}",
                    parts.len()
                ))
            })?;
        Ok(Self {
            time,
            nonce,
            pre_key,
            data,
            data_hash,
        })
    }
}
