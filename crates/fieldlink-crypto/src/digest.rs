use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

pub const SHA512_LEN: usize = 64;

pub fn sha512(data: &[u8]) -> [u8; SHA512_LEN] {
    let mut out = [0u8; SHA512_LEN];
    out.copy_from_slice(&Sha512::digest(data));
    out
}

/// Constant-time equality; lengths are not secret.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
