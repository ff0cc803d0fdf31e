use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::CryptoError;

/// Fill a fixed-size array from the operating system RNG.
///
/// Unlike `OsRng::fill_bytes`, an unavailable entropy source is reported
/// instead of panicking. There is no fallback generator.
pub fn random_array<const N: usize>() -> Result<[u8; N], CryptoError> {
    let mut out = [0u8; N];
    OsRng
        .try_fill_bytes(&mut out)
        .map_err(|e| entropy_failure(&e))?;
    Ok(out)
}

/// Variable-length counterpart of [`random_array`].
pub fn random_vec(len: usize) -> Result<Vec<u8>, CryptoError> {
    let mut out = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut out)
        .map_err(|e| entropy_failure(&e))?;
    Ok(out)
}

fn entropy_failure(e: &rand::Error) -> CryptoError {
    tracing::error!(error = %e, "operating system RNG failed");
    CryptoError::RandomUnavailable(e.to_string())
}
