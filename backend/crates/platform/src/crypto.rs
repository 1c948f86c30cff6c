//! Cryptographic Utilities

use chrono::Utc;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

/// Number of entropy bytes fed into every generated token
pub const TOKEN_ENTROPY_BYTES: usize = 32;

/// Token generation failure
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The OS entropy source could not deliver bytes
    #[error("Entropy source unavailable: {0}")]
    Entropy(#[from] rand::Error),
}

/// Fill a buffer from the OS entropy source
pub fn try_random_bytes(len: usize) -> Result<Vec<u8>, rand::Error> {
    let mut bytes = vec![0u8; len];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(bytes)
}

/// Compute SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Generate an opaque, hex-encoded 64 character token.
///
/// 32 bytes of OS randomness are digested together with the current
/// timestamp, so two tokens only collide if both the entropy and the clock
/// repeat.
pub fn generate_token() -> Result<String, TokenError> {
    let entropy = try_random_bytes(TOKEN_ENTROPY_BYTES)?;
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(&entropy);
    hasher.update(nanos.to_be_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Constant-time comparison to prevent timing attacks
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
