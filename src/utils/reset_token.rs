use anyhow::Result;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};

/// Reset links die 15 minutes after generation. Design constant, not
/// user-configurable.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 15;

const TOKEN_BYTES: usize = 20;

/// Generate a one-time reset secret. Returns `(plaintext, digest)`: the
/// plaintext goes into the emailed link and is never stored; only the
/// digest is persisted.
pub fn generate() -> Result<(String, String)> {
    let mut buf = [0u8; TOKEN_BYTES];
    getrandom::getrandom(&mut buf).map_err(|e| anyhow::anyhow!("OS RNG unavailable: {e}"))?;
    let token = URL_SAFE_NO_PAD.encode(buf);
    let digest = digest(&token);
    Ok((token, digest))
}

/// Deterministic one-way digest of a plaintext token. Deliberately not
/// the salted password hash: records are looked up by digest equality,
/// so the mapping must be fast and stable.
pub fn digest(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

/// Absolute expiry for a token generated now.
pub fn expiry() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc() + chrono::Duration::minutes(RESET_TOKEN_TTL_MINUTES)
}
