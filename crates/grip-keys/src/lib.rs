use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};

/// SHA-256 hex digest of a shell-access password.
///
/// Deterministic by design so the digest can live in a config file; the
/// only rejected input is an empty password.
pub fn hash_password(password: &str) -> Result<String> {
    if password.is_empty() {
        return Err(anyhow!("password must not be empty"));
    }
    let digest = Sha256::digest(password.as_bytes());
    Ok(hex::encode(digest))
}

/// Checks a candidate password against a stored hex digest.
///
/// Hex case and surrounding whitespace in the stored digest are ignored;
/// an empty candidate never matches anything.
pub fn verify_password(password: &str, expected_hex: &str) -> bool {
    match hash_password(password) {
        Ok(digest) => digest.eq_ignore_ascii_case(expected_hex.trim()),
        Err(_) => false,
    }
}
