//! PKCE (Proof Key for Code Exchange)
//!
//! RFC 7636 with the S256 method only. `plain` is never accepted.

use crate::oauth::crypto::{constant_time_eq, hash_token};

/// The only supported challenge method
pub const S256: &str = "S256";

/// Compute `BASE64URL(SHA256(ASCII(code_verifier)))`
pub fn s256_challenge(code_verifier: &str) -> String {
    hash_token(code_verifier)
}

/// Verify a PKCE code_verifier against the stored code_challenge.
///
/// The comparison runs in constant time so a client cannot learn how many
/// leading characters of its guess were right.
pub fn verify_pkce(code_verifier: &str, code_challenge: &str) -> bool {
    let computed_challenge = s256_challenge(code_verifier);
    constant_time_eq(computed_challenge.as_bytes(), code_challenge.as_bytes())
}

/// Validate PKCE code_verifier format
///
/// RFC 7636 Section 4.1: 43-128 characters of `[A-Z] / [a-z] / [0-9] / "-" / "." / "_" / "~"`
pub fn validate_code_verifier(code_verifier: &str) -> bool {
    let len = code_verifier.len();
    if !(43..=128).contains(&len) {
        return false;
    }

    code_verifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
}

/// Validate PKCE code_challenge format
///
/// 43-128 base64url characters (an S256 challenge is exactly 43)
pub fn validate_code_challenge(code_challenge: &str) -> bool {
    let len = code_challenge.len();
    if !(43..=128).contains(&len) {
        return false;
    }

    code_challenge
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
}
