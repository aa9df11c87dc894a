//! Entropy and comparison primitives
//!
//! Every identifier and secret handed out by the authorization server comes
//! from [`generate_token`]. Codes and tokens are persisted under
//! [`hash_token`] so the store never holds a usable credential.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Bytes of OS randomness per generated token (256 bits)
pub const TOKEN_BYTES: usize = 32;

/// Generate an opaque, URL-safe token with 256 bits of entropy
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Storage key for an opaque credential: base64url(SHA-256(value))
pub fn hash_token(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Compare two byte strings without early exit on the first mismatch.
/// Only the lengths are compared in variable time.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_token_length_and_charset() {
        let token = generate_token();
        // 32 bytes, base64url without padding
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_generate_token_unique() {
        let tokens: HashSet<String> = (0..1000).map(|_| generate_token()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_hash_token_is_deterministic_and_opaque() {
        let token = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(hash_token(token), hash_token(token));
        assert_ne!(hash_token(token), token);
        // Same construction as a PKCE S256 challenge
        assert_eq!(hash_token(token), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret2"));
        assert!(constant_time_eq(b"", b""));
    }
}
