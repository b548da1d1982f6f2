//! PKCE (RFC 7636) helpers for the OAuth authorization-code flow.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a random code verifier (43 base64url characters).
pub fn generate_verifier() -> String {
    let random_bytes: [u8; 32] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Derive the S256 code challenge for a verifier.
pub fn challenge_for(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verifier_length() {
        let verifier = generate_verifier();
        assert!(verifier.len() >= 43);
    }

    #[test]
    fn test_verifiers_are_unique() {
        assert_ne!(generate_verifier(), generate_verifier());
    }

    #[test]
    fn test_challenge_is_deterministic() {
        let verifier = "test_verifier";
        assert_eq!(challenge_for(verifier), challenge_for(verifier));
        assert_ne!(challenge_for(verifier), verifier);
    }
}
