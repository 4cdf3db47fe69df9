//! Opaque refresh token generation.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::types::unix_now;

/// A freshly generated refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedRefreshToken {
    /// 256-bit random value, base64url (43 characters).
    pub refresh_token: String,
    /// Expiration (unix seconds).
    pub exp: i64,
}

/// Generates a refresh token valid for `expires_in`.
#[must_use]
pub fn generate(expires_in: Duration) -> GeneratedRefreshToken {
    let lifetime = i64::try_from(expires_in.as_secs()).unwrap_or(i64::MAX);
    GeneratedRefreshToken {
        refresh_token: generate_token(),
        exp: unix_now().saturating_add(lifetime),
    }
}

/// Generates a cryptographically secure random token.
#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token() {
        let token = generate_token();
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_generate_token_uniqueness() {
        let mut tokens: Vec<String> = (0..100).map(|_| generate_token()).collect();
        tokens.sort();
        tokens.dedup();
        assert_eq!(tokens.len(), 100);
    }

    #[test]
    fn test_generate_sets_expiry() {
        let before = unix_now();
        let generated = generate(Duration::from_secs(3600));
        assert!(generated.exp >= before + 3600);
        assert!(generated.exp <= unix_now() + 3600);
    }
}
