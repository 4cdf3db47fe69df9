//! PKCE (Proof Key for Code Exchange) implementation
//!
//! Implements RFC 7636 with the `S256` and `plain` methods. IndieAuth
//! clients are expected to use `S256`; `plain` is accepted for codes whose
//! stored method says so.
//!
//! # Example
//!
//! ```ignore
//! use indieauth_core::oauth::pkce::{self, PkceChallengeMethod, PkceVerifier};
//!
//! let verifier = PkceVerifier::generate();
//! let challenge = pkce::compute_challenge(verifier.as_str(), PkceChallengeMethod::S256);
//!
//! // Later, at the token endpoint:
//! let candidate = pkce::compute_challenge(verifier.as_str(), PkceChallengeMethod::S256);
//! assert!(pkce::verify(&candidate, &challenge));
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::AuthError;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during PKCE operations.
#[derive(Debug, thiserror::Error)]
pub enum PkceError {
    /// Verifier length is outside the valid range (43-128 characters).
    #[error("Invalid code_verifier length: must be 43-128 characters, got {0}")]
    InvalidVerifierLength(usize),

    /// Verifier contains invalid characters.
    #[error("Invalid code_verifier characters: must be unreserved ([A-Za-z0-9-._~])")]
    InvalidVerifierCharacters,

    /// The challenge method cannot be evaluated.
    #[error("Unsupported code_challenge_method: {0}")]
    UnsupportedMethod(String),

    /// The verifier does not match the stored challenge.
    #[error("PKCE verification failed: code_verifier does not match code_challenge")]
    VerificationFailed,
}

impl PkceError {
    /// Create an `UnsupportedMethod` error.
    #[must_use]
    pub fn unsupported_method(method: impl Into<String>) -> Self {
        Self::UnsupportedMethod(method.into())
    }

    /// Returns `true` if this is a verifier validation error.
    #[must_use]
    pub fn is_verifier_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidVerifierLength(_) | Self::InvalidVerifierCharacters
        )
    }

    /// Get the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidVerifierLength(_) | Self::InvalidVerifierCharacters => "invalid_request",
            Self::UnsupportedMethod(_) => "server_error",
            Self::VerificationFailed => "invalid_grant",
        }
    }
}

impl From<PkceError> for AuthError {
    fn from(err: PkceError) -> Self {
        match err {
            PkceError::InvalidVerifierLength(_) | PkceError::InvalidVerifierCharacters => {
                AuthError::invalid_request(err.to_string())
            }
            PkceError::UnsupportedMethod(_) => AuthError::configuration(err.to_string()),
            PkceError::VerificationFailed => AuthError::invalid_grant(err.to_string()),
        }
    }
}

// =============================================================================
// PKCE Challenge Method
// =============================================================================

/// PKCE challenge method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PkceChallengeMethod {
    /// Challenge equals the verifier.
    Plain,
    /// SHA-256 hash of the verifier, base64url without padding.
    #[default]
    S256,
}

impl PkceChallengeMethod {
    /// Parse challenge method from string.
    ///
    /// # Errors
    ///
    /// Returns `PkceError::UnsupportedMethod` for anything other than
    /// `S256` or `plain`.
    pub fn parse(method: &str) -> Result<Self, PkceError> {
        match method {
            "S256" => Ok(Self::S256),
            "plain" => Ok(Self::Plain),
            other => Err(PkceError::unsupported_method(other)),
        }
    }

    /// Get the method as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::S256 => "S256",
        }
    }
}

impl std::fmt::Display for PkceChallengeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// PKCE Verifier
// =============================================================================

/// PKCE code verifier.
///
/// A high-entropy random string of 43 to 128 characters drawn from
/// `[A-Z] / [a-z] / [0-9] / "-" / "." / "_" / "~"` (RFC 7636 Section 4.1).
#[derive(Debug, Clone)]
pub struct PkceVerifier(String);

impl PkceVerifier {
    /// Create a new verifier from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Length is not between 43 and 128 characters
    /// - Contains characters other than `[A-Za-z0-9-._~]`
    pub fn new(verifier: String) -> Result<Self, PkceError> {
        let len = verifier.len();
        if !(43..=128).contains(&len) {
            return Err(PkceError::InvalidVerifierLength(len));
        }

        if !verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
        {
            return Err(PkceError::InvalidVerifierCharacters);
        }

        Ok(Self(verifier))
    }

    /// Generate a cryptographically random verifier (32 bytes, base64url).
    #[must_use]
    pub fn generate() -> Self {
        use rand::Rng;
        let bytes: [u8; 32] = rand::thread_rng().r#gen();
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Get the verifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PkceVerifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Challenge computation
// =============================================================================

/// Computes the code challenge for `code_verifier` with `method`.
///
/// `S256` is `BASE64URL(SHA256(ASCII(code_verifier)))` without padding,
/// `plain` is the verifier itself.
#[must_use]
pub fn compute_challenge(code_verifier: &str, method: PkceChallengeMethod) -> String {
    match method {
        PkceChallengeMethod::Plain => code_verifier.to_string(),
        PkceChallengeMethod::S256 => {
            let hash = Sha256::digest(code_verifier.as_bytes());
            URL_SAFE_NO_PAD.encode(hash)
        }
    }
}

/// Compares a recomputed challenge against the stored one in constant time.
#[must_use]
pub fn verify(candidate: &str, stored: &str) -> bool {
    candidate.as_bytes().ct_eq(stored.as_bytes()).into()
}

/// Checks `code_verifier` against a stored challenge and method name.
///
/// # Errors
///
/// - `PkceError::UnsupportedMethod` if `method` cannot be evaluated
/// - `PkceError::VerificationFailed` on mismatch
pub fn verify_code_verifier(
    code_verifier: &str,
    stored_challenge: &str,
    method: &str,
) -> Result<(), PkceError> {
    let method = PkceChallengeMethod::parse(method)?;
    let candidate = compute_challenge(code_verifier, method);
    if verify(&candidate, stored_challenge) {
        Ok(())
    } else {
        Err(PkceError::VerificationFailed)
    }
}

// =============================================================================
// Tests
// =============================================================================
