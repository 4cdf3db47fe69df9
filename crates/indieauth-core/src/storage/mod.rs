//! Storage traits for credentials.
//!
//! The token lifecycle engine never persists anything itself. The hosting
//! application implements one trait per capability:
//!
//! - [`AuthorizationCodeStorage`] - create, look up and atomically claim codes
//! - [`AccessTokenStorage`] - access token companion records and revocation
//! - [`RefreshTokenStorage`] - refresh token records and revocation
//! - [`IssuedTokenStorage`] - persist a freshly issued token pair
//! - [`UserProfileStorage`] - profile data for the `profile` scope
//!
//! Every failure is reported as a [`StorageError`]; services wrap it into
//! [`AuthError::callback`](crate::AuthError::callback) and never retry.
//!
//! [`memory::InMemoryStorage`] implements all of them for tests and local
//! development.

pub mod access_token;
pub mod authorization_code;
pub mod issued;
pub mod memory;
pub mod profile;
pub mod refresh_token;

use std::sync::Arc;

pub use access_token::AccessTokenStorage;
pub use authorization_code::AuthorizationCodeStorage;
pub use issued::IssuedTokenStorage;
pub use memory::InMemoryStorage;
pub use profile::UserProfileStorage;
pub use refresh_token::RefreshTokenStorage;

/// Failure reported by a storage implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StorageError {
    message: String,
}

impl StorageError {
    /// Creates a new storage error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Every storage capability the engine uses, shared as trait objects.
#[derive(Clone)]
pub struct Storage {
    pub codes: Arc<dyn AuthorizationCodeStorage>,
    pub access_tokens: Arc<dyn AccessTokenStorage>,
    pub refresh_tokens: Arc<dyn RefreshTokenStorage>,
    pub issued: Arc<dyn IssuedTokenStorage>,
    pub profiles: Arc<dyn UserProfileStorage>,
}

impl Storage {
    /// Uses one backend for every capability.
    #[must_use]
    pub fn shared<S>(backend: Arc<S>) -> Self
    where
        S: AuthorizationCodeStorage
            + AccessTokenStorage
            + RefreshTokenStorage
            + IssuedTokenStorage
            + UserProfileStorage
            + 'static,
    {
        Self {
            codes: backend.clone(),
            access_tokens: backend.clone(),
            refresh_tokens: backend.clone(),
            issued: backend.clone(),
            profiles: backend,
        }
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}
