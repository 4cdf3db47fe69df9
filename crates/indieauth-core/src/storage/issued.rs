//! Persistence hook for newly issued token pairs.

use async_trait::async_trait;

use super::StorageResult;
use crate::types::IssuedTokens;

/// Receives every access/refresh pair the token endpoint mints.
#[async_trait]
pub trait IssuedTokenStorage: Send + Sync {
    /// Persists a freshly issued token pair.
    ///
    /// The tokens have already been signed when this is called. A failure
    /// is reported to the client as `server_error`, so the pair is never
    /// delivered.
    ///
    /// # Errors
    ///
    /// Returns an error if the pair cannot be stored.
    async fn on_issued_tokens(&self, issued: &IssuedTokens) -> StorageResult<()>;
}
