//! Access token storage trait.

use async_trait::async_trait;

use super::StorageResult;
use crate::types::AccessTokenRecord;

/// Storage trait for access token companion records, keyed by `jti`.
#[async_trait]
pub trait AccessTokenStorage: Send + Sync {
    /// Finds the record for a `jti`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn retrieve(&self, jti: &str) -> StorageResult<Option<AccessTokenRecord>>;

    /// Returns `true` if the access token with this `jti` has been revoked.
    ///
    /// Unknown `jti` values are not revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn is_revoked(&self, jti: &str) -> StorageResult<bool>;

    /// Revokes the access token with this `jti`.
    ///
    /// # Arguments
    ///
    /// * `jti` - JWT ID of the token
    /// * `reason` - Optional revocation reason to record
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails.
    async fn revoke(&self, jti: &str, reason: Option<&str>) -> StorageResult<()>;
}
