//! Refresh token storage trait.
//!
//! # Security Considerations
//!
//! - Revocation must be immediate: once `revoke` returns, `is_revoked`
//!   must report `true` for the token
//! - Records of revoked tokens should be kept until they expire so repeated
//!   revocation and rotation attempts are recognized

use async_trait::async_trait;

use super::StorageResult;
use crate::types::RefreshTokenRecord;

/// Storage trait for refresh tokens.
#[async_trait]
pub trait RefreshTokenStorage: Send + Sync {
    /// Finds a refresh token record by token value.
    ///
    /// # Returns
    ///
    /// Returns tokens regardless of expiration/revocation status; callers
    /// check `is_valid_at()` before using.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn retrieve(&self, refresh_token: &str) -> StorageResult<Option<RefreshTokenRecord>>;

    /// Returns `true` if the token has been revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn is_revoked(&self, refresh_token: &str) -> StorageResult<bool>;

    /// Revokes a refresh token.
    ///
    /// # Arguments
    ///
    /// * `refresh_token` - The token value
    /// * `reason` - Optional revocation reason to record (e.g. `refreshed`)
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails.
    async fn revoke(&self, refresh_token: &str, reason: Option<&str>) -> StorageResult<()>;
}
