//! Authorization code storage trait.
//!
//! # Implementation Notes
//!
//! The `mark_used` method must atomically check and mark a code as used.
//! Two concurrent redemptions of the same code must not both succeed.

use async_trait::async_trait;

use super::StorageResult;
use crate::types::AuthorizationCode;

/// Storage trait for authorization codes.
///
/// # Example Implementation
///
/// ```ignore
/// use indieauth_core::storage::{AuthorizationCodeStorage, StorageResult};
/// use indieauth_core::types::AuthorizationCode;
///
/// struct Codes {
///     codes: tokio::sync::RwLock<std::collections::HashMap<String, AuthorizationCode>>,
/// }
///
/// #[async_trait::async_trait]
/// impl AuthorizationCodeStorage for Codes {
///     async fn mark_used(&self, code: &str) -> StorageResult<bool> {
///         let mut codes = self.codes.write().await;
///         match codes.get_mut(code) {
///             Some(record) if !record.used => {
///                 record.used = true;
///                 Ok(true)
///             }
///             _ => Ok(false),
///         }
///     }
///     // ... other methods
/// }
/// ```
#[async_trait]
pub trait AuthorizationCodeStorage: Send + Sync {
    /// Persists a code created after the user approved a consent request.
    ///
    /// # Errors
    ///
    /// Returns an error if the code cannot be stored.
    async fn store(&self, code: &AuthorizationCode) -> StorageResult<()>;

    /// Looks up a code.
    ///
    /// # Returns
    ///
    /// Returns `Some(code)` regardless of its `used`/expiry state, `None` if
    /// no such code exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn retrieve(&self, code: &str) -> StorageResult<Option<AuthorizationCode>>;

    /// Atomically marks a code as used if not already used.
    ///
    /// # Returns
    ///
    /// Returns `true` if this call flipped `used` from `false` to `true`,
    /// `false` if the code was already used (or vanished).
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    ///
    /// # Atomicity
    ///
    /// A conditional update satisfies the contract:
    ///
    /// ```sql
    /// UPDATE authorization_codes SET used = true
    /// WHERE code = $1 AND used = false
    /// RETURNING code
    /// ```
    async fn mark_used(&self, code: &str) -> StorageResult<bool>;
}
