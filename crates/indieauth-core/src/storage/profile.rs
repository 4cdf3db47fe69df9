//! User profile lookup.

use async_trait::async_trait;

use super::StorageResult;
use crate::types::UserProfile;

/// Supplies profile information released for the `profile` scope.
#[async_trait]
pub trait UserProfileStorage: Send + Sync {
    /// Returns the profile of `me`, or `None` if none is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn retrieve_user_profile(&self, me: &str) -> StorageResult<Option<UserProfile>>;
}
