//! Refresh token record.
//!
//! Refresh tokens are opaque random strings. The record that binds a token
//! to its owner, client and scope is persisted by the hosting application
//! and handed back through [`RefreshTokenStorage`](crate::storage::RefreshTokenStorage).

use serde::{Deserialize, Serialize};

/// Refresh token as persisted by storage.
///
/// Once `revoked` is `true` the token can never be rotated, reported as
/// active, or revoked again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// Client the token was issued to.
    pub client_id: String,

    /// The opaque token value.
    pub refresh_token: String,

    /// Profile URL of the user that authorized the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub me: Option<String>,

    /// Redirect URI used in the original authorization.
    pub redirect_uri: String,

    /// Granted scopes (space-separated).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Expiration (unix seconds).
    pub exp: i64,

    /// Whether the token has been revoked.
    #[serde(default)]
    pub revoked: bool,

    /// Why the token was revoked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_reason: Option<String>,

    /// Issuance time (unix seconds).
    pub created_at: i64,
}

impl RefreshTokenRecord {
    /// Returns `true` if the token expired before `now` (unix seconds).
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp < now
    }

    /// Returns `true` if this token has been revoked.
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    /// Returns `true` if the token is neither expired nor revoked at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: i64) -> bool {
        !self.is_expired_at(now) && !self.is_revoked()
    }
}
