//! Authorization code record.

use serde::{Deserialize, Serialize};

/// Authorization code created when the user approves a consent request.
///
/// A code with `used == true` is never redeemable again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// Client the code was issued to.
    pub client_id: String,

    /// The opaque code value (10 to 128 characters).
    pub code: String,

    /// PKCE challenge supplied in the authorization request.
    pub code_challenge: String,

    /// PKCE method (`S256` or `plain`).
    pub code_challenge_method: String,

    /// Expiration (unix seconds).
    pub exp: i64,

    /// Issuer that created the code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Profile URL of the approving user.
    pub me: String,

    /// Redirect URI the code was delivered to.
    pub redirect_uri: String,

    /// Approved scopes (space-separated).
    pub scope: String,

    /// Whether the code has been redeemed.
    #[serde(default)]
    pub used: bool,
}

impl AuthorizationCode {
    /// Returns `true` if the code expired before `now` (unix seconds).
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        now > self.exp
    }
}
