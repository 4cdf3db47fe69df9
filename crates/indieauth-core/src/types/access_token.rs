//! Access token storage companion.

use serde::{Deserialize, Serialize};

/// Storage-side record for an issued access token, keyed by `jti`.
///
/// The token itself is a self-contained JWT; this record only exists so the
/// hosting application can answer revocation queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenRecord {
    /// JWT ID of the access token.
    pub jti: String,

    /// Client the token was issued to.
    pub client_id: String,

    /// Redirect URI of the original authorization.
    pub redirect_uri: String,

    /// Issuance time (unix seconds).
    pub created_at: i64,

    /// Whether the token has been revoked.
    #[serde(default)]
    pub revoked: bool,

    /// Why the token was revoked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_reason: Option<String>,
}
