//! Freshly minted token pair.

use serde::{Deserialize, Serialize};

use super::{AccessTokenRecord, RefreshTokenRecord};

/// Everything the hosting application needs to persist after a token pair
/// has been issued. Handed to
/// [`IssuedTokenStorage::on_issued_tokens`](crate::storage::IssuedTokenStorage::on_issued_tokens).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedTokens {
    /// Signed JWT access token.
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub access_token_expires_in: i64,
    pub client_id: String,
    pub issuer: String,
    /// `jti` claim of the access token.
    pub jti: String,
    /// Key ID of the signing key.
    pub kid: String,
    pub me: String,
    pub redirect_uri: String,
    /// Opaque refresh token.
    pub refresh_token: String,
    /// Refresh token expiration (unix seconds).
    pub refresh_token_expires_at: i64,
    pub scope: String,
}

impl IssuedTokens {
    /// Storage record for the access token half of the pair.
    #[must_use]
    pub fn access_token_record(&self, created_at: i64) -> AccessTokenRecord {
        AccessTokenRecord {
            jti: self.jti.clone(),
            client_id: self.client_id.clone(),
            redirect_uri: self.redirect_uri.clone(),
            created_at,
            revoked: false,
            revocation_reason: None,
        }
    }

    /// Storage record for the refresh token half of the pair.
    #[must_use]
    pub fn refresh_token_record(&self, created_at: i64) -> RefreshTokenRecord {
        RefreshTokenRecord {
            client_id: self.client_id.clone(),
            refresh_token: self.refresh_token.clone(),
            me: Some(self.me.clone()),
            redirect_uri: self.redirect_uri.clone(),
            scope: Some(self.scope.clone()),
            exp: self.refresh_token_expires_at,
            revoked: false,
            revocation_reason: None,
            created_at,
        }
    }
}
