//! Token introspection (RFC 7662)
//!
//! Reports whether a presented access or refresh token is active and, when
//! it is known, what it was issued for.
//!
//! # Security Considerations
//!
//! - Unknown, malformed and forged tokens are all answered with
//!   `{"active": false}` and nothing else
//! - A validly signed but expired access token is reported inactive
//!   together with its claims
//! - Storage failures while checking revocation status are server errors,
//!   never an `active` answer
//!
//! # Example
//!
//! ```ignore
//! use indieauth_core::token::introspection::{IntrospectionRequest, IntrospectionService};
//!
//! let request = IntrospectionRequest {
//!     token: access_token,
//!     token_type_hint: None,
//! };
//!
//! let response = service.introspect(&request).await?;
//! assert!(response.active);
//! ```
//!
//! # References
//!
//! - [RFC 7662 - OAuth 2.0 Token Introspection](https://tools.ietf.org/html/rfc7662)

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::jwt::{claim_i64, claim_str};
use super::search::{FoundToken, TokenSearch, TokenSearchResult, TokenTypeHint};
use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::{AccessTokenStorage, RefreshTokenStorage};
use crate::types::unix_now;

// =============================================================================
// Request Types
// =============================================================================

/// Token introspection request per RFC 7662.
#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectionRequest {
    /// The token to introspect.
    pub token: String,

    /// Family to search first.
    #[serde(default)]
    pub token_type_hint: Option<TokenTypeHint>,
}

// =============================================================================
// Response Types
// =============================================================================

/// Token introspection response per RFC 7662.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    /// Whether the token is currently active. The only required field.
    pub active: bool,

    /// Profile URL of the user the token acts for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub me: Option<String>,

    /// Space-separated scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Client the token was issued to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// `Bearer` for access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Expiration time (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issued at time (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Issuer of the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// JWT ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl IntrospectionResponse {
    /// `{"active": false}`.
    #[must_use]
    pub fn inactive() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    fn from_found(found: &FoundToken, active: bool) -> Self {
        match found {
            FoundToken::AccessToken { claims } => Self {
                active,
                me: claim_str(claims, "me").map(str::to_string),
                scope: claim_str(claims, "scope").map(str::to_string),
                client_id: None,
                token_type: Some("Bearer".to_string()),
                exp: claim_i64(claims, "exp"),
                iat: claim_i64(claims, "iat"),
                iss: claim_str(claims, "iss").map(str::to_string),
                jti: claim_str(claims, "jti").map(str::to_string),
            },
            FoundToken::RefreshToken { record } => Self {
                active,
                me: record.me.clone(),
                scope: record.scope.clone(),
                client_id: Some(record.client_id.clone()),
                token_type: None,
                exp: Some(record.exp),
                iat: Some(record.created_at),
                iss: None,
                jti: None,
            },
        }
    }
}

// =============================================================================
// Service
// =============================================================================

/// Answers introspection requests. Never modifies storage.
#[derive(Clone)]
pub struct IntrospectionService {
    search: TokenSearch,
    access_tokens: Arc<dyn AccessTokenStorage>,
    refresh_tokens: Arc<dyn RefreshTokenStorage>,
}

impl IntrospectionService {
    #[must_use]
    pub fn new(
        search: TokenSearch,
        access_tokens: Arc<dyn AccessTokenStorage>,
        refresh_tokens: Arc<dyn RefreshTokenStorage>,
    ) -> Self {
        Self {
            search,
            access_tokens,
            refresh_tokens,
        }
    }

    /// Introspects the presented token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ServerError` if the key set or a storage call
    /// fails.
    pub async fn introspect(
        &self,
        request: &IntrospectionRequest,
    ) -> AuthResult<IntrospectionResponse> {
        let found = match self
            .search
            .search(&request.token, request.token_type_hint)
            .await?
        {
            TokenSearchResult::Found(found) => found,
            TokenSearchResult::NotFound => return Ok(IntrospectionResponse::inactive()),
        };

        let missing = found.missing_fields();
        if !missing.is_empty() {
            tracing::debug!(
                token_type = %found.family(),
                missing = ?missing,
                "Token lacks required fields, reporting inactive"
            );
            return Ok(IntrospectionResponse::inactive());
        }

        let expired = found.is_expired_at(unix_now());
        let response = match &found {
            FoundToken::AccessToken { claims } => {
                let jti = claim_str(claims, "jti").unwrap_or_default();
                let revoked = self.access_tokens.is_revoked(jti).await.map_err(|e| {
                    tracing::warn!(jti = %jti, error = %e, "Could not check access token status");
                    AuthError::callback("is_access_token_revoked", e)
                })?;

                let record = self.access_tokens.retrieve(jti).await.map_err(|e| {
                    tracing::warn!(jti = %jti, error = %e, "Could not retrieve access token");
                    AuthError::callback("retrieve_access_token", e)
                })?;

                let response = IntrospectionResponse::from_found(&found, !expired && !revoked);
                match record {
                    Some(record) => response.with_client_id(record.client_id),
                    None => response,
                }
            }
            FoundToken::RefreshToken { record } => {
                let revoked = record.revoked
                    || self
                        .refresh_tokens
                        .is_revoked(&record.refresh_token)
                        .await
                        .map_err(|e| {
                            tracing::warn!(error = %e, "Could not check refresh token status");
                            AuthError::callback("is_refresh_token_revoked", e)
                        })?;

                IntrospectionResponse::from_found(&found, !expired && !revoked)
            }
        };

        tracing::debug!(
            token_type = %found.family(),
            active = response.active,
            jti = ?response.jti,
            "Token introspected"
        );

        Ok(response)
    }
}

impl std::fmt::Debug for IntrospectionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntrospectionService")
            .field("search", &self.search)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
