//! Token revocation (RFC 7009)
//!
//! Revokes access tokens (by `jti`) and refresh tokens presented at the
//! revocation endpoint.
//!
//! # Security Considerations
//!
//! - A missing, unknown, unverifiable, expired or already revoked token is
//!   answered with a success message; the response never reveals whether a
//!   token exists
//! - Only tokens whose `me` is the configured profile URL can be revoked;
//!   anything else is an `invalid_request` and storage is never touched
//! - The claims of an expired access token are read without signature
//!   verification only after its signature was checked, and only to report
//!
//! # Example
//!
//! ```ignore
//! use indieauth_core::token::revocation::{RevocationRequest, RevocationService};
//!
//! let request = RevocationRequest {
//!     token: Some(token),
//!     token_type_hint: Some(TokenTypeHint::RefreshToken),
//!     revocation_reason: Some("logout".to_string()),
//! };
//!
//! let revocation = service.revoke(&request).await?;
//! println!("{}", revocation.message());
//! ```
//!
//! # References
//!
//! - [RFC 7009 - OAuth 2.0 Token Revocation](https://tools.ietf.org/html/rfc7009)

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::jwt::{Claims, claim_str};
use super::search::{FoundToken, TokenSearch, TokenSearchResult};
use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::{AccessTokenStorage, RefreshTokenStorage};
use crate::types::{RefreshTokenRecord, unix_now};

pub use super::search::TokenTypeHint;

// =============================================================================
// Request Types
// =============================================================================

/// Token revocation request per RFC 7009.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevocationRequest {
    /// The token to revoke. An absent token is not an error.
    #[serde(default)]
    pub token: Option<String>,

    /// Family to search first.
    #[serde(default)]
    pub token_type_hint: Option<TokenTypeHint>,

    /// Reason recorded by storage alongside the revocation.
    #[serde(default)]
    pub revocation_reason: Option<String>,
}

// =============================================================================
// Outcome Types
// =============================================================================

/// What a revocation request ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationOutcome {
    /// No token was presented, or it was found in neither family.
    NothingToRevoke,
    /// The token was found but lacks fields needed to revoke it.
    NotRevocable { missing: Vec<&'static str> },
    /// The token had already expired.
    AlreadyExpired,
    /// The token had already been revoked.
    AlreadyRevoked,
    /// The token is now revoked.
    Revoked,
}

/// Diagnostics gathered while handling one request.
///
/// Carried on the returned [`Revocation`] so the HTTP layer can log what
/// was decided without re-reading the token.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestContext {
    /// Family the token was found in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<TokenTypeHint>,

    /// Claims of the token, if it was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<Claims>,
}

impl RequestContext {
    fn found(found: &FoundToken) -> Self {
        Self {
            token_type: Some(found.family()),
            claims: Some(found.claims()),
        }
    }

    /// `jti` of the token, for access tokens.
    #[must_use]
    pub fn jti(&self) -> Option<&str> {
        self.claims.as_ref().and_then(|claims| claim_str(claims, "jti"))
    }
}

/// Result of [`RevocationService::revoke`].
#[derive(Debug, Clone, PartialEq)]
pub struct Revocation {
    pub outcome: RevocationOutcome,
    pub context: RequestContext,
}

impl Revocation {
    fn nothing_to_revoke() -> Self {
        Self {
            outcome: RevocationOutcome::NothingToRevoke,
            context: RequestContext::default(),
        }
    }

    /// Message returned to the client.
    #[must_use]
    pub fn message(&self) -> String {
        let family = self
            .context
            .token_type
            .map_or("token", |family| family.as_str());

        match &self.outcome {
            RevocationOutcome::NothingToRevoke => "Nothing to revoke".to_string(),
            RevocationOutcome::NotRevocable { missing } => format!(
                "The {family} has no {}, so there is nothing revocable",
                missing.join(", ")
            ),
            RevocationOutcome::AlreadyExpired => {
                format!("The {family} has already expired, so there is nothing to do")
            }
            RevocationOutcome::AlreadyRevoked => {
                format!("The {family} has already been revoked, so there is nothing to do")
            }
            RevocationOutcome::Revoked => format!("The {family} has been revoked"),
        }
    }

    /// Returns `true` if this request revoked a token.
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.outcome == RevocationOutcome::Revoked
    }
}

// =============================================================================
// Service
// =============================================================================

/// Revokes tokens owned by the configured profile URL.
#[derive(Clone)]
pub struct RevocationService {
    me: String,
    search: TokenSearch,
    access_tokens: Arc<dyn AccessTokenStorage>,
    refresh_tokens: Arc<dyn RefreshTokenStorage>,
}

impl RevocationService {
    #[must_use]
    pub fn new(
        me: impl Into<String>,
        search: TokenSearch,
        access_tokens: Arc<dyn AccessTokenStorage>,
        refresh_tokens: Arc<dyn RefreshTokenStorage>,
    ) -> Self {
        Self {
            me: me.into(),
            search,
            access_tokens,
            refresh_tokens,
        }
    }

    /// Revokes the presented token.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidRequest` if the token belongs to another profile
    /// - `AuthError::ServerError` if the key set or a storage call fails
    pub async fn revoke(&self, request: &RevocationRequest) -> AuthResult<Revocation> {
        let Some(token) = request.token.as_deref().filter(|t| !t.is_empty()) else {
            tracing::debug!("Revocation request without token");
            return Ok(Revocation::nothing_to_revoke());
        };

        let found = match self.search.search(token, request.token_type_hint).await? {
            TokenSearchResult::Found(found) => found,
            TokenSearchResult::NotFound => return Ok(Revocation::nothing_to_revoke()),
        };

        let context = RequestContext::found(&found);
        let reason = request.revocation_reason.as_deref();

        let missing = found.missing_fields();
        if !missing.is_empty() {
            tracing::info!(
                token_type = %found.family(),
                missing = ?missing,
                "Token lacks fields needed for revocation"
            );
            return Ok(Revocation {
                outcome: RevocationOutcome::NotRevocable { missing },
                context,
            });
        }

        if found.me() != Some(self.me.as_str()) {
            tracing::warn!(
                token_type = %found.family(),
                me = ?found.me(),
                "Refusing to revoke a token issued to another profile"
            );
            return Err(AuthError::invalid_request(format!(
                "the {} was not issued to {}",
                found.family(),
                self.me
            )));
        }

        let outcome = match &found {
            FoundToken::AccessToken { claims } => {
                let jti = claim_str(claims, "jti").unwrap_or_default();
                self.revoke_access_token(&found, jti, reason).await?
            }
            FoundToken::RefreshToken { record } => {
                self.revoke_refresh_token(&found, record, reason).await?
            }
        };

        Ok(Revocation { outcome, context })
    }

    async fn revoke_access_token(
        &self,
        found: &FoundToken,
        jti: &str,
        reason: Option<&str>,
    ) -> AuthResult<RevocationOutcome> {
        if found.is_expired_at(unix_now()) {
            return Ok(RevocationOutcome::AlreadyExpired);
        }

        let revoked = self.access_tokens.is_revoked(jti).await.map_err(|e| {
            tracing::warn!(jti = %jti, error = %e, "Could not check access token status");
            AuthError::callback("is_access_token_revoked", e)
        })?;
        if revoked {
            return Ok(RevocationOutcome::AlreadyRevoked);
        }

        self.access_tokens.revoke(jti, reason).await.map_err(|e| {
            tracing::error!(jti = %jti, error = %e, "Failed to revoke access token");
            AuthError::callback("revoke_access_token", e)
        })?;

        tracing::info!(jti = %jti, reason = ?reason, "Access token revoked");
        Ok(RevocationOutcome::Revoked)
    }

    async fn revoke_refresh_token(
        &self,
        found: &FoundToken,
        record: &RefreshTokenRecord,
        reason: Option<&str>,
    ) -> AuthResult<RevocationOutcome> {
        if found.is_expired_at(unix_now()) {
            return Ok(RevocationOutcome::AlreadyExpired);
        }

        let refresh_token = record.refresh_token.as_str();
        let revoked = record.revoked
            || self
                .refresh_tokens
                .is_revoked(refresh_token)
                .await
                .map_err(|e| {
                    tracing::warn!(error = %e, "Could not check refresh token status");
                    AuthError::callback("is_refresh_token_revoked", e)
                })?;
        if revoked {
            return Ok(RevocationOutcome::AlreadyRevoked);
        }

        self.refresh_tokens
            .revoke(refresh_token, reason)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to revoke refresh token");
                AuthError::callback("revoke_refresh_token", e)
            })?;

        tracing::info!(reason = ?reason, "Refresh token revoked");
        Ok(RevocationOutcome::Revoked)
    }
}

impl std::fmt::Debug for RevocationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationService")
            .field("me", &self.me)
            .field("search", &self.search)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
