//! Token lookup shared by revocation and introspection.
//!
//! A presented token is looked up in the family named by the
//! `token_type_hint` first (access tokens when no hint is given) and, if it
//! is not found there, in the other family (RFC 7009 §2.1).
//!
//! Access tokens are JWTs and are "found" when their signature verifies
//! against the configured key set. A token whose signature verifies but
//! whose `exp` has passed is still found; its claims are then read back
//! with [`jwt::decode`] so it can be reported, never authorized.
//!
//! Refresh tokens are opaque and found through
//! [`RefreshTokenStorage::retrieve`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::jwks::JwksSource;
use super::jwt::{self, Claims, JwtError, claim_i64, claim_str};
use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::RefreshTokenStorage;
use crate::types::RefreshTokenRecord;

/// Token family named by `token_type_hint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenTypeHint {
    /// JWT access token.
    AccessToken,
    /// Opaque refresh token.
    RefreshToken,
}

impl TokenTypeHint {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }

    /// The family searched when this one misses.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::AccessToken => Self::RefreshToken,
            Self::RefreshToken => Self::AccessToken,
        }
    }
}

impl fmt::Display for TokenTypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A token located in one of the two families.
#[derive(Debug, Clone)]
pub enum FoundToken {
    /// A JWT whose signature verified. `claims` may describe an expired
    /// token.
    AccessToken { claims: Claims },
    /// A refresh token record returned by storage.
    RefreshToken { record: RefreshTokenRecord },
}

impl FoundToken {
    /// Family the token was found in.
    #[must_use]
    pub fn family(&self) -> TokenTypeHint {
        match self {
            Self::AccessToken { .. } => TokenTypeHint::AccessToken,
            Self::RefreshToken { .. } => TokenTypeHint::RefreshToken,
        }
    }

    #[must_use]
    pub fn me(&self) -> Option<&str> {
        match self {
            Self::AccessToken { claims } => claim_str(claims, "me"),
            Self::RefreshToken { record } => record.me.as_deref(),
        }
    }

    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        match self {
            Self::AccessToken { claims } => claim_str(claims, "scope"),
            Self::RefreshToken { record } => record.scope.as_deref(),
        }
    }

    #[must_use]
    pub fn exp(&self) -> Option<i64> {
        match self {
            Self::AccessToken { claims } => claim_i64(claims, "exp"),
            Self::RefreshToken { record } => Some(record.exp),
        }
    }

    /// Returns `true` if the token expired before `now`. A token without
    /// `exp` is treated as expired.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp().is_none_or(|exp| exp < now)
    }

    /// Names of the fields revocation and introspection need but the token
    /// does not carry.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        match self {
            Self::AccessToken { claims } => {
                let mut missing: Vec<&'static str> = ["me", "jti", "scope"]
                    .into_iter()
                    .filter(|name| claim_str(claims, name).is_none())
                    .collect();
                if claim_i64(claims, "exp").is_none() {
                    missing.push("exp");
                }
                missing
            }
            Self::RefreshToken { record } => {
                let mut missing = Vec::new();
                if record.me.is_none() {
                    missing.push("me");
                }
                if record.scope.is_none() {
                    missing.push("scope");
                }
                missing
            }
        }
    }

    /// Claims view of the token, as reported in diagnostics and
    /// introspection responses.
    #[must_use]
    pub fn claims(&self) -> Claims {
        match self {
            Self::AccessToken { claims } => claims.clone(),
            Self::RefreshToken { record } => {
                let mut claims = Claims::new();
                if let Some(me) = &record.me {
                    claims.insert("me".into(), me.clone().into());
                }
                if let Some(scope) = &record.scope {
                    claims.insert("scope".into(), scope.clone().into());
                }
                claims.insert("client_id".into(), record.client_id.clone().into());
                claims.insert("exp".into(), record.exp.into());
                claims.insert("iat".into(), record.created_at.into());
                claims
            }
        }
    }
}

/// Outcome of a search across both families.
#[derive(Debug, Clone)]
pub enum TokenSearchResult {
    Found(FoundToken),
    NotFound,
}

/// Looks tokens up across the access and refresh families.
#[derive(Clone)]
pub struct TokenSearch {
    issuer: String,
    jwks: Arc<dyn JwksSource>,
    refresh_tokens: Arc<dyn RefreshTokenStorage>,
}

impl TokenSearch {
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        jwks: Arc<dyn JwksSource>,
        refresh_tokens: Arc<dyn RefreshTokenStorage>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            jwks,
            refresh_tokens,
        }
    }

    /// Searches the hinted family, then the other one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ServerError` if the key set cannot be obtained or
    /// refresh token storage fails. Unverifiable tokens are not errors; they
    /// simply are not found.
    pub async fn search(
        &self,
        token: &str,
        hint: Option<TokenTypeHint>,
    ) -> AuthResult<TokenSearchResult> {
        let first = hint.unwrap_or(TokenTypeHint::AccessToken);

        for family in [first, first.other()] {
            if let Some(found) = self.search_family(token, family).await? {
                tracing::debug!(family = %family, hint = ?hint, "Token found");
                return Ok(TokenSearchResult::Found(found));
            }
        }

        tracing::debug!(hint = ?hint, "Token not found in either family");
        Ok(TokenSearchResult::NotFound)
    }

    async fn search_family(
        &self,
        token: &str,
        family: TokenTypeHint,
    ) -> AuthResult<Option<FoundToken>> {
        match family {
            TokenTypeHint::AccessToken => self.find_access_token(token).await,
            TokenTypeHint::RefreshToken => self.find_refresh_token(token).await,
        }
    }

    async fn find_access_token(&self, token: &str) -> AuthResult<Option<FoundToken>> {
        match jwt::verify(token, &self.issuer, self.jwks.as_ref()).await {
            Ok(claims) => Ok(Some(FoundToken::AccessToken { claims })),
            Err(JwtError::Expired) => match jwt::decode(token) {
                Ok(claims) => Ok(Some(FoundToken::AccessToken { claims })),
                Err(e) => {
                    tracing::debug!(error = %e, "Expired token could not be decoded");
                    Ok(None)
                }
            },
            Err(JwtError::KeySource(e)) => {
                tracing::error!(error = %e, "Key set unavailable");
                Err(AuthError::server_error(format!(
                    "could not obtain the key set: {e}"
                )))
            }
            Err(e) => {
                tracing::debug!(error = %e, "Not a verifiable access token");
                Ok(None)
            }
        }
    }

    async fn find_refresh_token(&self, token: &str) -> AuthResult<Option<FoundToken>> {
        let record = self.refresh_tokens.retrieve(token).await.map_err(|e| {
            tracing::warn!(error = %e, "Refresh token lookup failed");
            AuthError::callback("retrieve_refresh_token", e)
        })?;

        Ok(record.map(|record| FoundToken::RefreshToken { record }))
    }
}

impl fmt::Debug for TokenSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSearch")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}
