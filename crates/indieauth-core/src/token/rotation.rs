//! Refresh token rotation (`grant_type=refresh_token`).
//!
//! A refresh token is exchanged for a new access/refresh pair. The old
//! refresh token and the access token presented alongside it are revoked
//! before the new pair is issued, so every refresh token is usable once.

use std::sync::Arc;

use serde_json::Value;

use super::claims::{ClaimAssertion, ClaimValidator, Operator};
use super::issuance::{IssuanceRequest, tokens_plus_info};
use super::jwks::JwksSource;
use super::jwt::{self, JwtError, SigningKeySet};
use super::revocation::{RevocationOutcome, RevocationRequest, RevocationService};
use super::search::TokenTypeHint;
use crate::AuthResult;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::storage::{AccessTokenStorage, IssuedTokenStorage, RefreshTokenStorage};
use crate::types::{IssuedTokens, unix_now};

/// Revocation reason recorded for tokens replaced by a rotation.
pub const REFRESHED: &str = "refreshed";

/// A validated refresh grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshGrant {
    pub refresh_token: String,
    /// Requested scope. When absent the original scope is kept.
    pub scope: Option<String>,
    /// Bearer token from the `Authorization` header.
    pub access_token: Option<String>,
}

/// Rotates refresh tokens.
#[derive(Clone)]
pub struct RefreshRotation {
    config: Arc<AuthConfig>,
    keys: Arc<SigningKeySet>,
    jwks: Arc<dyn JwksSource>,
    access_tokens: Arc<dyn AccessTokenStorage>,
    refresh_tokens: Arc<dyn RefreshTokenStorage>,
    issued: Arc<dyn IssuedTokenStorage>,
    revocation: RevocationService,
}

impl RefreshRotation {
    #[must_use]
    pub fn new(
        config: Arc<AuthConfig>,
        keys: Arc<SigningKeySet>,
        jwks: Arc<dyn JwksSource>,
        access_tokens: Arc<dyn AccessTokenStorage>,
        refresh_tokens: Arc<dyn RefreshTokenStorage>,
        issued: Arc<dyn IssuedTokenStorage>,
        revocation: RevocationService,
    ) -> Self {
        Self {
            config,
            keys,
            jwks,
            access_tokens,
            refresh_tokens,
            issued,
            revocation,
        }
    }

    /// Exchanges a refresh token for a new token pair.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidGrant` if the refresh token is unknown, revoked
    ///   or expired
    /// - `AuthError::InvalidRequest` if the record is incomplete or the
    ///   requested scope differs from the granted one
    /// - `AuthError::Unauthorized` if no valid, unrevoked access token for
    ///   the same user is presented
    /// - `AuthError::InvalidGrant` if either token could not be revoked
    /// - `AuthError::ServerError` if signing or a storage call fails
    pub async fn rotate(&self, grant: &RefreshGrant) -> AuthResult<IssuedTokens> {
        // 1. Look the refresh token up
        let record = self
            .refresh_tokens
            .retrieve(&grant.refresh_token)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Refresh token lookup failed");
                AuthError::callback("retrieve_refresh_token", e)
            })?
            .ok_or_else(|| AuthError::invalid_grant("refresh token not found"))?;

        // 2. Revocation
        if record.revoked {
            tracing::warn!(client_id = %record.client_id, "Revoked refresh token presented");
            return Err(AuthError::invalid_grant(match &record.revocation_reason {
                Some(reason) => format!("refresh token was revoked ({reason})"),
                None => "refresh token was revoked".to_string(),
            }));
        }

        // 3. Expiry
        if record.is_expired_at(unix_now()) {
            return Err(AuthError::invalid_grant("refresh token expired"));
        }

        // 4. Completeness
        let (Some(me), Some(scope)) = (record.me.as_deref(), record.scope.as_deref()) else {
            return Err(AuthError::invalid_request(
                "refresh token record has no me or scope",
            ));
        };

        // 5. Scope must not change
        if let Some(requested) = grant.scope.as_deref()
            && requested != scope
        {
            return Err(AuthError::invalid_request(format!(
                "requested scope `{requested}` differs from the granted scope `{scope}`"
            )));
        }

        // 6. A valid access token for the same user
        let access_token = grant
            .access_token
            .as_deref()
            .ok_or_else(|| AuthError::unauthorized("a bearer access token is required"))?;
        self.check_access_token(access_token, me).await?;

        // 7. Revoke what is being replaced
        let revoked = self
            .revocation
            .revoke(&RevocationRequest {
                token: Some(grant.refresh_token.clone()),
                token_type_hint: Some(TokenTypeHint::RefreshToken),
                revocation_reason: Some(REFRESHED.to_string()),
            })
            .await?;
        if revoked.outcome != RevocationOutcome::Revoked {
            return Err(AuthError::invalid_grant(revoked.message()));
        }

        let revoked = self
            .revocation
            .revoke(&RevocationRequest {
                token: Some(access_token.to_string()),
                token_type_hint: Some(TokenTypeHint::AccessToken),
                revocation_reason: Some(REFRESHED.to_string()),
            })
            .await?;
        if revoked.outcome != RevocationOutcome::Revoked {
            return Err(AuthError::invalid_grant(revoked.message()));
        }

        // 8. Issue the replacement pair
        let issued = tokens_plus_info(
            &IssuanceRequest {
                access_token_expiration: self.config.token.access_token_lifetime,
                client_id: record.client_id.clone(),
                issuer: self.config.issuer.clone(),
                me: me.to_string(),
                redirect_uri: record.redirect_uri.clone(),
                refresh_token_expiration: self.config.token.refresh_token_lifetime,
                scope: scope.to_string(),
            },
            &self.keys,
        )?;

        // 9. Hand it to storage
        self.issued.on_issued_tokens(&issued).await.map_err(|e| {
            tracing::error!(jti = %issued.jti, error = %e, "Failed to persist rotated tokens");
            AuthError::callback("on_issued_tokens", e)
        })?;

        tracing::info!(
            jti = %issued.jti,
            client_id = %issued.client_id,
            grant_type = "refresh_token",
            "Refresh token rotated"
        );

        Ok(issued)
    }

    async fn check_access_token(&self, token: &str, me: &str) -> AuthResult<()> {
        let claims = match jwt::verify(token, &self.config.issuer, self.jwks.as_ref()).await {
            Ok(claims) => claims,
            Err(JwtError::KeySource(e)) => {
                return Err(AuthError::server_error(format!(
                    "could not obtain the key set: {e}"
                )));
            }
            Err(e) => {
                tracing::debug!(error = %e, "Presented access token rejected");
                return Err(AuthError::unauthorized(format!(
                    "a valid access token is required: {e}"
                )));
            }
        };

        ClaimValidator::new(self.config.claims.unknown_operator)
            .with(ClaimAssertion::lazy("exp", Operator::Gt, || {
                Value::from(unix_now())
            }))
            .with(ClaimAssertion::new(
                "iss",
                Operator::Eq,
                Value::from(self.config.issuer.as_str()),
            ))
            .with(ClaimAssertion::new("me", Operator::Eq, Value::from(me)))
            .validate(&claims)?;

        let jti = jwt::claim_str(&claims, "jti")
            .ok_or_else(|| AuthError::unauthorized("access token has no jti"))?;
        let revoked = self.access_tokens.is_revoked(jti).await.map_err(|e| {
            tracing::warn!(jti = %jti, error = %e, "Access token status lookup failed");
            AuthError::callback("is_access_token_revoked", e)
        })?;
        if revoked {
            tracing::warn!(jti = %jti, "Revoked access token presented for rotation");
            return Err(AuthError::unauthorized("access token was revoked"));
        }

        Ok(())
    }
}

impl std::fmt::Debug for RefreshRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshRotation")
            .field("issuer", &self.config.issuer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::storage::InMemoryStorage;
    use crate::token::jwt::{SignOptions, SigningKeyPair};
    use crate::token::search::TokenSearch;
    use crate::types::RefreshTokenRecord;

    const ISSUER: &str = "https://auth.example.com/";
    const ME: &str = "https://example.com/";

    struct Fixture {
        keys: Arc<SigningKeySet>,
        storage: Arc<InMemoryStorage>,
        rotation: RefreshRotation,
    }

    fn fixture_with(storage: InMemoryStorage) -> Fixture {
        let config = Arc::new(AuthConfig {
            issuer: ISSUER.to_string(),
            me: ME.to_string(),
            ..Default::default()
        });
        let keys = Arc::new(SigningKeySet::single(SigningKeyPair::generate_ec().unwrap()));
        let storage = Arc::new(storage);
        let search = TokenSearch::new(ISSUER, keys.clone(), storage.clone());
        let revocation = RevocationService::new(ME, search, storage.clone(), storage.clone());
        let rotation = RefreshRotation::new(
            config,
            keys.clone(),
            keys.clone(),
            storage.clone(),
            storage.clone(),
            storage.clone(),
            revocation,
        );
        Fixture {
            keys,
            storage,
            rotation,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(InMemoryStorage::new())
    }

    fn record(token: &str, scope: &str) -> RefreshTokenRecord {
        RefreshTokenRecord {
            client_id: "https://app.example.com/".to_string(),
            refresh_token: token.to_string(),
            me: Some(ME.to_string()),
            redirect_uri: "https://app.example.com/callback".to_string(),
            scope: Some(scope.to_string()),
            exp: unix_now() + 3600,
            revoked: false,
            revocation_reason: None,
            created_at: unix_now(),
        }
    }

    fn access_token(keys: &SigningKeySet, me: &str) -> String {
        jwt::sign(
            &SignOptions::new(ISSUER, me, "create", Duration::from_secs(900)),
            keys,
        )
        .unwrap()
        .token
    }

    fn grant(f: &Fixture, scope: Option<&str>) -> RefreshGrant {
        RefreshGrant {
            refresh_token: "old-refresh".to_string(),
            scope: scope.map(str::to_string),
            access_token: Some(access_token(&f.keys, ME)),
        }
    }

    #[tokio::test]
    async fn test_rotation_replaces_both_tokens() {
        let f = fixture();
        f.storage.insert_refresh_token(record("old-refresh", "create"));
        let grant = grant(&f, Some("create"));
        let old_jti = jwt::claim_str(&jwt::decode(grant.access_token.as_deref().unwrap()).unwrap(), "jti")
            .unwrap()
            .to_string();

        let issued = f.rotation.rotate(&grant).await.unwrap();

        let old = f.storage.refresh_token("old-refresh").unwrap();
        assert!(old.revoked);
        assert_eq!(old.revocation_reason.as_deref(), Some(REFRESHED));
        assert!(f.storage.access_token(&old_jti).unwrap().revoked);

        assert_eq!(issued.scope, "create");
        assert_eq!(issued.me, ME);
        assert_eq!(issued.client_id, "https://app.example.com/");
        assert_ne!(issued.refresh_token, "old-refresh");
        assert_eq!(f.storage.issued().await.len(), 1);
    }

    #[tokio::test]
    async fn test_rotated_token_cannot_be_reused() {
        let f = fixture();
        f.storage.insert_refresh_token(record("old-refresh", "create"));

        f.rotation.rotate(&grant(&f, None)).await.unwrap();
        let err = f.rotation.rotate(&grant(&f, None)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidGrant { .. }));
        assert!(err.description().contains(REFRESHED));
    }

    #[tokio::test]
    async fn test_scope_change_is_rejected_without_side_effects() {
        let f = fixture();
        f.storage.insert_refresh_token(record("old-refresh", "create update"));

        let err = f.rotation.rotate(&grant(&f, Some("create"))).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_request");
        assert_eq!(f.storage.revoke_calls(), 0);
        assert!(f.storage.issued().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_expired_and_incomplete_records() {
        let f = fixture();
        let err = f.rotation.rotate(&grant(&f, None)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidGrant { .. }));

        let mut expired = record("old-refresh", "create");
        expired.exp = unix_now() - 1;
        f.storage.insert_refresh_token(expired);
        let err = f.rotation.rotate(&grant(&f, None)).await.unwrap_err();
        assert!(err.description().contains("expired"));

        let mut incomplete = record("old-refresh", "create");
        incomplete.me = None;
        f.storage.insert_refresh_token(incomplete);
        let err = f.rotation.rotate(&grant(&f, None)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_access_token_is_required_and_checked() {
        let f = fixture();
        f.storage.insert_refresh_token(record("old-refresh", "create"));

        let mut missing = grant(&f, None);
        missing.access_token = None;
        let err = f.rotation.rotate(&missing).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized { .. }));

        let mut foreign = grant(&f, None);
        foreign.access_token = Some(access_token(&f.keys, "https://other.example/"));
        let err = f.rotation.rotate(&foreign).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized { .. }));

        let mut garbage = grant(&f, None);
        garbage.access_token = Some("garbage".to_string());
        let err = f.rotation.rotate(&garbage).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);

        assert_eq!(f.storage.revoke_calls(), 0);
    }

    #[tokio::test]
    async fn test_revoke_failure_aborts_rotation() {
        let f = fixture_with(InMemoryStorage::new().failing("revoke_refresh_token"));
        f.storage.insert_refresh_token(record("old-refresh", "create"));

        let err = f.rotation.rotate(&grant(&f, None)).await.unwrap_err();
        assert!(err.is_server_error());
        assert!(f.storage.issued().await.is_empty());
    }

    #[tokio::test]
    async fn test_revoked_access_token_cannot_rotate() {
        let f = fixture();
        f.storage.insert_refresh_token(record("old-refresh", "create"));
        let grant = grant(&f, None);
        let token = grant.access_token.as_deref().unwrap();
        let jti = jwt::claim_str(&jwt::decode(token).unwrap(), "jti")
            .unwrap()
            .to_string();
        AccessTokenStorage::revoke(f.storage.as_ref(), &jti, Some("logout"))
            .await
            .unwrap();

        let err = f.rotation.rotate(&grant).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized { .. }));
        assert!(!f.storage.refresh_token("old-refresh").unwrap().revoked);
        assert!(f.storage.issued().await.is_empty());
    }

    #[tokio::test]
    async fn test_access_token_status_failure_is_server_error() {
        let f = fixture_with(InMemoryStorage::new().failing("is_access_token_revoked"));
        f.storage.insert_refresh_token(record("old-refresh", "create"));

        let err = f.rotation.rotate(&grant(&f, None)).await.unwrap_err();
        assert!(
            err.description()
                .starts_with("the user-provided function is_access_token_revoked threw")
        );
        assert_eq!(f.storage.revoke_calls(), 0);
    }

    #[tokio::test]
    async fn test_access_token_revoke_failure_aborts_rotation() {
        let f = fixture_with(InMemoryStorage::new().failing("revoke_access_token"));
        f.storage.insert_refresh_token(record("old-refresh", "create"));

        let err = f.rotation.rotate(&grant(&f, None)).await.unwrap_err();
        assert!(err.is_server_error());
        assert!(f.storage.issued().await.is_empty());

        // The refresh token is revoked first and stays revoked.
        let old = f.storage.refresh_token("old-refresh").unwrap();
        assert!(old.revoked);
        assert_eq!(old.revocation_reason.as_deref(), Some(REFRESHED));
    }

    #[tokio::test]
    async fn test_persist_failure_is_server_error() {
        let f = fixture_with(InMemoryStorage::new().failing("on_issued_tokens"));
        f.storage.insert_refresh_token(record("old-refresh", "create"));

        let err = f.rotation.rotate(&grant(&f, None)).await.unwrap_err();
        assert!(
            err.description()
                .starts_with("the user-provided function on_issued_tokens threw")
        );
    }
}
