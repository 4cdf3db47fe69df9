//! Token endpoint service.
//!
//! Turns a validated [`Grant`] into a [`TokenResponse`]:
//!
//! - `authorization_code` - redeem the code, issue a pair, persist it
//! - `refresh_token` - rotate through [`RefreshRotation`]
//!
//! # Usage
//!
//! ```ignore
//! use indieauth_core::token::TokenService;
//!
//! let service = TokenService::new(config, keys, jwks, &storage);
//! let response = service.token(request.into_grant(bearer)?).await?;
//! ```

use std::sync::Arc;

use super::issuance::{IssuanceRequest, tokens_plus_info};
use super::jwks::JwksSource;
use super::jwt::SigningKeySet;
use super::revocation::RevocationService;
use super::rotation::{RefreshGrant, RefreshRotation};
use super::search::TokenSearch;
use crate::AuthResult;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::oauth::code::{CodeRedemption, CodeService, release_profile};
use crate::oauth::token::{Grant, TokenResponse};
use crate::storage::{IssuedTokenStorage, Storage, UserProfileStorage};

/// Issues tokens for the token endpoint.
#[derive(Clone)]
pub struct TokenService {
    config: Arc<AuthConfig>,
    keys: Arc<SigningKeySet>,
    codes: CodeService,
    rotation: RefreshRotation,
    issued: Arc<dyn IssuedTokenStorage>,
    profiles: Arc<dyn UserProfileStorage>,
}

impl TokenService {
    /// Creates a token service.
    ///
    /// # Arguments
    ///
    /// * `config` - Issuer, profile URL and token lifetimes
    /// * `keys` - Private keys access tokens are signed with
    /// * `jwks` - Key set presented access tokens are verified against
    /// * `storage` - Storage capabilities
    #[must_use]
    pub fn new(
        config: Arc<AuthConfig>,
        keys: Arc<SigningKeySet>,
        jwks: Arc<dyn JwksSource>,
        storage: &Storage,
    ) -> Self {
        let codes = CodeService::new(
            config.issuer.clone(),
            config.token.authorization_code_lifetime,
            storage.codes.clone(),
        );
        let revocation = RevocationService::new(
            config.me.clone(),
            TokenSearch::new(
                config.issuer.clone(),
                jwks.clone(),
                storage.refresh_tokens.clone(),
            ),
            storage.access_tokens.clone(),
            storage.refresh_tokens.clone(),
        );
        let rotation = RefreshRotation::new(
            config.clone(),
            keys.clone(),
            jwks,
            storage.access_tokens.clone(),
            storage.refresh_tokens.clone(),
            storage.issued.clone(),
            revocation,
        );

        Self {
            config,
            keys,
            codes,
            rotation,
            issued: storage.issued.clone(),
            profiles: storage.profiles.clone(),
        }
    }

    /// Handles a validated token request.
    ///
    /// # Errors
    ///
    /// See [`exchange_code`](Self::exchange_code) and
    /// [`refresh`](Self::refresh).
    pub async fn token(&self, grant: Grant) -> AuthResult<TokenResponse> {
        match grant {
            Grant::AuthorizationCode(redemption) => self.exchange_code(&redemption).await,
            Grant::RefreshToken(grant) => self.refresh(&grant).await,
        }
    }

    /// Exchanges an authorization code for an access/refresh pair.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidGrant` if the code cannot be redeemed
    /// - `AuthError::Configuration` if the stored PKCE method is unsupported
    /// - `AuthError::ServerError` if signing or a storage call fails
    pub async fn exchange_code(&self, redemption: &CodeRedemption) -> AuthResult<TokenResponse> {
        // 1. Redeem the code
        let code = self.codes.redeem(redemption).await?;

        // 2. Issue a pair bound to what the user approved
        let issued = tokens_plus_info(
            &IssuanceRequest {
                access_token_expiration: self.config.token.access_token_lifetime,
                client_id: code.client_id.clone(),
                issuer: self.config.issuer.clone(),
                me: code.me.clone(),
                redirect_uri: code.redirect_uri.clone(),
                refresh_token_expiration: self.config.token.refresh_token_lifetime,
                scope: code.scope.clone(),
            },
            &self.keys,
        )?;

        // 3. Persist
        self.issued.on_issued_tokens(&issued).await.map_err(|e| {
            tracing::error!(jti = %issued.jti, error = %e, "Failed to persist issued tokens");
            AuthError::callback("on_issued_tokens", e)
        })?;

        // 4. Profile, if granted
        let profile = release_profile(self.profiles.as_ref(), &issued.me, &issued.scope).await?;

        tracing::info!(
            jti = %issued.jti,
            client_id = %issued.client_id,
            grant_type = "authorization_code",
            "Tokens issued"
        );

        Ok(TokenResponse::new(issued).with_profile(profile))
    }

    /// Rotates a refresh token.
    ///
    /// # Errors
    ///
    /// See [`RefreshRotation::rotate`].
    pub async fn refresh(&self, grant: &RefreshGrant) -> AuthResult<TokenResponse> {
        let issued = self.rotation.rotate(grant).await?;
        let profile = release_profile(self.profiles.as_ref(), &issued.me, &issued.scope).await?;
        Ok(TokenResponse::new(issued).with_profile(profile))
    }

    /// The code service used for redemption.
    #[must_use]
    pub fn codes(&self) -> &CodeService {
        &self.codes
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.config.issuer)
            .field("codes", &self.codes)
            .finish_non_exhaustive()
    }
}
