//! HTTP surface for the token lifecycle.
//!
//! # Available Handlers
//!
//! - [`auth`] - Authorization code redemption for profile URL exchanges
//! - [`token`] - Token endpoint (`authorization_code`, `refresh_token`)
//! - [`introspect`] - Token introspection (RFC 7662)
//! - [`revoke`] - Token revocation (RFC 7009)
//! - [`jwks`] - Public key set
//!
//! # Usage
//!
//! ```ignore
//! use indieauth_core::http::{AuthState, router};
//!
//! let state = AuthState::from_config(config, keys, storage)?;
//! let app = axum::Router::new().nest("/indieauth", router(state));
//! ```

pub mod auth;
pub mod body;
pub mod error;
pub mod introspect;
pub mod jwks;
pub mod revoke;
pub mod token;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use url::Url;

use crate::AuthResult;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::storage::{Storage, UserProfileStorage};
use crate::token::introspection::IntrospectionService;
use crate::token::jwks::{JwksSource, RemoteJwks};
use crate::token::jwt::SigningKeySet;
use crate::token::revocation::RevocationService;
use crate::token::search::TokenSearch;
use crate::token::service::TokenService;

pub use auth::auth_handler;
pub use body::FormOrJson;
pub use error::{ErrorBody, ErrorResponse};
pub use introspect::introspect_handler;
pub use jwks::jwks_handler;
pub use revoke::{RevocationMessage, revoke_handler};
pub use token::token_handler;

// =============================================================================
// State
// =============================================================================

/// Shared state for every endpoint.
#[derive(Clone)]
pub struct AuthState {
    pub config: Arc<AuthConfig>,
    pub keys: Arc<SigningKeySet>,
    pub tokens: TokenService,
    pub revocation: RevocationService,
    pub introspection: IntrospectionService,
    pub profiles: Arc<dyn UserProfileStorage>,
}

impl AuthState {
    /// Creates the state.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `keys` - Private signing keys
    /// * `jwks` - Key set presented access tokens are verified against
    /// * `storage` - Storage capabilities
    #[must_use]
    pub fn new(
        config: Arc<AuthConfig>,
        keys: Arc<SigningKeySet>,
        jwks: Arc<dyn JwksSource>,
        storage: &Storage,
    ) -> Self {
        let search = TokenSearch::new(
            config.issuer.clone(),
            jwks.clone(),
            storage.refresh_tokens.clone(),
        );
        let revocation = RevocationService::new(
            config.me.clone(),
            search.clone(),
            storage.access_tokens.clone(),
            storage.refresh_tokens.clone(),
        );
        let introspection = IntrospectionService::new(
            search,
            storage.access_tokens.clone(),
            storage.refresh_tokens.clone(),
        );
        let tokens = TokenService::new(config.clone(), keys.clone(), jwks, storage);

        Self {
            config,
            keys,
            tokens,
            revocation,
            introspection,
            profiles: storage.profiles.clone(),
        }
    }

    /// Creates the state, verifying against `jwks_url` when configured and
    /// against the local signing keys otherwise.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if `jwks_url` is not a usable URL.
    pub fn from_config(
        config: AuthConfig,
        keys: SigningKeySet,
        storage: &Storage,
    ) -> AuthResult<Self> {
        let keys = Arc::new(keys);
        let jwks: Arc<dyn JwksSource> = match config.jwks_url.as_deref() {
            Some(jwks_url) => {
                let url = Url::parse(jwks_url).map_err(|e| {
                    AuthError::configuration(format!("invalid jwks_url '{jwks_url}': {e}"))
                })?;
                Arc::new(
                    RemoteJwks::new(url, config.jwks.clone())
                        .map_err(|e| AuthError::configuration(e.to_string()))?,
                )
            }
            None => keys.clone(),
        };

        Ok(Self::new(Arc::new(config), keys, jwks, storage))
    }

    /// Wraps `error` for the client, honouring `include_error_description`.
    #[must_use]
    pub fn reject(&self, error: AuthError) -> ErrorResponse {
        ErrorResponse::new(error, self.config.include_error_description)
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("issuer", &self.config.issuer)
            .field("me", &self.config.me)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Router
// =============================================================================

/// Builds the router serving every endpoint.
///
/// | Method | Path          | Handler                  |
/// |--------|---------------|--------------------------|
/// | POST   | `/auth`       | [`auth_handler`]         |
/// | POST   | `/token`      | [`token_handler`]        |
/// | POST   | `/introspect` | [`introspect_handler`]   |
/// | POST   | `/revoke`     | [`revoke_handler`]       |
/// | GET    | `/jwks`       | [`jwks_handler`]         |
///
/// Requests are traced with `tower-http`'s [`TraceLayer`].
pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/auth", post(auth_handler))
        .route("/token", post(token_handler))
        .route("/introspect", post(introspect_handler))
        .route("/revoke", post(revoke_handler))
        .route("/jwks", get(jwks_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
