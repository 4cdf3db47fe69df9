//! # indieauth-core
//!
//! Token lifecycle engine for an IndieAuth authorization server.
//!
//! This crate provides:
//! - PKCE-bound authorization code redemption
//! - Signed JWT access tokens verified against a JSON Web Key Set
//! - Opaque refresh tokens with rotation
//! - Token introspection (RFC 7662) and revocation (RFC 7009)
//! - Axum handlers for `/auth`, `/token`, `/introspect`, `/revoke` and `/jwks`
//!
//! ## Overview
//!
//! Durable state is owned by the hosting application and reached only
//! through the traits in [`storage`]. Services return [`AuthResult`], which
//! the [`http`] layer turns into OAuth 2.0 responses.
//!
//! ## Modules
//!
//! - [`config`] - Issuer, lifetimes, key set and claim policy configuration
//! - [`oauth`] - PKCE, authorization codes and token endpoint requests
//! - [`token`] - JWT codec, refresh tokens, search, rotation, introspection
//!   and revocation
//! - [`storage`] - Storage traits and an in-memory backend
//! - [`types`] - Records exchanged with storage
//! - [`http`] - Axum HTTP handlers

pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod storage;
pub mod token;
pub mod types;

pub use config::{AuthConfig, ConfigError, UnknownOperatorPolicy};
pub use error::{AuthError, ErrorCategory};
pub use http::{AuthState, router};
pub use oauth::{CodeRedemption, CodeService, Grant, PkceChallengeMethod, TokenRequest};
pub use storage::{
    AccessTokenStorage, AuthorizationCodeStorage, InMemoryStorage, IssuedTokenStorage,
    RefreshTokenStorage, Storage, StorageError, UserProfileStorage,
};
pub use token::{
    IntrospectionService, JwksSource, RevocationService, SigningKeyPair, SigningKeySet,
    TokenService,
};
pub use types::{
    AccessTokenRecord, AuthorizationCode, IssuedTokens, RefreshTokenRecord, UserProfile,
};

/// Type alias for token lifecycle results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use indieauth_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::http::{AuthState, ErrorBody, router};
    pub use crate::storage::{
        AccessTokenStorage, AuthorizationCodeStorage, InMemoryStorage, IssuedTokenStorage,
        RefreshTokenStorage, Storage, StorageError, UserProfileStorage,
    };
    pub use crate::token::{
        IntrospectionResponse, JwksSource, RemoteJwks, Revocation, SigningKeyPair,
        SigningKeySet, TokenService, TokenTypeHint,
    };
    pub use crate::types::{
        AccessTokenRecord, AuthorizationCode, IssuedTokens, RefreshTokenRecord, UserProfile,
    };
}
