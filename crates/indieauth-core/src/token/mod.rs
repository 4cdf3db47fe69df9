//! Token generation, validation, and management.
//!
//! This module provides:
//!
//! - JWT access token signing and verification ([`jwt`], [`jwks`])
//! - Opaque refresh tokens ([`refresh`])
//! - The claim validator chain ([`claims`])
//! - Pair issuance ([`issuance`]) and refresh rotation ([`rotation`])
//! - Token introspection (RFC 7662) and revocation (RFC 7009), both built
//!   on a shared two-family lookup ([`search`])

pub mod claims;
pub mod introspection;
pub mod issuance;
pub mod jwks;
pub mod jwt;
pub mod refresh;
pub mod revocation;
pub mod rotation;
pub mod search;
pub mod service;

pub use claims::{ClaimAssertion, ClaimError, ClaimValidator, Operator};
pub use introspection::{IntrospectionRequest, IntrospectionResponse, IntrospectionService};
pub use issuance::{IssuanceRequest, tokens_plus_info};
pub use jwks::{JwksError, JwksSource, RemoteJwks, StaticJwks};
pub use jwt::{
    AccessTokenClaims, Claims, Jwk, Jwks, JwtError, SignOptions, SigningAlgorithm, SigningKeyPair,
    SigningKeySet,
};
pub use revocation::{
    RequestContext, Revocation, RevocationOutcome, RevocationRequest, RevocationService,
};
pub use rotation::{RefreshGrant, RefreshRotation};
pub use search::{FoundToken, TokenSearch, TokenSearchResult, TokenTypeHint};
pub use service::TokenService;
