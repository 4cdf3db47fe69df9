//! IndieAuth authorization flow.
//!
//! - [`pkce`] - PKCE challenge computation and verification (RFC 7636)
//! - [`code`] - Authorization code issuance on consent and redemption
//! - [`token`] - Endpoint request/response types and ingress validation
//!
//! # Example
//!
//! ```ignore
//! use indieauth_core::oauth::{ApprovedRequest, CodeService, PkceVerifier};
//!
//! // Client generates PKCE verifier and challenge
//! let verifier = PkceVerifier::generate();
//! let challenge = compute_challenge(verifier.as_str(), PkceChallengeMethod::S256);
//!
//! // Server stores a code once the user approves
//! let redirect = code_service.approve(&approved).await?;
//! ```

pub mod code;
pub mod pkce;
pub mod token;

pub use code::{
    ApprovedRequest, CodeRedemption, CodeService, Redemption, RedemptionKind, includes_profile,
    release_profile,
};
pub use pkce::{PkceChallengeMethod, PkceError, PkceVerifier, compute_challenge};
pub use token::{Grant, RedemptionRequest, TokenRequest, TokenResponse, Violations};
