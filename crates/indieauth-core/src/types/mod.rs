//! Records exchanged with storage.
//!
//! ## Domain Types
//!
//! - [`AuthorizationCode`] - Single-use, PKCE-bound authorization code
//! - [`AccessTokenRecord`] - Storage companion of a JWT access token
//! - [`RefreshTokenRecord`] - Opaque refresh token
//! - [`IssuedTokens`] - Freshly minted access/refresh pair
//! - [`UserProfile`] - Profile released for the `profile` scope
//!
//! All timestamps are unix seconds.

pub mod access_token;
pub mod authorization_code;
pub mod issued;
pub mod profile;
pub mod refresh_token;

pub use access_token::AccessTokenRecord;
pub use authorization_code::AuthorizationCode;
pub use issued::IssuedTokens;
pub use profile::UserProfile;
pub use refresh_token::RefreshTokenRecord;

/// Current time in unix seconds.
#[must_use]
pub fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
