//! JWKS endpoint handler.
//!
//! Publishes the public half of the signing keys so resource servers can
//! verify access tokens.
//!
//! # References
//!
//! - [RFC 7517 - JSON Web Key](https://tools.ietf.org/html/rfc7517)

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use super::AuthState;

/// Handler for `GET /jwks`.
///
/// Cacheable for one hour.
///
/// # Example Response
///
/// ```json
/// {
///   "keys": [
///     {
///       "kty": "EC",
///       "kid": "3f0c...",
///       "use": "sig",
///       "alg": "ES384",
///       "crv": "P-384",
///       "x": "...",
///       "y": "..."
///     }
///   ]
/// }
/// ```
pub async fn jwks_handler(State(state): State<AuthState>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "public, max-age=3600")],
        Json(state.keys.jwks()),
    )
}
