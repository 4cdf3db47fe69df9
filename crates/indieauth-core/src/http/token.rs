//! Token endpoint handler.
//!
//! # Request Format
//!
//! ```text
//! POST /token
//! Content-Type: application/x-www-form-urlencoded
//!
//! grant_type=authorization_code&code=...&code_verifier=...
//!     &client_id=...&redirect_uri=...
//! ```
//!
//! A refresh grant must also present the current access token:
//!
//! ```text
//! POST /token
//! Authorization: Bearer <access_token>
//!
//! grant_type=refresh_token&refresh_token=...&scope=create
//! ```

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, info};

use super::AuthState;
use super::body::FormOrJson;
use super::error::ErrorResponse;
use crate::oauth::token::{TokenRequest, TokenResponse};

/// Handler for `POST /token`.
///
/// # Errors
///
/// Returns an OAuth error body if validation, redemption or rotation
/// fails.
pub async fn token_handler(
    State(state): State<AuthState>,
    headers: HeaderMap,
    FormOrJson(request): FormOrJson<TokenRequest>,
) -> Result<Response, ErrorResponse> {
    debug!(grant_type = ?request.grant_type, "Token request received");

    let grant = request
        .into_grant(bearer_token(&headers))
        .map_err(|e| state.reject(e))?;

    let response = state.tokens.token(grant).await.map_err(|e| state.reject(e))?;

    info!(scope = %response.scope, "Token response sent");
    Ok(token_success_response(response))
}

/// Extracts the token from `Authorization: Bearer <token>`.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
}

fn token_success_response(response: TokenResponse) -> Response {
    (
        StatusCode::OK,
        [
            (header::CACHE_CONTROL, "no-store"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(response),
    )
        .into_response()
}
