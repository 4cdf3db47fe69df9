//! Token revocation endpoint handler (RFC 7009).
//!
//! # Request Format
//!
//! ```text
//! POST /revoke
//! Content-Type: application/x-www-form-urlencoded
//!
//! token=<token>&token_type_hint=refresh_token&revocation_reason=logout
//! ```
//!
//! # Response
//!
//! 200 with `{"message": "..."}` whether or not anything was revoked, so
//! token existence is not disclosed. Only a malformed body or a token owned
//! by a different `me` is rejected.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use super::AuthState;
use super::body::FormOrJson;
use super::error::ErrorResponse;
use crate::token::revocation::RevocationRequest;

/// Body returned by the revocation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationMessage {
    pub message: String,
}

/// Handler for `POST /revoke`.
///
/// # Errors
///
/// Returns an OAuth error body on ownership mismatch, malformed body or a
/// failing storage call.
pub async fn revoke_handler(
    State(state): State<AuthState>,
    FormOrJson(request): FormOrJson<RevocationRequest>,
) -> Result<Json<RevocationMessage>, ErrorResponse> {
    let revocation = state.revocation.revoke(&request).await.map_err(|e| {
        tracing::warn!(error = %e, "Revocation failed");
        state.reject(e)
    })?;

    tracing::info!(
        outcome = ?revocation.outcome,
        token_type = ?revocation.context.token_type,
        jti = ?revocation.context.jti(),
        "Revocation request handled"
    );

    Ok(Json(RevocationMessage {
        message: revocation.message(),
    }))
}
