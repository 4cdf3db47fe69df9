//! Token introspection endpoint handler (RFC 7662).
//!
//! # Request Format
//!
//! ```text
//! POST /introspect
//! Content-Type: application/x-www-form-urlencoded
//!
//! token=<token>&token_type_hint=access_token
//! ```
//!
//! # Response
//!
//! Always 200 with `{"active": ...}`. Unknown, malformed and forged tokens
//! are reported as `{"active": false}`.

use axum::{Json, extract::State};

use super::AuthState;
use super::body::FormOrJson;
use super::error::ErrorResponse;
use crate::token::introspection::{IntrospectionRequest, IntrospectionResponse};

/// Handler for `POST /introspect`.
///
/// # Errors
///
/// Returns an OAuth error body if the body is malformed or a storage call
/// fails.
pub async fn introspect_handler(
    State(state): State<AuthState>,
    FormOrJson(request): FormOrJson<IntrospectionRequest>,
) -> Result<Json<IntrospectionResponse>, ErrorResponse> {
    state
        .introspection
        .introspect(&request)
        .await
        .map(Json)
        .map_err(|e| state.reject(e))
}
