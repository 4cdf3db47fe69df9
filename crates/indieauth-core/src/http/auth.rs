//! Authorization endpoint redemption handler.
//!
//! A client that only needs to learn who the user is (IndieAuth
//! authentication) redeems its code here instead of at the token endpoint.
//!
//! # Request Format
//!
//! ```text
//! POST /auth
//! Content-Type: application/x-www-form-urlencoded
//!
//! grant_type=authorization_code&code=...&code_verifier=...
//!     &client_id=...&redirect_uri=...
//! ```
//!
//! # Response
//!
//! ```json
//! { "me": "https://example.com/", "profile": { "name": "Example" } }
//! ```

use axum::{Json, extract::State};

use super::AuthState;
use super::body::FormOrJson;
use super::error::ErrorResponse;
use crate::oauth::code::{Redemption, RedemptionKind, release_profile};
use crate::oauth::token::RedemptionRequest;

/// Handler for `POST /auth`.
///
/// # Errors
///
/// Returns an OAuth error body if the request is malformed or the code
/// cannot be redeemed.
pub async fn auth_handler(
    State(state): State<AuthState>,
    FormOrJson(request): FormOrJson<RedemptionRequest>,
) -> Result<Json<Redemption>, ErrorResponse> {
    let redemption = request.into_redemption().map_err(|e| state.reject(e))?;

    let code = state
        .tokens
        .codes()
        .redeem(&redemption)
        .await
        .map_err(|e| state.reject(e))?;

    let profile = release_profile(state.profiles.as_ref(), &code.me, &code.scope)
        .await
        .map_err(|e| state.reject(e))?;

    let kind = RedemptionKind::for_scope(&code.scope);
    tracing::info!(
        client_id = %code.client_id,
        kind = ?kind,
        "Authorization code redeemed at authorization endpoint"
    );

    Ok(Json(Redemption::new(&code, kind).with_profile(profile)))
}
