//! Access/refresh token pair issuance.

use std::time::Duration;

use super::jwt::{self, SignOptions, SigningKeySet, claim_str};
use super::refresh;
use crate::AuthResult;
use crate::error::AuthError;
use crate::types::IssuedTokens;

/// What a new token pair is bound to.
#[derive(Debug, Clone)]
pub struct IssuanceRequest {
    pub access_token_expiration: Duration,
    pub client_id: String,
    pub issuer: String,
    pub me: String,
    pub redirect_uri: String,
    pub refresh_token_expiration: Duration,
    pub scope: String,
}

/// Mints an access token and a refresh token for `request`.
///
/// The `jti` in the returned bundle is read back from the signed token.
/// Either both tokens are returned or neither is.
///
/// # Errors
///
/// Returns `AuthError::ServerError` if signing fails or the signed token
/// cannot be read back.
pub fn tokens_plus_info(
    request: &IssuanceRequest,
    keys: &SigningKeySet,
) -> AuthResult<IssuedTokens> {
    let signed = jwt::sign(
        &SignOptions::new(
            &request.issuer,
            &request.me,
            &request.scope,
            request.access_token_expiration,
        ),
        keys,
    )
    .map_err(|e| AuthError::server_error(format!("could not sign access token: {e}")))?;

    let claims = jwt::decode(&signed.token)
        .map_err(|e| AuthError::server_error(format!("could not decode access token: {e}")))?;
    let jti = claim_str(&claims, "jti")
        .ok_or_else(|| AuthError::server_error("signed access token has no jti"))?
        .to_string();

    let refresh = refresh::generate(request.refresh_token_expiration);

    tracing::debug!(
        jti = %jti,
        kid = %signed.kid,
        client_id = %request.client_id,
        "Issued token pair"
    );

    Ok(IssuedTokens {
        access_token: signed.token,
        access_token_expires_in: signed.claims.exp - signed.claims.iat,
        client_id: request.client_id.clone(),
        issuer: request.issuer.clone(),
        jti,
        kid: signed.kid,
        me: request.me.clone(),
        redirect_uri: request.redirect_uri.clone(),
        refresh_token: refresh.refresh_token,
        refresh_token_expires_at: refresh.exp,
        scope: request.scope.clone(),
    })
}
