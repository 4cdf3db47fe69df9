//! Request body extraction.
//!
//! Endpoints accept `application/x-www-form-urlencoded` (the OAuth 2.0
//! default) and `application/json` bodies with the same field names.

use axum::{
    Form, Json,
    extract::{FromRequest, Request},
    http::header,
};
use serde::de::DeserializeOwned;

use super::AuthState;
use super::error::ErrorResponse;
use crate::error::AuthError;

/// Extracts `T` from a form or JSON body, chosen by `Content-Type`.
#[derive(Debug, Clone)]
pub struct FormOrJson<T>(pub T);

fn is_json(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| {
            let mime = mime.trim();
            mime == "application/json" || mime.ends_with("+json")
        })
}

impl<T> FromRequest<AuthState> for FormOrJson<T>
where
    T: DeserializeOwned + Send,
{
    type Rejection = ErrorResponse;

    async fn from_request(req: Request, state: &AuthState) -> Result<Self, Self::Rejection> {
        let parsed = if is_json(&req) {
            Json::<T>::from_request(req, state)
                .await
                .map(|Json(value)| value)
                .map_err(|e| e.body_text())
        } else {
            Form::<T>::from_request(req, state)
                .await
                .map(|Form(value)| value)
                .map_err(|e| e.body_text())
        };

        parsed.map(FormOrJson).map_err(|message| {
            tracing::debug!(error = %message, "Malformed request body");
            state.reject(AuthError::invalid_request(message))
        })
    }
}
