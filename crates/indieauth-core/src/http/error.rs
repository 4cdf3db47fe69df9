//! OAuth 2.0 error responses.
//!
//! Every endpoint reports failures with the same body:
//!
//! ```json
//! {
//!   "error": "invalid_grant",
//!   "error_description": "The authorization code has already been used"
//! }
//! ```
//!
//! `error_description` is only emitted when the server is configured with
//! `include_error_description = true`; otherwise the key is omitted.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Serialized OAuth 2.0 error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// OAuth 2.0 error code.
    pub error: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,

    /// Echoed `state` for errors raised during authorization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// An [`AuthError`] ready to be sent to the client.
#[derive(Debug)]
pub struct ErrorResponse {
    error: AuthError,
    include_description: bool,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(error: AuthError, include_description: bool) -> Self {
        Self {
            error,
            include_description,
        }
    }

    /// The wrapped error.
    #[must_use]
    pub fn error(&self) -> &AuthError {
        &self.error
    }

    /// Builds the body sent to the client.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.error.oauth_error_code().to_string(),
            error_description: self
                .include_description
                .then(|| self.error.description().to_string()),
            error_uri: None,
            state: None,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.error.status_code();

        if self.error.is_server_error() {
            tracing::error!(
                category = %self.error.category(),
                error = %self.error,
                "Request failed"
            );
        } else {
            tracing::debug!(
                category = %self.error.category(),
                error_code = self.error.oauth_error_code(),
                "Request rejected"
            );
        }

        let mut response = (
            status,
            [
                (header::CACHE_CONTROL, "no-store"),
                (header::PRAGMA, "no-cache"),
            ],
            Json(self.body()),
        )
            .into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}
