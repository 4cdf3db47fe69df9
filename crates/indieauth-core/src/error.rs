//! Token lifecycle error types.
//!
//! Every service in this crate reports failures through [`AuthError`], whose
//! variants map one-to-one onto the OAuth 2.0 error codes returned by the
//! HTTP layer. Component-level errors (`PkceError`, `JwtError`, ...) are
//! converted into it at the service boundary.

use std::fmt;

use axum::http::StatusCode;

/// Errors that can occur while issuing, verifying, rotating, introspecting
/// or revoking credentials.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The request is missing a parameter, has an invalid value, or the
    /// presented credential belongs to someone else.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// The authorization code or refresh token is invalid, expired, used or
    /// revoked.
    #[error("Invalid grant: {message}")]
    InvalidGrant {
        /// Description of why the grant is invalid.
        message: String,
    },

    /// The access token is invalid, malformed or cannot be verified.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The request lacks a valid bearer credential or a claim check failed.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Description of why the request is unauthorized.
        message: String,
    },

    /// The token endpoint does not support the requested grant type.
    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType {
        /// The unsupported grant type.
        grant_type: String,
    },

    /// A storage callback failed or another unexpected condition occurred.
    #[error("Server error: {message}")]
    ServerError {
        /// Description of the failure.
        message: String,
    },

    /// The server is misconfigured (e.g. a stored PKCE method it cannot
    /// evaluate). Never retried.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidGrant` error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedGrantType` error.
    #[must_use]
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType {
            grant_type: grant_type.into(),
        }
    }

    /// Creates a new `ServerError`.
    #[must_use]
    pub fn server_error(message: impl Into<String>) -> Self {
        Self::ServerError {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wraps a failure raised by an injected storage callback.
    ///
    /// The resulting message names the callback so operators can tell which
    /// integration point misbehaved.
    #[must_use]
    pub fn callback(name: &str, error: impl fmt::Display) -> Self {
        Self::ServerError {
            message: format!("the user-provided function {name} threw: {error}"),
        }
    }

    /// Returns the human-readable description without the variant prefix.
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::InvalidRequest { message }
            | Self::InvalidGrant { message }
            | Self::InvalidToken { message }
            | Self::Unauthorized { message }
            | Self::ServerError { message }
            | Self::Configuration { message } => message,
            Self::UnsupportedGrantType { grant_type } => grant_type,
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ServerError { .. } | Self::Configuration { .. })
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRequest { .. } | Self::UnsupportedGrantType { .. } => {
                ErrorCategory::Validation
            }
            Self::InvalidGrant { .. } | Self::Unauthorized { .. } => {
                ErrorCategory::Authentication
            }
            Self::InvalidToken { .. } => ErrorCategory::Token,
            Self::ServerError { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
        }
    }

    /// Returns the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::InvalidGrant { .. } => "invalid_grant",
            Self::InvalidToken { .. } => "invalid_token",
            Self::Unauthorized { .. } => "unauthorized",
            Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
            Self::ServerError { .. } | Self::Configuration { .. } => "server_error",
        }
    }

    /// Returns the HTTP status code the error is reported with.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest { .. }
            | Self::InvalidGrant { .. }
            | Self::UnsupportedGrantType { .. } => StatusCode::BAD_REQUEST,
            Self::InvalidToken { .. } | Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::ServerError { .. } | Self::Configuration { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Categories of errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Credential verification failed.
    Authentication,
    /// Access token problems.
    Token,
    /// Request validation errors.
    Validation,
    /// Storage callback failures.
    Infrastructure,
    /// Server misconfiguration.
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Token => write!(f, "token"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}
