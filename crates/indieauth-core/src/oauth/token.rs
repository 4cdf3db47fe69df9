//! Token and authorization endpoint request/response types.
//!
//! Request bodies arrive as loosely typed structs (every field optional)
//! and are validated exactly once, at ingress, into the typed values the
//! services consume. All problems with a body are reported together in one
//! `invalid_request` error, joined by `; `.
//!
//! # Supported Grant Types
//!
//! - `authorization_code` - Exchange a PKCE-bound code for tokens
//! - `refresh_token` - Rotate a refresh token

use serde::{Deserialize, Serialize};

use super::code::CodeRedemption;
use super::pkce::PkceVerifier;
use crate::AuthResult;
use crate::error::AuthError;
use crate::token::rotation::RefreshGrant;
use crate::types::{IssuedTokens, UserProfile};

/// Accepted authorization code length.
const CODE_LENGTH: std::ops::RangeInclusive<usize> = 10..=128;

// =============================================================================
// Validation
// =============================================================================

/// Collects every problem with a request body before failing.
#[derive(Debug, Default)]
pub struct Violations(Vec<String>);

impl Violations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of a required, non-empty field.
    pub fn require(&mut self, field: &str, value: Option<String>) -> Option<String> {
        match value {
            Some(value) if !value.trim().is_empty() => Some(value),
            _ => {
                self.0.push(format!("{field} is required"));
                None
            }
        }
    }

    /// Records `message` unless `ok`.
    pub fn check(&mut self, ok: bool, message: impl Into<String>) {
        if !ok {
            self.0.push(message.into());
        }
    }

    /// Fails with every recorded problem.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` if anything was recorded.
    pub fn finish(self) -> AuthResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AuthError::invalid_request(self.0.join("; ")))
        }
    }
}

fn check_code(violations: &mut Violations, code: Option<&str>) {
    if let Some(code) = code {
        violations.check(
            CODE_LENGTH.contains(&code.len()),
            format!(
                "code must be between {} and {} characters",
                CODE_LENGTH.start(),
                CODE_LENGTH.end()
            ),
        );
    }
}

fn check_verifier(violations: &mut Violations, verifier: Option<&str>) {
    if let Some(verifier) = verifier
        && let Err(e) = PkceVerifier::new(verifier.to_string())
    {
        violations.check(false, format!("code_verifier: {e}"));
    }
}

fn check_url(violations: &mut Violations, field: &str, value: Option<&str>) {
    if let Some(value) = value {
        violations.check(
            url::Url::parse(value).is_ok(),
            format!("{field} must be an absolute URL"),
        );
    }
}

// =============================================================================
// Token Endpoint
// =============================================================================

/// Token endpoint request body.
///
/// Required fields depend on `grant_type`:
///
/// - `authorization_code`: code, code_verifier, client_id, redirect_uri
/// - `refresh_token`: refresh_token, (optional) scope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub grant_type: Option<String>,

    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub code_verifier: Option<String>,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub redirect_uri: Option<String>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub scope: Option<String>,
}

/// A validated token endpoint request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    AuthorizationCode(CodeRedemption),
    RefreshToken(RefreshGrant),
}

impl TokenRequest {
    /// Validates the body. `bearer` is the token from the `Authorization`
    /// header, needed by the refresh grant.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidRequest` listing every missing or malformed
    ///   field
    /// - `AuthError::UnsupportedGrantType` for any other grant
    pub fn into_grant(self, bearer: Option<String>) -> AuthResult<Grant> {
        let mut violations = Violations::new();
        let Some(grant_type) = violations.require("grant_type", self.grant_type) else {
            violations.finish()?;
            return Err(AuthError::invalid_request("grant_type is required"));
        };

        match grant_type.as_str() {
            "authorization_code" => {
                let code = violations.require("code", self.code);
                let code_verifier = violations.require("code_verifier", self.code_verifier);
                let client_id = violations.require("client_id", self.client_id);
                let redirect_uri = violations.require("redirect_uri", self.redirect_uri);
                check_code(&mut violations, code.as_deref());
                check_verifier(&mut violations, code_verifier.as_deref());
                check_url(&mut violations, "client_id", client_id.as_deref());
                check_url(&mut violations, "redirect_uri", redirect_uri.as_deref());
                violations.finish()?;

                match (code, code_verifier, client_id, redirect_uri) {
                    (Some(code), Some(code_verifier), Some(client_id), Some(redirect_uri)) => {
                        Ok(Grant::AuthorizationCode(CodeRedemption {
                            client_id,
                            code,
                            code_verifier,
                            redirect_uri,
                        }))
                    }
                    _ => Err(AuthError::invalid_request("incomplete authorization_code grant")),
                }
            }
            "refresh_token" => {
                let refresh_token = violations.require("refresh_token", self.refresh_token);
                violations.finish()?;

                let refresh_token = refresh_token
                    .ok_or_else(|| AuthError::invalid_request("refresh_token is required"))?;
                Ok(Grant::RefreshToken(RefreshGrant {
                    refresh_token,
                    scope: self.scope.filter(|s| !s.trim().is_empty()),
                    access_token: bearer,
                }))
            }
            other => Err(AuthError::unsupported_grant_type(other)),
        }
    }
}

/// Successful token response.
///
/// # Example Response
///
/// ```json
/// {
///   "access_token": "eyJhbG...",
///   "token_type": "Bearer",
///   "expires_in": 900,
///   "me": "https://example.com/",
///   "scope": "create update",
///   "refresh_token": "abc123..."
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The access token (JWT).
    pub access_token: String,

    /// Always `Bearer`.
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: i64,

    /// Profile URL of the user.
    pub me: String,

    /// Granted scopes (space-separated).
    pub scope: String,

    /// Opaque refresh token.
    pub refresh_token: String,

    /// Released when the `profile` scope was granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
}

impl TokenResponse {
    #[must_use]
    pub fn new(issued: IssuedTokens) -> Self {
        Self {
            access_token: issued.access_token,
            token_type: "Bearer".to_string(),
            expires_in: issued.access_token_expires_in,
            me: issued.me,
            scope: issued.scope,
            refresh_token: issued.refresh_token,
            profile: None,
        }
    }

    #[must_use]
    pub fn with_profile(mut self, profile: Option<UserProfile>) -> Self {
        self.profile = profile;
        self
    }
}

// =============================================================================
// Authorization Endpoint
// =============================================================================

/// Authorization endpoint redemption body (profile URL exchange).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedemptionRequest {
    #[serde(default)]
    pub grant_type: Option<String>,

    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub code_verifier: Option<String>,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub redirect_uri: Option<String>,
}

impl RedemptionRequest {
    /// Validates the body.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidRequest` listing every missing or malformed
    ///   field
    /// - `AuthError::UnsupportedGrantType` if `grant_type` is present and is
    ///   not `authorization_code`
    pub fn into_redemption(self) -> AuthResult<CodeRedemption> {
        if let Some(grant_type) = self.grant_type.as_deref()
            && grant_type != "authorization_code"
        {
            return Err(AuthError::unsupported_grant_type(grant_type));
        }

        TokenRequest {
            grant_type: Some("authorization_code".to_string()),
            code: self.code,
            code_verifier: self.code_verifier,
            client_id: self.client_id,
            redirect_uri: self.redirect_uri,
            ..Default::default()
        }
        .into_grant(None)
        .and_then(|grant| match grant {
            Grant::AuthorizationCode(redemption) => Ok(redemption),
            Grant::RefreshToken(_) => Err(AuthError::server_error("unexpected grant")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

    fn code_request() -> TokenRequest {
        TokenRequest {
            grant_type: Some("authorization_code".to_string()),
            code: Some("SplxlOBeZQQYbYS6WxSbIA".to_string()),
            code_verifier: Some(VERIFIER.to_string()),
            client_id: Some("https://app.example.com/".to_string()),
            redirect_uri: Some("https://app.example.com/callback".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_token_request_deserialization() {
        let json = r#"{
            "grant_type": "authorization_code",
            "code": "SplxlOBeZQQYbYS6WxSbIA",
            "redirect_uri": "https://app.example.com/callback",
            "code_verifier": "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk",
            "client_id": "https://app.example.com/"
        }"#;

        let request: TokenRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.grant_type.as_deref(), Some("authorization_code"));
        assert!(request.refresh_token.is_none());

        let Grant::AuthorizationCode(redemption) = request.into_grant(None).unwrap() else {
            panic!("expected authorization_code grant");
        };
        assert_eq!(redemption.code, "SplxlOBeZQQYbYS6WxSbIA");
    }

    #[test]
    fn test_violations_are_aggregated() {
        let request = TokenRequest {
            grant_type: Some("authorization_code".to_string()),
            code: Some("short".to_string()),
            code_verifier: Some("too-short".to_string()),
            ..Default::default()
        };

        let err = request.into_grant(None).unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));
        let parts: Vec<&str> = err.description().split("; ").collect();
        assert_eq!(parts.len(), 4, "{parts:?}");
        assert!(parts.contains(&"client_id is required"));
        assert!(parts.contains(&"redirect_uri is required"));
    }

    #[test]
    fn test_refresh_grant_carries_bearer() {
        let request = TokenRequest {
            grant_type: Some("refresh_token".to_string()),
            refresh_token: Some("tGzv3JOkF0XG5Qx2TlKWIA".to_string()),
            scope: Some("create".to_string()),
            ..Default::default()
        };

        let grant = request.into_grant(Some("jwt".to_string())).unwrap();
        assert_eq!(
            grant,
            Grant::RefreshToken(RefreshGrant {
                refresh_token: "tGzv3JOkF0XG5Qx2TlKWIA".to_string(),
                scope: Some("create".to_string()),
                access_token: Some("jwt".to_string()),
            })
        );
    }

    #[test]
    fn test_unsupported_and_missing_grant_type() {
        let request = TokenRequest {
            grant_type: Some("client_credentials".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            request.into_grant(None),
            Err(AuthError::UnsupportedGrantType { .. })
        ));

        let err = TokenRequest::default().into_grant(None).unwrap_err();
        assert_eq!(err.description(), "grant_type is required");
    }

    #[test]
    fn test_redemption_request_grant_type_optional() {
        let request = RedemptionRequest {
            grant_type: None,
            code: code_request().code,
            code_verifier: code_request().code_verifier,
            client_id: code_request().client_id,
            redirect_uri: code_request().redirect_uri,
        };
        assert!(request.clone().into_redemption().is_ok());

        let wrong = RedemptionRequest {
            grant_type: Some("refresh_token".to_string()),
            ..request
        };
        assert!(matches!(
            wrong.into_redemption(),
            Err(AuthError::UnsupportedGrantType { .. })
        ));
    }

    #[test]
    fn test_token_response_serialization() {
        let response = TokenResponse {
            access_token: "eyJ...".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 900,
            me: "https://example.com/".to_string(),
            scope: "create".to_string(),
            refresh_token: "r".to_string(),
            profile: None,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["token_type"], "Bearer");
        assert_eq!(json["me"], "https://example.com/");
        assert!(json.get("profile").is_none());
    }
}
