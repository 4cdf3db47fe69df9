//! Token endpoint configuration.
//!
//! Holds the identity this server issues credentials for, the lifetimes of
//! each credential kind, how remote key sets are fetched, and how the claim
//! validator chain treats operators it does not understand.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration.
///
/// # Example (TOML)
///
/// ```toml
/// issuer = "https://auth.example.com/"
/// me = "https://example.com/"
/// jwks_url = "https://auth.example.com/jwks"
/// include_error_description = true
///
/// [token]
/// access_token_lifetime = "15m"
/// refresh_token_lifetime = "30d"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Issuer URL placed in the `iss` claim and in authorization redirects.
    pub issuer: String,

    /// Canonical profile URL of the site owner. Only credentials bound to
    /// this `me` may be revoked here.
    pub me: String,

    /// Where the public JSON Web Key Set is published. When set, access
    /// tokens are verified against the remote set instead of the local one.
    pub jwks_url: Option<String>,

    /// Include `error_description` in error responses.
    pub include_error_description: bool,

    /// Credential lifetimes.
    pub token: TokenLifetimes,

    /// Remote JWKS fetching.
    pub jwks: JwksConfig,

    /// Claim validator chain behaviour.
    pub claims: ClaimsConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:3001/".to_string(),
            me: "http://localhost:3001/".to_string(),
            jwks_url: None,
            include_error_description: false,
            token: TokenLifetimes::default(),
            jwks: JwksConfig::default(),
            claims: ClaimsConfig::default(),
        }
    }
}

/// Lifetimes of the three credential kinds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenLifetimes {
    /// Authorization code lifetime. Codes should be short-lived.
    #[serde(with = "humantime_serde")]
    pub authorization_code_lifetime: Duration,

    /// Access token lifetime (`expires_in` of the token response).
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            authorization_code_lifetime: Duration::from_secs(60),
            access_token_lifetime: Duration::from_secs(15 * 60),
            refresh_token_lifetime: Duration::from_secs(30 * 24 * 3600),
        }
    }
}

/// Remote JWKS cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JwksConfig {
    /// TTL used when the response carries no `Cache-Control: max-age`.
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,

    /// Lower bound applied to the server-provided TTL. Also the minimum
    /// interval between refetches forced by an unknown `kid`.
    #[serde(with = "humantime_serde")]
    pub min_ttl: Duration,

    /// Upper bound applied to the server-provided TTL.
    #[serde(with = "humantime_serde")]
    pub max_ttl: Duration,

    /// HTTP request timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Allow `http://` key set URLs. Only for local development.
    pub allow_http: bool,
}

impl Default for JwksConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            min_ttl: Duration::from_secs(60),
            max_ttl: Duration::from_secs(86400),
            timeout: Duration::from_secs(10),
            allow_http: false,
        }
    }
}

/// What the claim validator chain does with an operator it cannot evaluate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownOperatorPolicy {
    /// Reject the assertion with a server error.
    #[default]
    FailClosed,
    /// Log a warning and treat the assertion as satisfied.
    Warn,
}

/// Claim validator chain settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ClaimsConfig {
    /// Policy for unrecognized comparison operators.
    pub unknown_operator: UnknownOperatorPolicy,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// The configuration document could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

impl AuthConfig {
    /// Parses a TOML document and validates the result.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML and any error
    /// produced by [`AuthConfig::validate`].
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `issuer` or `me` is empty, and
    /// `ConfigError::InvalidValue` if:
    /// - `issuer`, `me` or `jwks_url` is not an absolute URL
    /// - any lifetime is zero
    /// - the JWKS TTL bounds are inverted
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::Missing("issuer".to_string()));
        }
        if self.me.is_empty() {
            return Err(ConfigError::Missing("me".to_string()));
        }

        for (name, value) in [("issuer", Some(&self.issuer)), ("me", Some(&self.me))]
            .into_iter()
            .chain(std::iter::once(("jwks_url", self.jwks_url.as_ref())))
        {
            if let Some(value) = value {
                url::Url::parse(value).map_err(|e| {
                    ConfigError::InvalidValue(format!("{name} '{value}' is not a valid URL: {e}"))
                })?;
            }
        }

        let lifetimes = [
            (
                "authorization_code_lifetime",
                self.token.authorization_code_lifetime,
            ),
            ("access_token_lifetime", self.token.access_token_lifetime),
            ("refresh_token_lifetime", self.token.refresh_token_lifetime),
        ];
        for (name, lifetime) in lifetimes {
            if lifetime.is_zero() {
                return Err(ConfigError::InvalidValue(format!("{name} must be > 0")));
            }
        }

        if self.jwks.min_ttl > self.jwks.max_ttl {
            return Err(ConfigError::InvalidValue(
                "jwks.min_ttl must not exceed jwks.max_ttl".to_string(),
            ));
        }

        Ok(())
    }
}
