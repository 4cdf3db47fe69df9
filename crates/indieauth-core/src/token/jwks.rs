//! JSON Web Key Set sources.
//!
//! Access tokens are verified against a key set obtained from a
//! [`JwksSource`]:
//!
//! - [`StaticJwks`] - a fixed, in-process key set
//! - [`RemoteJwks`] - fetched from `jwks_url` and cached
//! - [`SigningKeySet`](super::jwt::SigningKeySet) - the public half of the
//!   server's own signing keys
//!
//! # Cache-Control Support
//!
//! [`RemoteJwks`] respects `Cache-Control: max-age=X` on the key set
//! response. The TTL is clamped between the configured minimum and maximum.
//!
//! # Security Considerations
//!
//! - Only HTTPS URLs are fetched unless `allow_http` is set
//! - Requests time out and are never retried
//! - Response size is limited

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use tokio::sync::RwLock;
use url::Url;

use crate::config::JwksConfig;

/// Maximum accepted key set response size.
const MAX_RESPONSE_SIZE: usize = 1024 * 1024;

/// Errors that can occur while obtaining a key set.
#[derive(Debug, thiserror::Error)]
pub enum JwksError {
    /// A network error occurred while fetching the JWKS.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The HTTP request returned a non-success status code.
    #[error("HTTP error: status {0}")]
    HttpError(u16),

    /// The JWKS response could not be parsed.
    #[error("Failed to parse JWKS: {0}")]
    ParseError(String),

    /// The JWKS URL scheme is not allowed.
    #[error("Invalid URL scheme: only HTTPS is allowed")]
    InvalidScheme,

    /// The response exceeded the maximum allowed size.
    #[error("Response exceeds maximum size of {max_size} bytes")]
    ResponseTooLarge {
        /// The maximum allowed size.
        max_size: usize,
    },
}

/// Provides the key set access tokens are verified against.
#[async_trait]
pub trait JwksSource: Send + Sync {
    /// Returns the current key set, fetching it if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the key set cannot be obtained.
    async fn key_set(&self) -> Result<JwkSet, JwksError>;

    /// Returns a fresh key set, bypassing any cache.
    ///
    /// Called when a token names a `kid` the cached set does not contain.
    ///
    /// # Errors
    ///
    /// Returns an error if the key set cannot be obtained.
    async fn refresh(&self) -> Result<JwkSet, JwksError> {
        self.key_set().await
    }
}

/// Finds a key by `kid`. Without a `kid`, a set with exactly one key
/// yields that key.
#[must_use]
pub fn find_key<'a>(set: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => set.find(kid),
        None if set.keys.len() == 1 => set.keys.first(),
        None => None,
    }
}

// =============================================================================
// Static key set
// =============================================================================

/// A key set that never changes.
#[derive(Debug, Clone)]
pub struct StaticJwks {
    set: JwkSet,
}

impl StaticJwks {
    /// Wraps a key set.
    #[must_use]
    pub fn new(set: JwkSet) -> Self {
        Self { set }
    }
}

#[async_trait]
impl JwksSource for StaticJwks {
    async fn key_set(&self) -> Result<JwkSet, JwksError> {
        Ok(self.set.clone())
    }
}

// =============================================================================
// Remote key set
// =============================================================================

struct CachedJwks {
    jwks: JwkSet,
    fetched_at: Instant,
    expires_at: Instant,
}

/// Key set fetched over HTTP and cached in memory.
pub struct RemoteJwks {
    url: Url,
    http_client: reqwest::Client,
    cache: RwLock<Option<CachedJwks>>,
    config: JwksConfig,
}

impl RemoteJwks {
    /// Creates a source for `url`.
    ///
    /// # Errors
    ///
    /// Returns `JwksError::InvalidScheme` for a non-HTTPS URL (unless
    /// `allow_http` is set) and `JwksError::NetworkError` if the HTTP client
    /// cannot be built.
    pub fn new(url: Url, config: JwksConfig) -> Result<Self, JwksError> {
        validate_scheme(&url, config.allow_http)?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| JwksError::NetworkError(e.to_string()))?;

        Ok(Self {
            url,
            http_client,
            cache: RwLock::new(None),
            config,
        })
    }

    /// The URL keys are fetched from.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Drops the cached key set.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
        tracing::debug!(url = %self.url, "Invalidated JWKS cache");
    }

    async fn cached(&self) -> Option<JwkSet> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|cached| Instant::now() < cached.expires_at)
            .map(|cached| cached.jwks.clone())
    }

    async fn recently_fetched(&self) -> Option<JwkSet> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < self.config.min_ttl)
            .map(|cached| cached.jwks.clone())
    }

    async fn fetch(&self) -> Result<JwkSet, JwksError> {
        tracing::debug!(url = %self.url, "Fetching JWKS");

        let response = self
            .http_client
            .get(self.url.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(url = %self.url, error = %e, "Failed to fetch JWKS");
                JwksError::NetworkError(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(JwksError::HttpError(response.status().as_u16()));
        }

        if let Some(len) = response.content_length()
            && len as usize > MAX_RESPONSE_SIZE
        {
            return Err(JwksError::ResponseTooLarge {
                max_size: MAX_RESPONSE_SIZE,
            });
        }

        let ttl = self.parse_cache_control(response.headers());

        let body = response
            .bytes()
            .await
            .map_err(|e| JwksError::NetworkError(e.to_string()))?;
        if body.len() > MAX_RESPONSE_SIZE {
            return Err(JwksError::ResponseTooLarge {
                max_size: MAX_RESPONSE_SIZE,
            });
        }

        let jwks: JwkSet = serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(url = %self.url, error = %e, "Failed to parse JWKS");
            JwksError::ParseError(e.to_string())
        })?;

        tracing::debug!(url = %self.url, keys = jwks.keys.len(), ttl = ?ttl, "Cached JWKS");

        let now = Instant::now();
        *self.cache.write().await = Some(CachedJwks {
            jwks: jwks.clone(),
            fetched_at: now,
            expires_at: now + ttl,
        });

        Ok(jwks)
    }

    /// Extracts `max-age` from Cache-Control and clamps it between
    /// `min_ttl` and `max_ttl`. Falls back to `default_ttl`.
    fn parse_cache_control(&self, headers: &reqwest::header::HeaderMap) -> Duration {
        let ttl = headers
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                v.split(',').find_map(|directive| {
                    directive
                        .trim()
                        .strip_prefix("max-age=")
                        .and_then(|age| age.parse::<u64>().ok())
                })
            })
            .map(Duration::from_secs)
            .unwrap_or(self.config.default_ttl);

        ttl.min(self.config.max_ttl).max(self.config.min_ttl)
    }
}

#[async_trait]
impl JwksSource for RemoteJwks {
    async fn key_set(&self) -> Result<JwkSet, JwksError> {
        if let Some(jwks) = self.cached().await {
            tracing::trace!(url = %self.url, "JWKS cache hit");
            return Ok(jwks);
        }
        self.fetch().await
    }

    /// Refetches the key set, at most once per `min_ttl`.
    async fn refresh(&self) -> Result<JwkSet, JwksError> {
        if let Some(jwks) = self.recently_fetched().await {
            tracing::debug!(url = %self.url, "JWKS refetch throttled");
            return Ok(jwks);
        }
        self.fetch().await
    }
}

fn validate_scheme(url: &Url, allow_http: bool) -> Result<(), JwksError> {
    match url.scheme() {
        "https" => Ok(()),
        "http" if allow_http => Ok(()),
        _ => Err(JwksError::InvalidScheme),
    }
}
