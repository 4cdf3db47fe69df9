//! Authorization code issuance and redemption.
//!
//! A code is created when the user approves a consent request and is
//! redeemed exactly once, either at the authorization endpoint (for the
//! profile URL only) or at the token endpoint (for an access token).
//!
//! # Redemption Order
//!
//! Checks run in a fixed order so the reported error is deterministic:
//!
//! 1. The code exists
//! 2. It has not been used
//! 3. It has not expired
//! 4. `client_id` matches
//! 5. `redirect_uri` matches
//! 6. The PKCE `code_verifier` matches the stored challenge
//! 7. Storage atomically marks it used; losing that race means "used"
//!
//! # Example
//!
//! ```ignore
//! use indieauth_core::oauth::code::{CodeRedemption, CodeService, Redemption, RedemptionKind};
//!
//! let code = service.redeem(&CodeRedemption {
//!     client_id, code, code_verifier, redirect_uri,
//! }).await?;
//!
//! let body = Redemption::new(&code, RedemptionKind::AccessToken);
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::pkce::{self, PkceChallengeMethod};
use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::{AuthorizationCodeStorage, UserProfileStorage};
use crate::token::refresh::generate_token;
use crate::types::{AuthorizationCode, UserProfile, unix_now};

/// Scopes that only release identity information.
const PROFILE_SCOPES: [&str; 2] = ["profile", "email"];

// =============================================================================
// Request / Response Types
// =============================================================================

/// Parameters presented when redeeming a code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CodeRedemption {
    pub client_id: String,
    pub code: String,
    pub code_verifier: String,
    pub redirect_uri: String,
}

/// What a successful redemption is exchanged for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionKind {
    /// The client receives an access token; the scope is reported.
    AccessToken,
    /// The client only learns who the user is.
    ProfileUrl,
}

impl RedemptionKind {
    /// A code whose scopes are all identity scopes (`profile`, `email`) is a
    /// profile URL exchange.
    #[must_use]
    pub fn for_scope(scope: &str) -> Self {
        if scope
            .split_whitespace()
            .all(|s| PROFILE_SCOPES.contains(&s))
        {
            Self::ProfileUrl
        } else {
            Self::AccessToken
        }
    }
}

/// Result of a redemption as reported to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redemption {
    pub me: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Released when the code grants the `profile` scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
}

impl Redemption {
    #[must_use]
    pub fn new(code: &AuthorizationCode, kind: RedemptionKind) -> Self {
        Self {
            me: code.me.clone(),
            scope: match kind {
                RedemptionKind::AccessToken => Some(code.scope.clone()),
                RedemptionKind::ProfileUrl => None,
            },
            profile: None,
        }
    }

    #[must_use]
    pub fn with_profile(mut self, profile: Option<UserProfile>) -> Self {
        self.profile = profile;
        self
    }
}

/// Returns `true` if `scope` grants the `profile` scope.
#[must_use]
pub fn includes_profile(scope: &str) -> bool {
    scope.split_whitespace().any(|s| s == "profile")
}

/// Looks up the profile released to the client, if `scope` grants
/// `profile`. The email address is withheld unless `email` is granted too.
///
/// # Errors
///
/// Returns `AuthError::ServerError` if storage fails.
pub async fn release_profile(
    profiles: &dyn UserProfileStorage,
    me: &str,
    scope: &str,
) -> AuthResult<Option<UserProfile>> {
    if !includes_profile(scope) {
        return Ok(None);
    }

    let profile = profiles.retrieve_user_profile(me).await.map_err(|e| {
        tracing::warn!(error = %e, "Profile lookup failed");
        AuthError::callback("retrieve_user_profile", e)
    })?;

    let email_granted = scope.split_whitespace().any(|s| s == "email");
    Ok(profile.map(|mut profile| {
        if !email_granted {
            profile.email = None;
        }
        profile
    }))
}

/// A consent request the user approved.
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovedRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub me: String,
    pub scope: String,
    pub code_challenge: String,
    #[serde(default = "default_challenge_method")]
    pub code_challenge_method: String,
    pub state: String,
}

fn default_challenge_method() -> String {
    PkceChallengeMethod::S256.as_str().to_string()
}

// =============================================================================
// Service
// =============================================================================

/// Creates and redeems authorization codes.
#[derive(Clone)]
pub struct CodeService {
    issuer: String,
    code_lifetime: Duration,
    codes: Arc<dyn AuthorizationCodeStorage>,
}

impl CodeService {
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        code_lifetime: Duration,
        codes: Arc<dyn AuthorizationCodeStorage>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            code_lifetime,
            codes,
        }
    }

    /// Creates and stores a code for an approved consent request and
    /// returns the URL to redirect the user agent to.
    ///
    /// The URL carries `code`, `state` and `iss` (RFC 9207).
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidRequest` if the redirect URI, scope or PKCE
    ///   method is unusable
    /// - `AuthError::ServerError` if storage fails
    pub async fn approve(&self, request: &ApprovedRequest) -> AuthResult<Url> {
        let mut redirect = Url::parse(&request.redirect_uri)
            .map_err(|e| AuthError::invalid_request(format!("invalid redirect_uri: {e}")))?;

        if request.scope.trim().is_empty() {
            return Err(AuthError::invalid_request("scope must not be empty"));
        }

        let method = PkceChallengeMethod::parse(&request.code_challenge_method)
            .map_err(|e| AuthError::invalid_request(e.to_string()))?;

        let lifetime = i64::try_from(self.code_lifetime.as_secs()).unwrap_or(i64::MAX);
        let code = AuthorizationCode {
            client_id: request.client_id.clone(),
            code: generate_token(),
            code_challenge: request.code_challenge.clone(),
            code_challenge_method: method.as_str().to_string(),
            exp: unix_now().saturating_add(lifetime),
            iss: Some(self.issuer.clone()),
            me: request.me.clone(),
            redirect_uri: request.redirect_uri.clone(),
            scope: request.scope.clone(),
            used: false,
        };

        self.codes.store(&code).await.map_err(|e| {
            tracing::error!(client_id = %code.client_id, error = %e, "Failed to store authorization code");
            AuthError::callback("store_authorization_code", e)
        })?;

        redirect
            .query_pairs_mut()
            .append_pair("code", &code.code)
            .append_pair("state", &request.state)
            .append_pair("iss", &self.issuer);

        tracing::info!(
            client_id = %code.client_id,
            scope = %code.scope,
            "Authorization code issued"
        );

        Ok(redirect)
    }

    /// Redeems a code, marking it used.
    ///
    /// Returns the code record as it was before redemption.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidGrant` if the code is unknown, used, expired,
    ///   bound to another client or redirect URI, or the verifier is wrong
    /// - `AuthError::Configuration` if the stored PKCE method is unsupported
    /// - `AuthError::ServerError` if storage fails
    pub async fn redeem(&self, request: &CodeRedemption) -> AuthResult<AuthorizationCode> {
        // 1. Look the code up
        let code = self
            .codes
            .retrieve(&request.code)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Authorization code lookup failed");
                AuthError::callback("retrieve_authorization_code", e)
            })?
            .ok_or_else(|| AuthError::invalid_grant("authorization code not found"))?;

        // 2. Single use
        if code.used {
            tracing::warn!(client_id = %code.client_id, "Authorization code replayed");
            return Err(AuthError::invalid_grant("authorization code already used"));
        }

        // 3. Expiry
        if code.is_expired_at(unix_now()) {
            return Err(AuthError::invalid_grant("authorization code expired"));
        }

        // 4. Client binding
        if code.client_id != request.client_id {
            return Err(AuthError::invalid_grant(
                "authorization code was issued to a different client",
            ));
        }

        // 5. Redirect URI binding
        if code.redirect_uri != request.redirect_uri {
            return Err(AuthError::invalid_grant(
                "redirect_uri does not match the authorization request",
            ));
        }

        // 6. PKCE
        pkce::verify_code_verifier(
            &request.code_verifier,
            &code.code_challenge,
            &code.code_challenge_method,
        )?;

        // 7. Claim the code
        let claimed = self.codes.mark_used(&code.code).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to mark authorization code used");
            AuthError::callback("mark_authorization_code_used", e)
        })?;
        if !claimed {
            tracing::warn!(client_id = %code.client_id, "Lost authorization code redemption race");
            return Err(AuthError::invalid_grant("authorization code already used"));
        }

        tracing::debug!(client_id = %code.client_id, "Authorization code redeemed");
        Ok(code)
    }
}

impl std::fmt::Debug for CodeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeService")
            .field("issuer", &self.issuer)
            .field("code_lifetime", &self.code_lifetime)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::pkce::compute_challenge;
    use crate::storage::InMemoryStorage;

    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const CLIENT: &str = "https://app.example.com/";
    const REDIRECT: &str = "https://app.example.com/callback";

    fn code(value: &str) -> AuthorizationCode {
        AuthorizationCode {
            client_id: CLIENT.to_string(),
            code: value.to_string(),
            code_challenge: compute_challenge(VERIFIER, PkceChallengeMethod::S256),
            code_challenge_method: "S256".to_string(),
            exp: unix_now() + 60,
            iss: Some("https://auth.example.com/".to_string()),
            me: "https://example.com/".to_string(),
            redirect_uri: REDIRECT.to_string(),
            scope: "create update".to_string(),
            used: false,
        }
    }

    fn redemption(value: &str) -> CodeRedemption {
        CodeRedemption {
            client_id: CLIENT.to_string(),
            code: value.to_string(),
            code_verifier: VERIFIER.to_string(),
            redirect_uri: REDIRECT.to_string(),
        }
    }

    fn service(storage: Arc<InMemoryStorage>) -> CodeService {
        CodeService::new("https://auth.example.com/", Duration::from_secs(60), storage)
    }

    #[tokio::test]
    async fn test_redeem_marks_used() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.insert_code(code("code-1234567"));
        let service = service(storage.clone());

        let redeemed = service.redeem(&redemption("code-1234567")).await.unwrap();
        assert_eq!(redeemed.me, "https://example.com/");
        assert!(storage.code("code-1234567").unwrap().used);
    }

    #[tokio::test]
    async fn test_second_redemption_fails_even_with_bad_verifier() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.insert_code(code("code-1234567"));
        let service = service(storage);

        service.redeem(&redemption("code-1234567")).await.unwrap();

        let mut bad = redemption("code-1234567");
        bad.code_verifier = "x".repeat(43);
        for request in [redemption("code-1234567"), bad] {
            let err = service.redeem(&request).await.unwrap_err();
            assert_eq!(err, AuthError::invalid_grant("authorization code already used"));
        }
    }

    #[tokio::test]
    async fn test_error_precedence() {
        let storage = Arc::new(InMemoryStorage::new());
        let service = service(storage.clone());

        // Used wins over expiry and a wrong client.
        let mut record = code("used-code-123");
        record.used = true;
        record.exp = unix_now() - 100;
        record.client_id = "https://other.example/".to_string();
        storage.insert_code(record);
        let err = service.redeem(&redemption("used-code-123")).await.unwrap_err();
        assert!(err.description().contains("already used"));

        // Expiry wins over a wrong client.
        let mut record = code("stale-code-123");
        record.exp = unix_now() - 100;
        record.client_id = "https://other.example/".to_string();
        storage.insert_code(record);
        let err = service.redeem(&redemption("stale-code-123")).await.unwrap_err();
        assert!(err.description().contains("expired"));

        // Client wins over redirect URI.
        let mut record = code("client-code-123");
        record.client_id = "https://other.example/".to_string();
        record.redirect_uri = "https://other.example/cb".to_string();
        storage.insert_code(record);
        let err = service.redeem(&redemption("client-code-123")).await.unwrap_err();
        assert!(err.description().contains("different client"));

        let mut record = code("redirect-code-1");
        record.redirect_uri = "https://other.example/cb".to_string();
        storage.insert_code(record);
        let err = service.redeem(&redemption("redirect-code-1")).await.unwrap_err();
        assert!(err.description().contains("redirect_uri"));
    }

    #[tokio::test]
    async fn test_wrong_verifier_leaves_code_unused() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.insert_code(code("code-1234567"));
        let service = service(storage.clone());

        let mut request = redemption("code-1234567");
        request.code_verifier = "a".repeat(43);
        let err = service.redeem(&request).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidGrant { .. }));
        assert!(!storage.code("code-1234567").unwrap().used);
    }

    #[tokio::test]
    async fn test_unsupported_stored_method_is_configuration_error() {
        let storage = Arc::new(InMemoryStorage::new());
        let mut record = code("code-1234567");
        record.code_challenge_method = "S512".to_string();
        storage.insert_code(record);

        let err = service(storage).redeem(&redemption("code-1234567")).await.unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
        assert_eq!(err.oauth_error_code(), "server_error");
    }

    #[tokio::test]
    async fn test_unknown_code_and_storage_failure() {
        let storage = Arc::new(InMemoryStorage::new());
        let err = service(storage).redeem(&redemption("missing-code")).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidGrant { .. }));

        let failing = Arc::new(InMemoryStorage::new().failing("retrieve_authorization_code"));
        let err = service(failing).redeem(&redemption("missing-code")).await.unwrap_err();
        assert!(err.is_server_error());
    }

    #[tokio::test]
    async fn test_mark_used_failure_is_server_error() {
        let storage = Arc::new(InMemoryStorage::new().failing("mark_authorization_code_used"));
        storage.insert_code(code("code-1234567"));

        let err = service(storage).redeem(&redemption("code-1234567")).await.unwrap_err();
        assert!(err.is_server_error());
    }

    #[tokio::test]
    async fn test_approve_stores_code_and_builds_redirect() {
        let storage = Arc::new(InMemoryStorage::new());
        let service = service(storage.clone());

        let url = service
            .approve(&ApprovedRequest {
                client_id: CLIENT.to_string(),
                redirect_uri: REDIRECT.to_string(),
                me: "https://example.com/".to_string(),
                scope: "create".to_string(),
                code_challenge: compute_challenge(VERIFIER, PkceChallengeMethod::S256),
                code_challenge_method: "S256".to_string(),
                state: "xyz".to_string(),
            })
            .await
            .unwrap();

        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["state"], "xyz");
        assert_eq!(pairs["iss"], "https://auth.example.com/");

        let stored = storage.code(&pairs["code"]).unwrap();
        assert!(!stored.used);
        assert_eq!(stored.iss.as_deref(), Some("https://auth.example.com/"));
        assert!(stored.exp > unix_now());

        let request = CodeRedemption {
            code: pairs["code"].clone(),
            ..redemption("")
        };
        assert!(service.redeem(&request).await.is_ok());
    }

    #[tokio::test]
    async fn test_release_profile_only_for_profile_scope() {
        let storage = InMemoryStorage::new();
        storage.insert_profile(
            "https://example.com/",
            UserProfile {
                name: Some("Example".to_string()),
                email: Some("me@example.com".to_string()),
                ..Default::default()
            },
        );

        let released = release_profile(&storage, "https://example.com/", "create profile")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(released.name.as_deref(), Some("Example"));
        assert!(released.email.is_none());

        let with_email = release_profile(&storage, "https://example.com/", "profile email")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(with_email.email.as_deref(), Some("me@example.com"));

        let withheld = release_profile(&storage, "https://example.com/", "create")
            .await
            .unwrap();
        assert!(withheld.is_none());

        let failing = InMemoryStorage::new().failing("retrieve_user_profile");
        assert!(
            release_profile(&failing, "https://example.com/", "profile")
                .await
                .is_err()
        );
    }

    #[test]
    fn test_redemption_kind() {
        assert_eq!(RedemptionKind::for_scope("profile"), RedemptionKind::ProfileUrl);
        assert_eq!(RedemptionKind::for_scope("profile email"), RedemptionKind::ProfileUrl);
        assert_eq!(RedemptionKind::for_scope("profile create"), RedemptionKind::AccessToken);

        let record = code("c");
        assert_eq!(
            Redemption::new(&record, RedemptionKind::ProfileUrl),
            Redemption {
                me: "https://example.com/".to_string(),
                scope: None,
                profile: None,
            }
        );
        assert!(includes_profile("create profile"));
        assert!(!includes_profile("create profiles"));
    }
}
