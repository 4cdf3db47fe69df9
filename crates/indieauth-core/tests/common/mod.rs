//! Shared harness for endpoint tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use indieauth_core::oauth::{PkceChallengeMethod, compute_challenge};
use indieauth_core::types::unix_now;
use indieauth_core::{
    AuthConfig, AuthState, AuthorizationCode, InMemoryStorage, SigningKeyPair, SigningKeySet,
    Storage, router,
};

pub const ISSUER: &str = "https://auth.example.com/";
pub const ME: &str = "https://example.com/";
pub const CLIENT_ID: &str = "https://app.example.com/";
pub const REDIRECT_URI: &str = "https://app.example.com/callback";
pub const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
pub const CODE: &str = "code-0123456789";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct TestServer {
    pub app: Router,
    pub storage: Arc<InMemoryStorage>,
    pub keys: Arc<SigningKeySet>,
    pub config: Arc<AuthConfig>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub fn config() -> AuthConfig {
    AuthConfig {
        issuer: ISSUER.to_string(),
        me: ME.to_string(),
        include_error_description: true,
        ..Default::default()
    }
}

impl TestServer {
    pub fn new() -> Self {
        Self::with(config(), InMemoryStorage::new())
    }

    pub fn with(config: AuthConfig, storage: InMemoryStorage) -> Self {
        init_tracing();
        let config = Arc::new(config);
        let keys = Arc::new(SigningKeySet::single(
            SigningKeyPair::generate_ec().expect("key generation"),
        ));
        let storage = Arc::new(storage);
        let state = AuthState::new(config, keys.clone(), keys, &Storage::shared(storage.clone()));
        Self::from_state(state, storage)
    }

    pub fn from_state(state: AuthState, storage: Arc<InMemoryStorage>) -> Self {
        init_tracing();
        Self {
            keys: state.keys.clone(),
            config: state.config.clone(),
            app: router(state),
            storage,
        }
    }

    pub fn insert_code(&self, scope: &str) {
        self.storage.insert_code(AuthorizationCode {
            client_id: CLIENT_ID.to_string(),
            code: CODE.to_string(),
            code_challenge: compute_challenge(VERIFIER, PkceChallengeMethod::S256),
            code_challenge_method: "S256".to_string(),
            exp: unix_now() + 60,
            iss: Some(ISSUER.to_string()),
            me: ME.to_string(),
            redirect_uri: REDIRECT_URI.to_string(),
            scope: scope.to_string(),
            used: false,
        });
    }

    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> TestResponse {
        self.post_form_with(path, form, None).await
    }

    pub async fn post_form_with(
        &self,
        path: &str,
        form: &[(&str, &str)],
        bearer: Option<&str>,
    ) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();

        let mut request = Request::post(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(token) = bearer {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        self.send(request.body(Body::from(body)).unwrap()).await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> TestResponse {
        let request = Request::post(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Redeems the inserted code at the token endpoint.
    pub async fn exchange_code(&self) -> TestResponse {
        self.post_form(
            "/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", CODE),
                ("code_verifier", VERIFIER),
                ("client_id", CLIENT_ID),
                ("redirect_uri", REDIRECT_URI),
            ],
        )
        .await
    }
}
