mod common;

use assert_json_diff::assert_json_include;
use axum::http::StatusCode;
use serde_json::json;

use common::{CLIENT_ID, ISSUER, ME, REDIRECT_URI, TestServer};
use indieauth_core::token::jwt::{self, claim_str};
use indieauth_core::types::unix_now;
use indieauth_core::{InMemoryStorage, RefreshTokenRecord};

#[tokio::test]
async fn test_active_access_token() {
    let server = TestServer::new();
    server.insert_code("create update");
    let issued = server.exchange_code().await;
    let access_token = issued.body["access_token"].as_str().unwrap();
    let claims = jwt::decode(access_token).unwrap();

    let response = server
        .post_form(
            "/introspect",
            &[("token", access_token), ("token_type_hint", "access_token")],
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_json_include!(
        actual: response.body,
        expected: json!({
            "active": true,
            "me": ME,
            "scope": "create update",
            "client_id": CLIENT_ID,
            "token_type": "Bearer",
            "iss": ISSUER,
            "jti": claim_str(&claims, "jti").unwrap(),
        })
    );
}

#[tokio::test]
async fn test_expired_access_token_is_inactive() {
    let server = TestServer::new();
    let now = unix_now();
    let token = server
        .keys
        .choose()
        .unwrap()
        .encode(&json!({
            "iss": ISSUER,
            "me": ME,
            "scope": "create",
            "jti": "expired-jti",
            "iat": now - 7200,
            "exp": now - 3600,
        }))
        .unwrap();

    let response = server.post_form("/introspect", &[("token", &token)]).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["active"], false);
    assert_eq!(response.body["jti"], "expired-jti");
}

#[tokio::test]
async fn test_token_within_clock_leeway_is_inactive() {
    let server = TestServer::new();
    let now = unix_now();
    let token = server
        .keys
        .choose()
        .unwrap()
        .encode(&json!({
            "iss": ISSUER,
            "me": ME,
            "scope": "create",
            "jti": "just-expired",
            "iat": now - 600,
            "exp": now - 5,
        }))
        .unwrap();

    let response = server.post_form("/introspect", &[("token", &token)]).await;

    assert_eq!(response.body["active"], false);
}

#[tokio::test]
async fn test_garbage_is_inactive() {
    let server = TestServer::new();

    let response = server
        .post_json("/introspect", json!({"token": "eyJ.not-really.a-jwt"}))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"active": false}));
}

#[tokio::test]
async fn test_missing_token_is_invalid_request() {
    let server = TestServer::new();

    let response = server.post_form("/introspect", &[]).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "invalid_request");
}

#[tokio::test]
async fn test_refresh_token_status() {
    let server = TestServer::new();
    server.storage.insert_refresh_token(RefreshTokenRecord {
        client_id: CLIENT_ID.to_string(),
        refresh_token: "refresh-1".to_string(),
        me: Some(ME.to_string()),
        redirect_uri: REDIRECT_URI.to_string(),
        scope: Some("create".to_string()),
        exp: unix_now() + 3600,
        revoked: false,
        revocation_reason: None,
        created_at: unix_now(),
    });

    let active = server
        .post_form(
            "/introspect",
            &[("token", "refresh-1"), ("token_type_hint", "refresh_token")],
        )
        .await;
    assert_eq!(active.body["active"], true);
    assert_eq!(active.body["client_id"], CLIENT_ID);
    assert_eq!(active.body["me"], ME);

    server.post_form("/revoke", &[("token", "refresh-1")]).await;

    let revoked = server
        .post_form("/introspect", &[("token", "refresh-1")])
        .await;
    assert_eq!(revoked.body["active"], false);
}

#[tokio::test]
async fn test_status_lookup_failure_is_server_error() {
    let server = TestServer::with(
        common::config(),
        InMemoryStorage::new().failing("is_access_token_revoked"),
    );
    server.insert_code("create");
    let issued = server.exchange_code().await;

    let response = server
        .post_form(
            "/introspect",
            &[("token", issued.body["access_token"].as_str().unwrap())],
        )
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["error"], "server_error");
}
