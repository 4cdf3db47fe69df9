mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{CLIENT_ID, CODE, ME, REDIRECT_URI, TestServer, VERIFIER};
use indieauth_core::UserProfile;

fn redemption_form(grant_type: &str) -> Vec<(&str, &str)> {
    vec![
        ("grant_type", grant_type),
        ("code", CODE),
        ("code_verifier", VERIFIER),
        ("client_id", CLIENT_ID),
        ("redirect_uri", REDIRECT_URI),
    ]
}

#[tokio::test]
async fn test_profile_url_exchange() {
    let server = TestServer::new();
    server.insert_code("profile email");
    server.storage.insert_profile(
        ME,
        UserProfile {
            name: Some("Example User".to_string()),
            email: Some("me@example.com".to_string()),
            ..Default::default()
        },
    );

    let response = server
        .post_form("/auth", &redemption_form("authorization_code"))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body,
        json!({
            "me": ME,
            "profile": {"name": "Example User", "email": "me@example.com"},
        })
    );
    assert!(server.storage.code(CODE).unwrap().used);
    assert!(server.storage.issued().await.is_empty());
}

#[tokio::test]
async fn test_exchange_reports_scope_for_access_grants() {
    let server = TestServer::new();
    server.insert_code("create");

    let response = server
        .post_json(
            "/auth",
            json!({
                "code": CODE,
                "code_verifier": VERIFIER,
                "client_id": CLIENT_ID,
                "redirect_uri": REDIRECT_URI,
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"me": ME, "scope": "create"}));
}

#[tokio::test]
async fn test_code_is_single_use_across_endpoints() {
    let server = TestServer::new();
    server.insert_code("profile");

    let first = server
        .post_form("/auth", &redemption_form("authorization_code"))
        .await;
    assert_eq!(first.status, StatusCode::OK);

    let second = server.exchange_code().await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(second.body["error"], "invalid_grant");
}

#[tokio::test]
async fn test_other_grant_types_are_unsupported() {
    let server = TestServer::new();
    server.insert_code("profile");

    let response = server
        .post_form("/auth", &redemption_form("refresh_token"))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "unsupported_grant_type");
    assert!(!server.storage.code(CODE).unwrap().used);
}

#[tokio::test]
async fn test_jwks_is_published() {
    let server = TestServer::new();

    let response = server.get("/jwks").await;

    assert_eq!(response.status, StatusCode::OK);
    let keys = response.body["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["kty"], "EC");
    assert_eq!(keys[0]["use"], "sig");
    assert!(keys[0].get("d").is_none());
}
