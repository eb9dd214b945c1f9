//! End-to-end tests through the full router.
//!
//! These run against in-memory auth stores, so they cover everything up to the point a handler
//! touches the database: token extraction, the decision chain, guards, redirects and revocation.

use axum::http::StatusCode;
use serde_json::Value;

use crate::{
    auth::access::{ACCOUNT_DISABLED, NO_PERMISSION, NO_TOKEN, TOKEN_SUPERSEDED},
    test_utils::{MemoryAuthStore, create_test_app, create_test_app_with_config, create_test_config, enabled_user, issue_token},
    types::Status,
};

const EDITOR_ROLE: i64 = 10;

/// User 1 is an editor allowed to list and update users, user 2 has no roles at all.
fn store() -> MemoryAuthStore {
    let store = MemoryAuthStore::default();
    store.insert_user(enabled_user(1));
    store.insert_user(enabled_user(2));
    store.grant(EDITOR_ROLE, 100, "GET", "/admin/api/users");
    store.grant(EDITOR_ROLE, 101, "PUT", "/admin/api/users/:id");
    store
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[test_log::test(tokio::test)]
async fn test_health_and_request_id() {
    let (server, _) = create_test_app(store());

    let response = server.get("/healthz").await;
    response.assert_status(StatusCode::OK);
    response.assert_text("OK");
    assert!(response.headers().get("x-request-id").is_some());
}

#[test_log::test(tokio::test)]
async fn test_captcha_is_public() {
    let (server, _) = create_test_app(store());

    let response = server.get("/api/captcha").await;
    response.assert_status(StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["code"], 0);
    assert!(!body["data"]["captcha_id"].as_str().unwrap().is_empty());
    assert!(body["data"]["challenge"].as_str().unwrap().ends_with("= ?"));
}

#[test_log::test(tokio::test)]
async fn test_declared_routes_are_registered() {
    let (_, state) = create_test_app(store());

    assert_eq!(state.registry.len(), 26);
    let route = state.registry.lookup("DELETE", "/admin/api/users/5");
    assert_eq!(route.name, "Delete user");
    assert_eq!(route.group, "Users");
    assert_eq!(
        state.registry.lookup("GET", "/admin/api/dictionaries/items/by-code").name,
        "Dictionary items by code"
    );
    // Session-only routes are not permission-controlled
    assert_eq!(state.registry.lookup("POST", "/admin/api/logout").name, "");
}

#[test_log::test(tokio::test)]
async fn test_missing_token_is_unauthenticated() {
    let (server, _) = create_test_app(store());

    let response = server.get("/admin/api/users").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let body: Value = response.json();
    assert_eq!(body["code"], 401);
    assert_eq!(body["msg"], NO_TOKEN);
    assert_eq!(body["error"], "unauthenticated");
}

#[test_log::test(tokio::test)]
async fn test_browser_without_session_is_redirected_to_login() {
    let (server, state) = create_test_app(store());

    let response = server
        .get("/admin/api/users")
        .add_header("accept", "text/html,application/xhtml+xml")
        .await;
    response.assert_status(StatusCode::FOUND);
    assert_eq!(response.header("location").to_str().unwrap(), state.config.auth.login_path);
    assert!(response.header("set-cookie").to_str().unwrap().contains("Max-Age=0"));
}

#[test_log::test(tokio::test)]
async fn test_granted_route_reaches_handler() {
    let (server, state) = create_test_app(store());
    let token = issue_token(&state, 1, vec![EDITOR_ROLE], 0, false);

    // Past the guard the handler rejects the missing JSON body
    let response = server.put("/admin/api/users/5").add_header("authorization", bearer(&token)).await;
    response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[test_log::test(tokio::test)]
async fn test_ungranted_route_is_forbidden() {
    let (server, state) = create_test_app(store());
    let token = issue_token(&state, 1, vec![EDITOR_ROLE], 0, false);

    let response = server.put("/admin/api/roles/5").add_header("authorization", bearer(&token)).await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["msg"], NO_PERMISSION);

    // Forbidden is not a session failure, so browsers get the error rather than a redirect
    let response = server
        .put("/admin/api/roles/5")
        .add_header("authorization", bearer(&token))
        .add_header("accept", "text/html")
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[test_log::test(tokio::test)]
async fn test_super_admin_bypasses_permissions() {
    let (server, state) = create_test_app(store());
    let token = issue_token(&state, 2, vec![], 0, true);

    let response = server.put("/admin/api/roles/5").add_header("authorization", bearer(&token)).await;
    response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[test_log::test(tokio::test)]
async fn test_session_route_needs_no_permission() {
    let (server, state) = create_test_app(store());
    let token = issue_token(&state, 2, vec![], 0, false);

    let response = server
        .get("/admin/api/user/permissions")
        .add_header("authorization", bearer(&token))
        .await;
    response.assert_status(StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["data"]["is_super_admin"], false);
    assert_eq!(body["data"]["permissions"], serde_json::json!([]));
}

#[test_log::test(tokio::test)]
async fn test_token_from_cookie_and_query() {
    let (server, state) = create_test_app(store());
    let token = issue_token(&state, 2, vec![], 0, false);
    let cookie_name = &state.config.auth.session.cookie_name;

    server
        .get("/admin/api/user/permissions")
        .add_header("cookie", format!("{cookie_name}={token}"))
        .await
        .assert_status(StatusCode::OK);

    server
        .get(&format!("/admin/api/user/permissions?token={token}"))
        .await
        .assert_status(StatusCode::OK);
}

#[test_log::test(tokio::test)]
async fn test_logout_revokes_existing_tokens() {
    let store = store();
    let (server, state) = create_test_app(store.clone());
    let token = issue_token(&state, 2, vec![], 0, false);

    let response = server.post("/admin/api/logout").add_header("authorization", bearer(&token)).await;
    response.assert_status(StatusCode::OK);
    assert!(response.header("set-cookie").to_str().unwrap().contains("Max-Age=0"));
    assert_eq!(store.token_version(2), Some(1));

    let response = server
        .get("/admin/api/user/permissions")
        .add_header("authorization", bearer(&token))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["msg"], TOKEN_SUPERSEDED);

    // A session issued after logout works again
    let fresh = issue_token(&state, 2, vec![], 1, false);
    server
        .get("/admin/api/user/permissions")
        .add_header("authorization", bearer(&fresh))
        .await
        .assert_status(StatusCode::OK);
}

#[test_log::test(tokio::test)]
async fn test_disabled_account() {
    let store = store();
    let (server, state) = create_test_app(store.clone());
    let token = issue_token(&state, 1, vec![EDITOR_ROLE], 0, false);
    store.set_status(1, Status::Disabled);

    let response = server.get("/admin/api/users").add_header("authorization", bearer(&token)).await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["msg"], ACCOUNT_DISABLED);

    // Disabled accounts are sent back to the login page like a missing session
    let response = server
        .get("/admin/api/users")
        .add_header("authorization", bearer(&token))
        .add_header("accept", "text/html")
        .await;
    response.assert_status(StatusCode::FOUND);
}

#[test_log::test(tokio::test)]
async fn test_permission_lookup_failure_is_internal_error() {
    let store = store();
    let (server, state) = create_test_app(store.clone());
    let token = issue_token(&state, 1, vec![EDITOR_ROLE], 0, false);
    store.fail_permission_lookups(true);

    let response = server.get("/admin/api/users").add_header("authorization", bearer(&token)).await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["msg"], "Internal server error");
}

/// Operation log on, with a request body limit small enough to trip.
fn audited_app() -> (axum_test::TestServer, crate::AppState) {
    let mut config = create_test_config();
    config.operation_log.enabled = true;
    config.max_request_bytes = 1024;
    create_test_app_with_config(config, store())
}

#[test_log::test(tokio::test)]
async fn test_oversized_body_without_session_is_rejected_before_reading() {
    let (server, _) = audited_app();

    // The guard answers before anything buffers the body
    let response = server.put("/admin/api/users/5").text("x".repeat(64 * 1024)).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["msg"], NO_TOKEN);

    let response = server.post("/admin/api/logout").text("x".repeat(64 * 1024)).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[test_log::test(tokio::test)]
async fn test_audited_request_body_is_bounded() {
    let (server, state) = audited_app();
    let token = issue_token(&state, 1, vec![EDITOR_ROLE], 0, false);

    let response = server
        .put("/admin/api/users/5")
        .add_header("authorization", bearer(&token))
        .text("x".repeat(4096))
        .await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = response.json();
    assert_eq!(body["error"], "payload_too_large");

    // Within the limit the request reaches the handler, which wants JSON
    server
        .put("/admin/api/users/5")
        .add_header("authorization", bearer(&token))
        .text("small")
        .await
        .assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
}
