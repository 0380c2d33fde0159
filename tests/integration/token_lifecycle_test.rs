//! Integration tests for session issuance, rotation, validation and revocation.

mod helpers;

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use serde_json::json;

use fleetguard_auth::{AuthError, SessionStore};
use fleetguard_entity::{RevocationReason, Role, RuleScope};

use helpers::{TestApp, rule, test_config};

#[tokio::test]
async fn test_fourth_session_evicts_the_oldest() {
    let app = TestApp::new(3, vec![]).await;
    let principal = app.create_user(Role::Member).await;

    let first = app.issue(&principal).await;
    let mut later = Vec::new();
    for _ in 0..3 {
        later.push(app.issue(&principal).await);
    }

    let sessions = app.sessions.all_for_principal(principal.id).await;
    assert_eq!(sessions.len(), 4);

    let revoked: Vec<_> = sessions.iter().filter(|s| s.revoked).collect();
    assert_eq!(revoked.len(), 1);
    assert_eq!(revoked[0].id, first.session_id);
    assert_eq!(revoked[0].revoked_reason.as_deref(), Some("session_limit_exceeded"));

    let oldest_created = sessions.iter().map(|s| s.created_at).min().unwrap();
    assert_eq!(revoked[0].created_at, oldest_created);

    let response = app
        .request("GET", "/api/auth/me", None, Some(&first.access_token), None)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    for pair in &later {
        let response = app
            .request("GET", "/api/auth/me", None, Some(&pair.access_token), None)
            .await;
        assert_eq!(response.status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_concurrent_issuance_stays_within_limit() {
    let app = Arc::new(TestApp::new(3, vec![]).await);
    let principal = app.create_user(Role::Member).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let app = Arc::clone(&app);
        let principal = principal.clone();
        handles.push(tokio::spawn(async move { app.issue(&principal).await }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let live = app
        .sessions
        .find_live_by_principal(principal.id, Utc::now())
        .await
        .unwrap();
    assert!(live.len() <= 3, "{} live sessions", live.len());
    assert_eq!(app.sessions.all_for_principal(principal.id).await.len(), 10);
}

#[tokio::test]
async fn test_revoked_row_reports_revoked_not_signature() {
    let app = TestApp::new(5, vec![]).await;
    let principal = app.create_user(Role::Member).await;
    let pair = app.issue(&principal).await;

    app.sessions
        .revoke(&[pair.session_id], RevocationReason::Logout, Utc::now())
        .await
        .unwrap();

    let err = app
        .service
        .validate_access_token(&pair.access_token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::SessionRevoked), "got {err:?}");

    let response = app
        .request("GET", "/api/auth/me", None, Some(&pair.access_token), None)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["message"], "Invalid or expired credentials");
}

#[tokio::test]
async fn test_denials_share_one_generic_body() {
    let app = TestApp::new(5, vec![]).await;
    let principal = app.create_user(Role::Member).await;
    let pair = app.issue(&principal).await;
    app.service.revoke_all_sessions(principal.id).await.unwrap();

    let revoked = app
        .request("GET", "/api/auth/me", None, Some(&pair.access_token), None)
        .await;
    let garbage = app
        .request("GET", "/api/auth/me", None, Some("not.a.token"), None)
        .await;
    let wrong_kind = app
        .request("GET", "/api/auth/me", None, Some(&pair.refresh_token), None)
        .await;
    let missing = app.request("GET", "/api/auth/me", None, None, None).await;

    for response in [&revoked, &garbage, &wrong_kind, &missing] {
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.body, revoked.body);
    }
}

#[tokio::test]
async fn test_refresh_token_is_single_use() {
    let app = TestApp::new(5, vec![]).await;
    let principal = app.create_user(Role::Member).await;
    let pair = app.issue(&principal).await;
    let body = json!({ "refresh_token": pair.refresh_token });

    let rotated = app
        .request("POST", "/api/auth/refresh", Some(body.clone()), None, None)
        .await;
    assert_eq!(rotated.status, StatusCode::OK);
    let new_access = rotated.body["data"]["access_token"].as_str().unwrap();
    assert_eq!(rotated.body["data"]["token_type"], "Bearer");

    let replay = app
        .request("POST", "/api/auth/refresh", Some(body), None, None)
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);

    let old = app
        .request("GET", "/api/auth/me", None, Some(&pair.access_token), None)
        .await;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);

    let new = app
        .request("GET", "/api/auth/me", None, Some(new_access), None)
        .await;
    assert_eq!(new.status, StatusCode::OK);
    assert_eq!(new.body["data"]["id"], principal.id.to_string());
}

#[tokio::test]
async fn test_empty_refresh_token_is_a_validation_error() {
    let app = TestApp::new(5, vec![]).await;

    let response = app
        .request(
            "POST",
            "/api/auth/refresh",
            Some(json!({ "refresh_token": "" })),
            None,
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_logout_all_revokes_every_session() {
    let app = TestApp::new(5, vec![]).await;
    let principal = app.create_user(Role::Member).await;
    let first = app.issue(&principal).await;
    let second = app.issue(&principal).await;

    let response = app
        .request(
            "POST",
            "/api/auth/logout-all",
            None,
            Some(&first.access_token),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["revoked"], 2);

    for pair in [&first, &second] {
        let err = app
            .service
            .validate_access_token(&pair.access_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SessionRevoked), "got {err:?}");
    }
}

#[tokio::test]
async fn test_revoke_all_twice_is_a_no_op() {
    let app = TestApp::new(5, vec![]).await;
    let principal = app.create_user(Role::Member).await;
    app.issue(&principal).await;
    app.issue(&principal).await;

    assert_eq!(app.service.revoke_all_sessions(principal.id).await.unwrap(), 2);
    let after_first = app.sessions.all_for_principal(principal.id).await;

    assert_eq!(app.service.revoke_all_sessions(principal.id).await.unwrap(), 0);
    let after_second = app.sessions.all_for_principal(principal.id).await;

    assert_eq!(after_first.len(), after_second.len());
    for (a, b) in after_first.iter().zip(after_second.iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.revoked_at, b.revoked_at);
        assert_eq!(a.revoked_reason, b.revoked_reason);
    }
}

#[tokio::test]
async fn test_logout_revokes_only_the_presented_session() {
    let app = TestApp::new(5, vec![]).await;
    let principal = app.create_user(Role::Member).await;
    let first = app.issue(&principal).await;
    let second = app.issue(&principal).await;

    let response = app
        .request("POST", "/api/auth/logout", None, Some(&first.access_token), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let first_me = app
        .request("GET", "/api/auth/me", None, Some(&first.access_token), None)
        .await;
    let second_me = app
        .request("GET", "/api/auth/me", None, Some(&second.access_token), None)
        .await;
    assert_eq!(first_me.status, StatusCode::UNAUTHORIZED);
    assert_eq!(second_me.status, StatusCode::OK);
}

#[tokio::test]
async fn test_role_change_and_deactivation_apply_to_live_tokens() {
    let app = TestApp::new(5, vec![]).await;
    let principal = app.create_user(Role::Member).await;
    let pair = app.issue(&principal).await;

    app.directory
        .set_role(principal.id, Role::Manager)
        .await
        .unwrap();
    let me = app
        .request("GET", "/api/auth/me", None, Some(&pair.access_token), None)
        .await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["data"]["role"], "manager");

    app.directory.set_active(principal.id, false).await.unwrap();
    let me = app
        .request("GET", "/api/auth/me", None, Some(&pair.access_token), None)
        .await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rule_administration_requires_admin() {
    let app = TestApp::new(5, vec![]).await;
    let member = app.create_user(Role::Member).await;
    let admin = app.create_user(Role::Admin).await;
    let member_token = app.issue(&member).await.access_token;
    let admin_token = app.issue(&admin).await.access_token;

    let denied = app
        .request(
            "POST",
            "/api/admin/rate-limits/reload",
            None,
            Some(&member_token),
            None,
        )
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let created = app
        .request(
            "POST",
            "/api/admin/rate-limits",
            Some(json!({
                "name": "health check",
                "path_pattern": "/health",
                "method": "get",
                "max_requests": 2,
                "window_seconds": 60,
                "scope": "address",
            })),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["data"]["method"], "GET");

    let reloaded = app
        .request(
            "POST",
            "/api/admin/rate-limits/reload",
            None,
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(reloaded.status, StatusCode::OK);
    assert_eq!(reloaded.body["data"]["rules_loaded"], 1);

    let listed = app
        .request("GET", "/api/admin/rate-limits", None, Some(&admin_token), None)
        .await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body["data"].as_array().map(Vec::len), Some(1));

    let health = app.request("GET", "/health", None, None, None).await;
    assert_eq!(health.header("x-ratelimit-limit"), Some("2"));
}

#[tokio::test]
async fn test_invalid_rule_is_rejected() {
    let app = TestApp::new(5, vec![rule("*", "ANY", 100, 60, RuleScope::Address)]).await;
    let admin = app.create_user(Role::SuperAdmin).await;
    let token = app.issue(&admin).await.access_token;

    let response = app
        .request(
            "POST",
            "/api/admin/rate-limits",
            Some(json!({
                "name": "broken",
                "path_pattern": "/api/*",
                "method": "ANY",
                "max_requests": 5,
                "window_seconds": 0,
                "scope": "identity",
            })),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_records_resolved_address_not_forwarded_text() {
    let oversized = "x".repeat(512);

    let app = TestApp::new(5, vec![]).await;
    let principal = app.create_user(Role::Member).await;
    let pair = app.issue(&principal).await;
    let response = app
        .request_forwarded(
            "POST",
            "/api/auth/refresh",
            Some(json!({ "refresh_token": pair.refresh_token })),
            "198.51.100.20",
            &oversized,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let live: Vec<_> = app
        .sessions
        .all_for_principal(principal.id)
        .await
        .into_iter()
        .filter(|s| !s.revoked)
        .collect();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].client_ip.as_deref(), Some("198.51.100.20"));

    // Behind a trusted proxy a garbage hop falls back to the proxy itself.
    let mut config = test_config(5);
    config.server.trusted_proxies = vec!["10.0.0.1".parse().unwrap()];
    let app = TestApp::with_config(config, vec![]).await;
    let principal = app.create_user(Role::Member).await;
    let pair = app.issue(&principal).await;
    let response = app
        .request_forwarded(
            "POST",
            "/api/auth/refresh",
            Some(json!({ "refresh_token": pair.refresh_token })),
            "10.0.0.1",
            &oversized,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let live: Vec<_> = app
        .sessions
        .all_for_principal(principal.id)
        .await
        .into_iter()
        .filter(|s| !s.revoked)
        .collect();
    assert_eq!(live[0].client_ip.as_deref(), Some("10.0.0.1"));
}
