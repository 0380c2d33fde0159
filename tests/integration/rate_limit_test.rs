//! Integration tests for the rate limit middleware.

mod helpers;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use fleetguard_entity::{Role, RuleScope};

use helpers::{TestApp, rule, test_config};

fn retry_after(response: &helpers::TestResponse) -> u64 {
    response
        .header("retry-after")
        .and_then(|v| v.parse().ok())
        .expect("Retry-After header")
}

#[tokio::test]
async fn test_sixth_post_from_one_address_is_blocked() {
    let app = TestApp::new(
        10,
        vec![rule("/api/auth/refresh", "POST", 5, 60, RuleScope::Address)],
    )
    .await;
    let principal = app.create_user(Role::Member).await;
    let mut refresh_token = app.issue(&principal).await.refresh_token;

    for i in 0..5 {
        let response = app
            .request(
                "POST",
                "/api/auth/refresh",
                Some(json!({ "refresh_token": refresh_token })),
                None,
                Some("198.51.100.10"),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "request {}", i + 1);
        assert_eq!(response.header("x-ratelimit-limit"), Some("5"));
        assert_eq!(
            response.header("x-ratelimit-remaining"),
            Some((4 - i).to_string().as_str())
        );
        refresh_token = response.body["data"]["refresh_token"]
            .as_str()
            .unwrap()
            .to_string();
    }

    let blocked = app
        .request(
            "POST",
            "/api/auth/refresh",
            Some(json!({ "refresh_token": refresh_token })),
            None,
            Some("198.51.100.10"),
        )
        .await;
    assert_eq!(blocked.status, StatusCode::TOO_MANY_REQUESTS);
    let secs = retry_after(&blocked);
    assert!((1..=60).contains(&secs), "Retry-After {secs}");
    assert_eq!(blocked.header("x-ratelimit-limit"), Some("5"));
    assert_eq!(blocked.header("x-ratelimit-remaining"), Some("0"));

    // The blocked request never reached the handler, so the token is still usable.
    let elsewhere = app
        .request(
            "POST",
            "/api/auth/refresh",
            Some(json!({ "refresh_token": refresh_token })),
            None,
            Some("203.0.113.99"),
        )
        .await;
    assert_eq!(elsewhere.status, StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn test_window_resets_after_it_elapses() {
    let app = TestApp::new(5, vec![rule("/health", "GET", 5, 60, RuleScope::Address)]).await;

    for _ in 0..5 {
        let response = app.request("GET", "/health", None, None, None).await;
        assert_eq!(response.status, StatusCode::OK);
    }

    tokio::time::advance(Duration::from_secs(20)).await;
    let blocked = app.request("GET", "/health", None, None, None).await;
    assert_eq!(blocked.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(retry_after(&blocked), 40);

    tokio::time::advance(Duration::from_secs(41)).await;
    let reset = app.request("GET", "/health", None, None, None).await;
    assert_eq!(reset.status, StatusCode::OK);
    assert_eq!(reset.header("x-ratelimit-remaining"), Some("4"));
}

#[tokio::test]
async fn test_first_loaded_rule_wins() {
    let broad = rule("/api/admin/*", "ANY", 10, 60, RuleScope::Address);
    let narrow = rule("/api/admin/rate-limits", "GET", 3, 60, RuleScope::Address);

    let app = TestApp::new(5, vec![broad.clone(), narrow.clone()]).await;
    for _ in 0..4 {
        let response = app
            .request("GET", "/api/admin/rate-limits", None, None, None)
            .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.header("x-ratelimit-limit"), Some("10"));
    }

    let app = TestApp::new(5, vec![narrow, broad]).await;
    for _ in 0..3 {
        let response = app
            .request("GET", "/api/admin/rate-limits", None, None, None)
            .await;
        assert_eq!(response.header("x-ratelimit-limit"), Some("3"));
    }
    let blocked = app
        .request("GET", "/api/admin/rate-limits", None, None, None)
        .await;
    assert_eq!(blocked.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_identity_scope_counts_per_principal() {
    let app = TestApp::new(
        5,
        vec![rule("/api/auth/me", "GET", 2, 60, RuleScope::Identity)],
    )
    .await;
    let alice = app.create_user(Role::Member).await;
    let bob = app.create_user(Role::Member).await;
    let alice_token = app.issue(&alice).await.access_token;
    let bob_token = app.issue(&bob).await.access_token;
    let shared_address = Some("192.0.2.1");

    for _ in 0..2 {
        let response = app
            .request("GET", "/api/auth/me", None, Some(&alice_token), shared_address)
            .await;
        assert_eq!(response.status, StatusCode::OK);
    }
    let blocked = app
        .request("GET", "/api/auth/me", None, Some(&alice_token), shared_address)
        .await;
    assert_eq!(blocked.status, StatusCode::TOO_MANY_REQUESTS);

    let other = app
        .request("GET", "/api/auth/me", None, Some(&bob_token), shared_address)
        .await;
    assert_eq!(other.status, StatusCode::OK);

    // Anonymous callers fall back to the address key.
    for _ in 0..2 {
        let response = app
            .request("GET", "/api/auth/me", None, None, shared_address)
            .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }
    let anonymous = app
        .request("GET", "/api/auth/me", None, None, shared_address)
        .await;
    assert_eq!(anonymous.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_unmatched_paths_carry_no_headers() {
    let app = TestApp::new(5, vec![rule("/api/*", "POST", 1, 60, RuleScope::Address)]).await;

    let response = app.request("GET", "/health", None, None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("x-ratelimit-limit"), None);
}

#[tokio::test]
async fn test_disabled_limiter_admits_everything() {
    let mut config = test_config(5);
    config.rate_limit.enabled = false;
    let app = TestApp::with_config(config, vec![rule("*", "ANY", 0, 60, RuleScope::Address)]).await;

    for _ in 0..3 {
        let response = app.request("GET", "/health", None, None, None).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.header("x-ratelimit-limit"), None);
    }
}

#[tokio::test]
async fn test_deactivated_rule_stops_limiting() {
    let limited = rule("/health", "GET", 1, 60, RuleScope::Address);
    let rule_id = limited.id;
    let app = TestApp::new(5, vec![limited]).await;
    let admin = app.create_user(Role::Admin).await;
    let token = app.issue(&admin).await.access_token;

    assert_eq!(
        app.request("GET", "/health", None, None, None).await.status,
        StatusCode::OK
    );
    assert_eq!(
        app.request("GET", "/health", None, None, None).await.status,
        StatusCode::TOO_MANY_REQUESTS
    );

    let deleted = app
        .request(
            "DELETE",
            &format!("/api/admin/rate-limits/{rule_id}"),
            None,
            Some(&token),
            None,
        )
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let response = app.request("GET", "/health", None, None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("x-ratelimit-limit"), None);
}

#[tokio::test]
async fn test_decisions_are_audited() {
    let limited = rule("/health", "GET", 1, 60, RuleScope::Address);
    let rule_id = limited.id;
    let mut app = TestApp::new(5, vec![limited]).await;

    app.request("GET", "/health", None, None, Some("192.0.2.44"))
        .await;
    app.request("GET", "/health", None, None, Some("192.0.2.44"))
        .await;
    app.flush_audit().await;

    let events = app.audit.events().await;
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.rule_id == rule_id));
    assert!(events.iter().all(|e| e.client_address == "192.0.2.44"));
    assert_eq!(events.iter().filter(|e| e.blocked).count(), 1);
}

#[tokio::test]
async fn test_rotating_forwarded_for_from_one_socket_is_throttled() {
    let app = TestApp::new(5, vec![rule("/health", "GET", 2, 60, RuleScope::Address)]).await;

    let mut statuses = Vec::new();
    for i in 0..10 {
        let response = app
            .request_forwarded("GET", "/health", None, "192.0.2.50", &format!("203.0.113.{i}"))
            .await;
        statuses.push(response.status);
    }

    assert_eq!(&statuses[..2], &[StatusCode::OK, StatusCode::OK]);
    assert!(statuses[2..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
}

#[tokio::test]
async fn test_trusted_proxy_forwards_the_real_client_only() {
    let mut config = test_config(5);
    config.server.trusted_proxies = vec!["10.0.0.1".parse().unwrap()];
    let app = TestApp::with_config(
        config,
        vec![rule("/health", "GET", 2, 60, RuleScope::Address)],
    )
    .await;

    // Entries left of the proxy-appended one are client-controlled.
    for i in 0..2 {
        let response = app
            .request_forwarded(
                "GET",
                "/health",
                None,
                "10.0.0.1",
                &format!("198.51.100.{i}, 203.0.113.7"),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK);
    }
    let spoofed = app
        .request_forwarded("GET", "/health", None, "10.0.0.1", "198.51.100.9, 203.0.113.7")
        .await;
    assert_eq!(spoofed.status, StatusCode::TOO_MANY_REQUESTS);

    let other_client = app
        .request_forwarded("GET", "/health", None, "10.0.0.1", "203.0.113.8")
        .await;
    assert_eq!(other_client.status, StatusCode::OK);
}
