//! End-to-end tests of the HTTP surface: admin endpoints, dynamic plugin
//! route dispatch, and the token verification splice.

use http::StatusCode;
use serde_json::json;

use crate::helpers::TestApp;

#[tokio::test]
async fn health_endpoint_responds() {
    let app = TestApp::new(false).await;
    let (status, body) = app.request("GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn plugin_listing_includes_loaded_plugins_and_tags() {
    let app = TestApp::new(false).await;
    let (status, body) = app.request("GET", "/api/plugins", None).await;
    assert_eq!(status, StatusCode::OK);

    let names: Vec<&str> = body["plugins"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["audit", "opsbay"]);

    let tags: Vec<&str> = body["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert!(tags.contains(&"audit"));
    assert!(tags.contains(&"opsbay"));
}

#[tokio::test]
async fn fired_event_reaches_subscribed_handlers() {
    let app = TestApp::new(false).await;

    let (status, body) = app
        .request(
            "POST",
            "/api/events/git:push",
            Some(json!({ "fields": { "event": "git:push", "branch": "master" } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["handlers"], 1);

    // The audit plugin's wildcard subscription recorded the event.
    let (status, body) = app.request("GET", "/audit/recent", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"][0]["subject"], "git:push");
    assert_eq!(body["entries"][0]["fields"]["branch"], "master");
}

#[tokio::test]
async fn action_dispatch_via_api() {
    let app = TestApp::new(false).await;

    let (status, body) = app
        .request(
            "POST",
            "/api/actions/audit:record",
            Some(json!({ "fields": { "source": "jira" } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["handlers"], 1);
    assert_eq!(app.audit.recent(1)[0].subject, "jira");
}

#[tokio::test]
async fn unknown_plugin_route_is_not_found() {
    let app = TestApp::new(false).await;
    let (status, _) = app.request("GET", "/nowhere/at/all", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_token_gates_the_clear_route() {
    let app = TestApp::new(true).await;
    app.audit.record("seed", json!({}));

    // No credential: forbidden.
    let (status, _) = app.request("POST", "/audit/clear", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.audit.len(), 1);

    // Wrong-group credential: forbidden.
    let (status, _) = app
        .request("POST", "/audit/clear?token=secretB", None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Admin credential: accepted.
    let (status, body) = app
        .request("POST", "/audit/clear?token=secretA", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dropped"], 1);
    assert!(app.audit.is_empty());
}

#[tokio::test]
async fn ops_route_rejects_admin_secret() {
    let app = TestApp::new(true).await;

    // secretA belongs to `admin`, not `ops`.
    let (status, _) = app.request("GET", "/ops/status?token=secretA", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn disabled_tokens_accept_any_request() {
    let app = TestApp::new(false).await;

    let (status, _) = app.request("POST", "/audit/clear", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.request("GET", "/ops/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "operational");
}

#[tokio::test]
async fn credential_accepted_from_header_and_cookie() {
    let app = TestApp::new(true).await;

    let request = http::Request::builder()
        .method("POST")
        .uri("/audit/clear")
        .header("token", "secretA")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = http::Request::builder()
        .method("POST")
        .uri("/audit/clear")
        .header("cookie", "token=secretA")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unload_via_api_removes_plugin_routes() {
    let app = TestApp::new(true).await;

    let (status, body) = app
        .request("DELETE", "/api/plugins/audit?token=secretA", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unloaded"], "audit");
    assert!(app.engine.get_plugin("audit").await.is_none());

    let (status, _) = app.request("GET", "/audit/recent", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The other plugin's routes are untouched.
    let (status, _) = app.request("GET", "/ops/status?token=secretA", None).await;
    assert_ne!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unload_endpoint_requires_admin_token() {
    let app = TestApp::new(true).await;

    let (status, _) = app.request("DELETE", "/api/plugins/audit", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request("DELETE", "/api/plugins/audit?token=secretB", None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unloading_unknown_plugin_is_not_found() {
    let app = TestApp::new(false).await;
    let (status, body) = app.request("DELETE", "/api/plugins/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}
