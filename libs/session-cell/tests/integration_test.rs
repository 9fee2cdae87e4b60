// libs/session-cell/tests/integration_test.rs
// Full HTTP round trips through the session router, gateway mocked

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use session_cell::models::SessionChange;
use session_cell::router::{create_session_router, SessionCellState};
use session_cell::services::{HttpIdentityGateway, SessionGuardService};
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockGatewayResponses, TestConfig, TestUser};

fn test_app(config: AppConfig) -> Router {
    let config = Arc::new(config);
    let (changes, _) = broadcast::channel::<SessionChange>(8);
    let gateway = Arc::new(HttpIdentityGateway::new(&config, changes.clone()));
    let guard = SessionGuardService::new(gateway, changes, config.auth_jwt_secret.clone());

    create_session_router(SessionCellState { config, guard })
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed_post_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed_get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn adopt_operator(app: &Router, config: &AppConfig) -> (TestUser, String) {
    let operator = TestUser::staff("front-desk@clinic.test");
    let token = JwtTestUtils::create_test_token(&operator, &config.auth_jwt_secret, Some(24));

    let response = app
        .clone()
        .oneshot(post_json(
            "/adopt",
            json!({
                "access_token": token,
                "refresh_token": "front-desk-refresh"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    (operator, token)
}

#[tokio::test]
async fn test_adopt_endpoint_accepts_a_valid_session() {
    let config = TestConfig::default().to_app_config();
    let app = test_app(config.clone());

    let operator = TestUser::staff("front-desk@clinic.test");
    let token = JwtTestUtils::create_test_token(&operator, &config.auth_jwt_secret, Some(24));

    let response = app
        .oneshot(post_json(
            "/adopt",
            json!({
                "access_token": token,
                "refresh_token": "front-desk-refresh"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["user"]["id"], operator.id);
    assert_eq!(body["message"], "Session adopted");
}

#[tokio::test]
async fn test_adopt_endpoint_rejects_an_expired_token() {
    let config = TestConfig::default().to_app_config();
    let app = test_app(config.clone());

    let operator = TestUser::staff("front-desk@clinic.test");
    let token = JwtTestUtils::create_expired_token(&operator, &config.auth_jwt_secret);

    let response = app
        .oneshot(post_json(
            "/adopt",
            json!({
                "access_token": token,
                "refresh_token": "front-desk-refresh"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_authentication() {
    let config = TestConfig::default().to_app_config();
    let app = test_app(config);

    for request in [
        Request::builder()
            .method("GET")
            .uri("/state")
            .body(Body::empty())
            .unwrap(),
        Request::builder()
            .method("GET")
            .uri("/current")
            .body(Body::empty())
            .unwrap(),
        post_json(
            "/provision",
            json!({
                "email": "newcomer@clinic.test",
                "password": "pw-123456",
                "role": "patient"
            }),
        ),
        Request::builder()
            .method("POST")
            .uri("/reset")
            .body(Body::empty())
            .unwrap(),
    ] {
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_guard_state_endpoint_reports_idle() {
    let config = TestConfig::default().to_app_config();
    let app = test_app(config.clone());

    let staff = TestUser::staff("front-desk@clinic.test");
    let token = JwtTestUtils::create_test_token(&staff, &config.auth_jwt_secret, Some(24));

    let response = app.oneshot(authed_get("/state", &token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["state"], "idle");
    assert_eq!(body["has_active_session"], false);
}

#[tokio::test]
async fn test_current_without_a_session_is_not_found() {
    let config = TestConfig::default().to_app_config();
    let app = test_app(config.clone());

    let staff = TestUser::staff("front-desk@clinic.test");
    let token = JwtTestUtils::create_test_token(&staff, &config.auth_jwt_secret, Some(24));

    let response = app.oneshot(authed_get("/current", &token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_provision_flow_preserves_the_operator() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockGatewayResponses::signup_response("prov-user-1", "newcomer@clinic.test"),
        ))
        .mount(&mock_server)
        .await;

    let config = TestConfig {
        gateway_url: mock_server.uri(),
        ..TestConfig::default()
    }
    .to_app_config();
    let app = test_app(config.clone());
    let (operator, token) = adopt_operator(&app, &config).await;

    let response = app
        .clone()
        .oneshot(authed_post_json(
            "/provision",
            &token,
            json!({
                "email": "newcomer@clinic.test",
                "password": "pw-123456",
                "role": "patient"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["identity"]["user_id"], "prov-user-1");
    assert_eq!(body["identity"]["email"], "newcomer@clinic.test");

    // The operator is still the active session and the guard is idle again.
    let current = app
        .clone()
        .oneshot(authed_get("/current", &token))
        .await
        .unwrap();
    assert_eq!(current.status(), StatusCode::OK);
    let current_body = response_json(current).await;
    assert_eq!(current_body["user"]["id"], operator.id);
    assert_eq!(current_body["state"], "idle");

    let state = app.oneshot(authed_get("/state", &token)).await.unwrap();
    let state_body = response_json(state).await;
    assert_eq!(state_body["state"], "idle");
    assert_eq!(state_body["has_active_session"], true);
}

#[tokio::test]
async fn test_provision_rejection_maps_to_bad_request() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(422).set_body_json(
            MockGatewayResponses::signup_error_response(422, "User already registered"),
        ))
        .mount(&mock_server)
        .await;

    let config = TestConfig {
        gateway_url: mock_server.uri(),
        ..TestConfig::default()
    }
    .to_app_config();
    let app = test_app(config.clone());
    let (_operator, token) = adopt_operator(&app, &config).await;

    let response = app
        .clone()
        .oneshot(authed_post_json(
            "/provision",
            &token,
            json!({
                "email": "dupe@clinic.test",
                "password": "pw-123456",
                "role": "patient"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("User already registered"));

    // A failed call leaves the guard usable.
    let state = app.oneshot(authed_get("/state", &token)).await.unwrap();
    let state_body = response_json(state).await;
    assert_eq!(state_body["state"], "idle");
    assert_eq!(state_body["has_active_session"], true);
}
