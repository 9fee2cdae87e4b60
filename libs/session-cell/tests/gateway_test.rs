// libs/session-cell/tests/gateway_test.rs
// HTTP gateway seam: signup parsing, failure surfaces, change broadcast

use std::time::Duration;

use assert_matches::assert_matches;
use tokio::sync::broadcast;
use tokio::time::timeout;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use serde_json::json;
use session_cell::error::SessionError;
use session_cell::models::{ProvisionRequest, SessionChange};
use session_cell::services::gateway::IdentityGateway;
use session_cell::services::HttpIdentityGateway;
use shared_config::AppConfig;
use shared_utils::test_utils::{MockGatewayResponses, TestConfig};

fn gateway_config(server: &MockServer) -> AppConfig {
    TestConfig {
        gateway_url: server.uri(),
        ..TestConfig::default()
    }
    .to_app_config()
}

fn provision_request() -> ProvisionRequest {
    ProvisionRequest {
        email: "newcomer@clinic.test".to_string(),
        password: "pw-123456".to_string(),
        role: "patient".to_string(),
    }
}

#[tokio::test]
async fn signup_success_returns_identity_and_announces_it() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(header("apikey", "test-anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockGatewayResponses::signup_response("prov-user-1", "newcomer@clinic.test"),
        ))
        .mount(&mock_server)
        .await;

    let (changes, mut receiver) = broadcast::channel::<SessionChange>(8);
    let gateway = HttpIdentityGateway::new(&gateway_config(&mock_server), changes);

    let (identity, tokens) = gateway
        .create_identity(&provision_request())
        .await
        .expect("signup accepted");

    assert_eq!(identity.user_id, "prov-user-1");
    assert_eq!(identity.email, "newcomer@clinic.test");
    assert_eq!(tokens.access_token, "access-token-prov-user-1");
    assert_eq!(tokens.refresh_token, "refresh-token-prov-user-1");

    // The fresh session goes out on the shared channel like any sign-in.
    let change = timeout(Duration::from_secs(1), receiver.recv())
        .await
        .expect("broadcast within deadline")
        .expect("channel open");
    assert_eq!(change.user_id, identity.user_id);
    assert_eq!(change.tokens.access_token, tokens.access_token);
}

#[tokio::test]
async fn signup_rejection_surfaces_the_gateway_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(422).set_body_json(
            MockGatewayResponses::signup_error_response(422, "User already registered"),
        ))
        .mount(&mock_server)
        .await;

    let (changes, mut receiver) = broadcast::channel::<SessionChange>(8);
    let gateway = HttpIdentityGateway::new(&gateway_config(&mock_server), changes);

    let result = gateway.create_identity(&provision_request()).await;

    assert_matches!(
        result,
        Err(SessionError::SignupRejected { status: 422, message })
            if message == "User already registered"
    );
    assert_matches!(
        receiver.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    );
}

#[tokio::test]
async fn rejection_without_msg_field_falls_back_to_the_raw_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&mock_server)
        .await;

    let (changes, _receiver) = broadcast::channel::<SessionChange>(8);
    let gateway = HttpIdentityGateway::new(&gateway_config(&mock_server), changes);

    let result = gateway.create_identity(&provision_request()).await;

    assert_matches!(
        result,
        Err(SessionError::SignupRejected { status: 503, message })
            if message == "upstream unavailable"
    );
}

#[tokio::test]
async fn unreachable_gateway_is_a_gateway_error() {
    let config = TestConfig {
        // Discard port; nothing is listening there.
        gateway_url: "http://127.0.0.1:9".to_string(),
        ..TestConfig::default()
    }
    .to_app_config();

    let (changes, _receiver) = broadcast::channel::<SessionChange>(8);
    let gateway = HttpIdentityGateway::new(&config, changes);

    let result = gateway.create_identity(&provision_request()).await;

    assert_matches!(result, Err(SessionError::GatewayError(_)));
}

#[tokio::test]
async fn malformed_success_body_is_a_gateway_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "unexpected": "shape"
        })))
        .mount(&mock_server)
        .await;

    let (changes, mut receiver) = broadcast::channel::<SessionChange>(8);
    let gateway = HttpIdentityGateway::new(&gateway_config(&mock_server), changes);

    let result = gateway.create_identity(&provision_request()).await;

    assert_matches!(result, Err(SessionError::GatewayError(_)));
    assert_matches!(
        receiver.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    );
}
