// libs/session-cell/src/services/gateway.rs
// Identity provisioning against the GoTrue-style auth gateway. Creating an
// identity signs that identity in, and the gateway announces the fresh
// session on the shared change channel like any other sign-in.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::error::SessionError;
use crate::models::{ProvisionRequest, ProvisionedIdentity, SessionChange, SessionTokens};

#[async_trait]
pub trait IdentityGateway: Send + Sync {
    async fn create_identity(
        &self,
        request: &ProvisionRequest,
    ) -> Result<(ProvisionedIdentity, SessionTokens), SessionError>;
}

#[derive(Debug, Deserialize)]
struct SignupResponse {
    access_token: String,
    refresh_token: String,
    user: SignupUser,
}

#[derive(Debug, Deserialize)]
struct SignupUser {
    id: String,
    email: String,
}

pub struct HttpIdentityGateway {
    client: Client,
    base_url: String,
    anon_key: String,
    changes: broadcast::Sender<SessionChange>,
}

impl HttpIdentityGateway {
    pub fn new(config: &AppConfig, changes: broadcast::Sender<SessionChange>) -> Self {
        Self {
            client: Client::new(),
            base_url: config.auth_gateway_url.clone(),
            anon_key: config.auth_gateway_anon_key.clone(),
            changes,
        }
    }
}

#[async_trait]
impl IdentityGateway for HttpIdentityGateway {
    async fn create_identity(
        &self,
        request: &ProvisionRequest,
    ) -> Result<(ProvisionedIdentity, SessionTokens), SessionError> {
        let url = format!("{}/auth/v1/signup", self.base_url);
        debug!("Creating identity for {} via {}", request.email, url);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&json!({
                "email": request.email,
                "password": request.password,
                "data": { "role": request.role }
            }))
            .send()
            .await
            .map_err(|e| SessionError::GatewayError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Signup rejected ({}): {}", status, body);

            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("msg").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or(body);
            return Err(SessionError::SignupRejected {
                status: status.as_u16(),
                message,
            });
        }

        let signup: SignupResponse = response
            .json()
            .await
            .map_err(|e| SessionError::GatewayError(e.to_string()))?;

        let identity = ProvisionedIdentity {
            user_id: signup.user.id,
            email: signup.user.email,
        };
        let tokens = SessionTokens {
            access_token: signup.access_token,
            refresh_token: signup.refresh_token,
        };

        // Every listener hears about the new session, the operator's own
        // listener included.
        let change = SessionChange {
            user_id: identity.user_id.clone(),
            tokens: tokens.clone(),
        };
        if self.changes.send(change).is_err() {
            debug!("No listeners on the session change channel");
        }

        info!("Created identity {} for {}", identity.user_id, identity.email);
        Ok((identity, tokens))
    }
}
