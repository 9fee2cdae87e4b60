// libs/session-cell/src/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use shared_models::auth::User;

// ============================================================================
// CORE SESSION MODELS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// The authenticated operator the guard is protecting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorSession {
    pub user: User,
    pub tokens: SessionTokens,
}

/// Copy of the operator's session taken just before a provisioning call.
/// At most one snapshot exists at a time.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session: OperatorSession,
    pub taken_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    Idle,
    Suspended,
    Verifying,
    Failed,
}

impl GuardState {
    pub fn can_transition_to(&self, target: &GuardState) -> bool {
        use GuardState::*;
        match (self, target) {
            (Idle, Suspended) => true,
            // Gateway failure aborts the suspend window straight back to idle.
            (Suspended, Idle) => true,
            (Suspended, Verifying) => true,
            (Verifying, Idle) => true,
            (Verifying, Failed) => true,
            // Reset is the only way out of a failed restore.
            (Failed, Idle) => true,
            _ => false,
        }
    }
}

impl fmt::Display for GuardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardState::Idle => write!(f, "idle"),
            GuardState::Suspended => write!(f, "suspended"),
            GuardState::Verifying => write!(f, "verifying"),
            GuardState::Failed => write!(f, "failed"),
        }
    }
}

/// Broadcast on the shared auth channel whenever any session is created or
/// altered, including sessions the operator never asked to adopt.
#[derive(Debug, Clone)]
pub struct SessionChange {
    pub user_id: String,
    pub tokens: SessionTokens,
}

// ============================================================================
// REQUEST MODELS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionRequest {
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionedIdentity {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdoptSessionRequest {
    pub access_token: String,
    pub refresh_token: String,
}
