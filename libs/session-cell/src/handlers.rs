// libs/session-cell/src/handlers.rs
use axum::{extract::State, Json};
use serde_json::{json, Value};

use shared_models::error::AppError;

use crate::error::SessionError;
use crate::models::{AdoptSessionRequest, ProvisionRequest};
use crate::router::SessionCellState;

fn map_session_error(e: SessionError) -> AppError {
    match &e {
        SessionError::InvalidToken(_) => AppError::Auth(e.to_string()),
        SessionError::NoActiveSession => AppError::BadRequest(e.to_string()),
        SessionError::ProvisioningInProgress | SessionError::GuardFailed => {
            AppError::Conflict(e.to_string())
        }
        SessionError::SignupRejected { .. } => AppError::BadRequest(e.to_string()),
        SessionError::GatewayError(_) => AppError::ExternalService(e.to_string()),
        SessionError::RestoreMismatch { .. } | SessionError::InvalidStateTransition { .. } => {
            AppError::Internal(e.to_string())
        }
    }
}

#[axum::debug_handler]
pub async fn adopt_session(
    State(state): State<SessionCellState>,
    Json(request): Json<AdoptSessionRequest>,
) -> Result<Json<Value>, AppError> {
    let session = state
        .guard
        .adopt_session(request)
        .await
        .map_err(map_session_error)?;

    Ok(Json(json!({
        "user": session.user,
        "message": "Session adopted"
    })))
}

#[axum::debug_handler]
pub async fn get_current_session(
    State(state): State<SessionCellState>,
) -> Result<Json<Value>, AppError> {
    let session = state
        .guard
        .current_session()
        .await
        .ok_or_else(|| AppError::NotFound("No active operator session".to_string()))?;

    let guard_state = state.guard.state().await;
    Ok(Json(json!({
        "user": session.user,
        "state": guard_state
    })))
}

#[axum::debug_handler]
pub async fn provision_identity(
    State(state): State<SessionCellState>,
    Json(request): Json<ProvisionRequest>,
) -> Result<Json<Value>, AppError> {
    let identity = state
        .guard
        .provision_identity(request)
        .await
        .map_err(map_session_error)?;

    Ok(Json(json!({
        "identity": identity,
        "message": "Identity provisioned, operator session preserved"
    })))
}

#[axum::debug_handler]
pub async fn reset_guard(
    State(state): State<SessionCellState>,
) -> Result<Json<Value>, AppError> {
    let guard_state = state.guard.reset().await.map_err(map_session_error)?;

    Ok(Json(json!({
        "state": guard_state,
        "message": "Session guard reset"
    })))
}

#[axum::debug_handler]
pub async fn get_guard_state(
    State(state): State<SessionCellState>,
) -> Result<Json<Value>, AppError> {
    let guard_state = state.guard.state().await;
    let has_active_session = state.guard.current_session().await.is_some();

    Ok(Json(json!({
        "state": guard_state,
        "has_active_session": has_active_session
    })))
}
