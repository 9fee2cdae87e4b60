// libs/queue-cell/src/handlers.rs
use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::error;
use uuid::Uuid;

use appointment_cell::AppointmentError;
use shared_models::error::AppError;

use crate::error::QueueError;
use crate::models::{CheckInRequest, QueuePosition, RequeueRequest};
use crate::router::QueueCellState;

fn map_queue_error(e: QueueError) -> AppError {
    match &e {
        QueueError::AppointmentNotFound(_) | QueueError::EntryNotFound(_) => {
            AppError::NotFound(e.to_string())
        }
        QueueError::AlreadyQueued(_)
        | QueueError::AlreadyServing { .. }
        | QueueError::InvalidStatusTransition { .. }
        | QueueError::NotCancellable { .. }
        | QueueError::StillQueued { .. } => AppError::Conflict(e.to_string()),
        QueueError::NotInQueue(_) | QueueError::NotMissed(_) | QueueError::NotCheckable { .. } => {
            AppError::BadRequest(e.to_string())
        }
        QueueError::Appointment(inner) => match inner {
            AppointmentError::NotFound(_) => AppError::NotFound(e.to_string()),
            AppointmentError::InvalidStatusTransition { .. } => AppError::Conflict(e.to_string()),
            _ => AppError::Internal(e.to_string()),
        },
    }
}

// ============================================================================
// CHECK-IN AND REQUEUE
// ============================================================================

#[axum::debug_handler]
pub async fn check_in(
    State(state): State<QueueCellState>,
    Json(request): Json<CheckInRequest>,
) -> Result<Json<Value>, AppError> {
    let entry = state
        .queue
        .check_in(request.appointment_id, request.priority)
        .await
        .map_err(map_queue_error)?;

    Ok(Json(json!({
        "entry": entry,
        "message": "Checked in to queue"
    })))
}

#[axum::debug_handler]
pub async fn requeue_appointment(
    State(state): State<QueueCellState>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RequeueRequest>,
) -> Result<Json<Value>, AppError> {
    let entry = state
        .queue
        .requeue(appointment_id, request.priority)
        .await
        .map_err(map_queue_error)?;

    Ok(Json(json!({
        "entry": entry,
        "message": "Returned to queue"
    })))
}

// ============================================================================
// RECEPTION CALL FLOW
// ============================================================================

#[axum::debug_handler]
pub async fn call_next(
    State(state): State<QueueCellState>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let called = state
        .queue
        .call_next(clinic_id)
        .await
        .map_err(map_queue_error)?;

    match called {
        Some(entry) => Ok(Json(json!({
            "entry": entry,
            "message": "Patient called"
        }))),
        None => Ok(Json(json!({
            "clinic_id": clinic_id,
            "status": "QUEUE_EMPTY",
            "message": "Queue is empty"
        }))),
    }
}

#[axum::debug_handler]
pub async fn call_by_appointment(
    State(state): State<QueueCellState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = state
        .queue
        .call_by_appointment(appointment_id)
        .await
        .map_err(map_queue_error)?;

    Ok(Json(json!({
        "entry": entry,
        "message": "Patient called"
    })))
}

// ============================================================================
// SETTLEMENT
// ============================================================================

#[axum::debug_handler]
pub async fn mark_done(
    State(state): State<QueueCellState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let settled = state
        .queue
        .mark_done(appointment_id)
        .await
        .map_err(map_queue_error)?;

    match settled {
        Some(entry) => Ok(Json(json!({
            "entry": entry,
            "message": "Consultation completed"
        }))),
        None => Ok(Json(json!({
            "appointment_id": appointment_id,
            "updated": false,
            "message": "No active queue entry for this appointment"
        }))),
    }
}

#[axum::debug_handler]
pub async fn mark_missed(
    State(state): State<QueueCellState>,
    Path(queue_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = state
        .queue
        .mark_missed(queue_id)
        .await
        .map_err(map_queue_error)?;

    Ok(Json(json!({
        "entry": entry,
        "message": "Marked as missed"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<QueueCellState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .queue
        .cancel_appointment(appointment_id)
        .await
        .map_err(map_queue_error)?;

    Ok(Json(json!({
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(state): State<QueueCellState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .queue
        .mark_no_show(appointment_id)
        .await
        .map_err(map_queue_error)?;

    Ok(Json(json!({
        "appointment": appointment,
        "message": "Marked as no-show"
    })))
}

// ============================================================================
// QUEUE VIEWS
// ============================================================================

#[axum::debug_handler]
pub async fn get_clinic_queue(
    State(state): State<QueueCellState>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let queue = state.queue.clinic_queue(clinic_id).await;

    Ok(Json(json!({
        "clinic_id": clinic_id,
        "total_in_queue": queue.len(),
        "queue": queue
    })))
}

#[axum::debug_handler]
pub async fn get_queue_overview(
    State(state): State<QueueCellState>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let currently_serving = state.queue.currently_serving(clinic_id).await;
    let queue = state.queue.queue_overview(clinic_id).await;

    Ok(Json(json!({
        "clinic_id": clinic_id,
        "currently_serving": currently_serving,
        "total_waiting": queue.len(),
        "queue": queue
    })))
}

#[axum::debug_handler]
pub async fn get_currently_serving(
    State(state): State<QueueCellState>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    match state.queue.currently_serving(clinic_id).await {
        Some(entry) => Ok(Json(json!({
            "clinic_id": clinic_id,
            "status": "SERVING",
            "entry": entry
        }))),
        None => Ok(Json(json!({
            "clinic_id": clinic_id,
            "status": "QUEUE_EMPTY"
        }))),
    }
}

#[axum::debug_handler]
pub async fn get_queue_count(
    State(state): State<QueueCellState>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let count = state.queue.queue_count(clinic_id).await;

    Ok(Json(json!({
        "clinic_id": clinic_id,
        "count": count
    })))
}

#[axum::debug_handler]
pub async fn get_missed_entries(
    State(state): State<QueueCellState>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let missed = state.queue.missed_entries(clinic_id).await;

    Ok(Json(json!({
        "clinic_id": clinic_id,
        "total_missed": missed.len(),
        "missed": missed
    })))
}

#[axum::debug_handler]
pub async fn get_queue_history(
    State(state): State<QueueCellState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let history = state.queue.history(appointment_id).await;

    Ok(Json(json!({
        "appointment_id": appointment_id,
        "total_entries": history.len(),
        "history": history
    })))
}

// ============================================================================
// LIVE POSITION
// ============================================================================

#[axum::debug_handler]
pub async fn get_position(
    State(state): State<QueueCellState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<QueuePosition>, AppError> {
    Ok(Json(state.queue.position(appointment_id).await))
}

/// Server-sent position feed. Pushes the current position immediately,
/// then one `queue-update` event per recomputation until the client
/// disconnects.
pub async fn stream_position(
    State(state): State<QueueCellState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (snapshot, receiver) = state
        .notifier
        .subscribe(appointment_id)
        .await
        .map_err(map_queue_error)?;

    let initial = stream::once(async move { position_event(&snapshot) });
    let updates = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(position) => return Some((position_event(&position), receiver)),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(initial.chain(updates)).keep_alive(KeepAlive::default()))
}

fn position_event(position: &QueuePosition) -> Result<Event, Infallible> {
    match Event::default().event("queue-update").json_data(position) {
        Ok(event) => Ok(event),
        Err(e) => {
            error!("Failed to serialize queue position: {}", e);
            Ok(Event::default().event("queue-update").data("{}"))
        }
    }
}
