use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::error::SchedulingError;
use crate::models::{RegisterDoctorRequest, UpsertClinicHoursRequest};
use crate::router::SchedulingCellState;
use crate::services::slots::generate_slots;

#[derive(Debug, Deserialize)]
pub struct DaySlotsQuery {
    pub date: NaiveDate,
}

fn map_scheduling_error(e: SchedulingError) -> AppError {
    match e {
        SchedulingError::ValidationError(_) => AppError::BadRequest(e.to_string()),
        SchedulingError::HoursNotFound(_) | SchedulingError::DoctorNotFound(_) => {
            AppError::NotFound(e.to_string())
        }
    }
}

#[axum::debug_handler]
pub async fn upsert_clinic_hours(
    State(state): State<SchedulingCellState>,
    Path(clinic_id): Path<Uuid>,
    Json(request): Json<UpsertClinicHoursRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .directory
        .upsert_hours(request.into_hours(clinic_id))
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "clinic_id": clinic_id,
        "message": "Opening hours saved"
    })))
}

#[axum::debug_handler]
pub async fn get_clinic_hours(
    State(state): State<SchedulingCellState>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let hours = state
        .directory
        .require_hours(clinic_id)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!(hours)))
}

#[axum::debug_handler]
pub async fn register_doctor(
    State(state): State<SchedulingCellState>,
    Json(request): Json<RegisterDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor = request.into_doctor();

    state
        .directory
        .upsert_doctor(doctor.clone())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "doctor": doctor,
        "message": "Doctor registered"
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<SchedulingCellState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor = state
        .directory
        .require_doctor(doctor_id)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({ "doctor": doctor })))
}

#[axum::debug_handler]
pub async fn list_clinic_doctors(
    State(state): State<SchedulingCellState>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctors = state.directory.doctors_for_clinic(clinic_id).await;

    Ok(Json(json!({
        "clinic_id": clinic_id,
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_day_slots(
    State(state): State<SchedulingCellState>,
    Path(clinic_id): Path<Uuid>,
    Query(query): Query<DaySlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let hours = state
        .directory
        .require_hours(clinic_id)
        .await
        .map_err(map_scheduling_error)?;

    let slots = generate_slots(&hours, query.date, Utc::now());

    Ok(Json(json!({
        "clinic_id": clinic_id,
        "date": query.date,
        "slots": slots,
        "total": slots.len()
    })))
}
