// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::error::AppointmentError;
use crate::models::{BookAppointmentRequest, RescheduleRequest};
use crate::router::AppointmentCellState;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
    pub exclude_appointment: Option<Uuid>,
}

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound(_)
        | AppointmentError::UnknownClinic(_)
        | AppointmentError::DoctorNotFound(_) => AppError::NotFound(e.to_string()),
        AppointmentError::InvalidStatusTransition { .. }
        | AppointmentError::SlotFull(_)
        | AppointmentError::DoubleBooked(_)
        | AppointmentError::NotReschedulable { .. } => AppError::Conflict(e.to_string()),
        AppointmentError::DoctorClinicMismatch { .. }
        | AppointmentError::DoctorNotRostered { .. }
        | AppointmentError::StartsInPast
        | AppointmentError::NotASlot(_)
        | AppointmentError::ValidationError(_) => AppError::BadRequest(e.to_string()),
    }
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentCellState>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .book(request)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointment": appointment,
        "message": "Appointment booked"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .store
        .require(appointment_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({ "appointment": appointment })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .reschedule(appointment_id, request.starts_at)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointment": appointment,
        "message": "Appointment rescheduled"
    })))
}

#[axum::debug_handler]
pub async fn list_patient_appointments(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    // Patients may only read their own bookings; staff can read any.
    let is_staff = matches!(user.role.as_deref(), Some("staff") | Some("admin"));
    if !is_staff && user.id != patient_id.to_string() {
        return Err(AppError::Auth(
            "Not authorized to view these appointments".to_string(),
        ));
    }

    let appointments = state.store.list_by_patient(patient_id).await;

    Ok(Json(json!({
        "patient_id": patient_id,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn list_clinic_appointments(
    State(state): State<AppointmentCellState>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointments = state.store.list_by_clinic(clinic_id).await;

    Ok(Json(json!({
        "clinic_id": clinic_id,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_availability(
    State(state): State<AppointmentCellState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = state
        .booking
        .availability_for(doctor_id, query.date, query.exclude_appointment)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "slots": slots,
        "total": slots.len()
    })))
}
