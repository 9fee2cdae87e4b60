// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::{AppointmentStore, BookingService};

#[derive(Clone)]
pub struct AppointmentCellState {
    pub config: Arc<AppConfig>,
    pub booking: BookingService,
    pub store: AppointmentStore,
}

pub fn create_appointment_router(state: AppointmentCellState) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route(
            "/{appointment_id}/reschedule",
            patch(handlers::reschedule_appointment),
        )
        // Appointment listings
        .route("/patients/{patient_id}", get(handlers::list_patient_appointments))
        .route("/clinics/{clinic_id}", get(handlers::list_clinic_appointments))
        // Capacity-aware slot lookup
        .route(
            "/doctors/{doctor_id}/availability",
            get(handlers::get_doctor_availability),
        )
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    Router::new().merge(protected_routes).with_state(state)
}
