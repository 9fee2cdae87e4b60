use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::ClinicDirectory;

#[derive(Clone)]
pub struct SchedulingCellState {
    pub config: Arc<AppConfig>,
    pub directory: ClinicDirectory,
}

pub fn create_scheduling_router(state: SchedulingCellState) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/clinics/{clinic_id}/slots", get(handlers::get_day_slots));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/clinics/{clinic_id}/hours", put(handlers::upsert_clinic_hours))
        .route("/clinics/{clinic_id}/hours", get(handlers::get_clinic_hours))
        .route("/clinics/{clinic_id}/doctors", get(handlers::list_clinic_doctors))
        .route("/doctors", post(handlers::register_doctor))
        .route("/doctors/{doctor_id}", get(handlers::get_doctor))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
