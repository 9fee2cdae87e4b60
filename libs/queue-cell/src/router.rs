use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::{QueuePositionNotifier, QueueService};

#[derive(Clone)]
pub struct QueueCellState {
    pub config: Arc<AppConfig>,
    pub queue: QueueService,
    pub notifier: QueuePositionNotifier,
}

pub fn create_queue_router(state: QueueCellState) -> Router {
    // Public routes: the waiting-room screen polls these, and EventSource
    // cannot attach an Authorization header.
    let public_routes = Router::new()
        .route("/position/{appointment_id}", get(handlers::get_position))
        .route(
            "/position/{appointment_id}/stream",
            get(handlers::stream_position),
        );

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/check-in", post(handlers::check_in))
        .route("/clinic/{clinic_id}", get(handlers::get_clinic_queue))
        .route("/clinic/{clinic_id}/overview", get(handlers::get_queue_overview))
        .route(
            "/clinic/{clinic_id}/currently-serving",
            get(handlers::get_currently_serving),
        )
        .route("/clinic/{clinic_id}/count", get(handlers::get_queue_count))
        .route("/clinic/{clinic_id}/missed", get(handlers::get_missed_entries))
        .route("/clinic/{clinic_id}/call-next", post(handlers::call_next))
        .route(
            "/appointments/{appointment_id}/call",
            post(handlers::call_by_appointment),
        )
        .route("/appointments/{appointment_id}/done", post(handlers::mark_done))
        .route(
            "/appointments/{appointment_id}/requeue",
            post(handlers::requeue_appointment),
        )
        .route(
            "/appointments/{appointment_id}/cancel",
            post(handlers::cancel_appointment),
        )
        .route(
            "/appointments/{appointment_id}/no-show",
            post(handlers::mark_no_show),
        )
        .route(
            "/appointments/{appointment_id}/history",
            get(handlers::get_queue_history),
        )
        .route("/entries/{queue_id}/missed", post(handlers::mark_missed))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
