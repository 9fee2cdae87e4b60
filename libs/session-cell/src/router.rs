use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::SessionGuardService;

#[derive(Clone)]
pub struct SessionCellState {
    pub config: Arc<AppConfig>,
    pub guard: SessionGuardService,
}

pub fn create_session_router(state: SessionCellState) -> Router {
    // Adoption validates the submitted token itself, so it is the one
    // route that stays outside the auth middleware.
    let public_routes = Router::new().route("/adopt", post(handlers::adopt_session));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/current", get(handlers::get_current_session))
        .route("/provision", post(handlers::provision_identity))
        .route("/reset", post(handlers::reset_guard))
        .route("/state", get(handlers::get_guard_state))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
