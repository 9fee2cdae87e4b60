use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};
use tokio::sync::broadcast;

use appointment_cell::router::{create_appointment_router, AppointmentCellState};
use appointment_cell::services::{AppointmentStore, BookingService};
use queue_cell::router::{create_queue_router, QueueCellState};
use queue_cell::services::{QueuePositionNotifier, QueueService};
use scheduling_cell::router::{create_scheduling_router, SchedulingCellState};
use scheduling_cell::services::ClinicDirectory;
use session_cell::models::SessionChange;
use session_cell::router::{create_session_router, SessionCellState};
use session_cell::services::{HttpIdentityGateway, SessionGuardService};
use shared_config::AppConfig;

/// Every cell's services, built once at startup. Clones share the same
/// underlying stores, so the booking, queue, and session cells all
/// operate on one consistent world.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub directory: ClinicDirectory,
    pub store: AppointmentStore,
    pub booking: BookingService,
    pub queue: QueueService,
    pub notifier: QueuePositionNotifier,
    pub guard: SessionGuardService,
}

pub fn build_state(config: Arc<AppConfig>) -> AppState {
    let directory = ClinicDirectory::new();
    let store = AppointmentStore::new();
    let booking = BookingService::new(directory.clone(), store.clone());
    let queue = QueueService::new(store.clone());
    let notifier = QueuePositionNotifier::new(queue.clone());

    // One session change channel shared by the gateway (producer) and the
    // guard's listener (consumer).
    let (changes, _) = broadcast::channel::<SessionChange>(32);
    let gateway = Arc::new(HttpIdentityGateway::new(&config, changes.clone()));
    let guard = SessionGuardService::new(gateway, changes, config.auth_jwt_secret.clone());

    AppState {
        config,
        directory,
        store,
        booking,
        queue,
        notifier,
        guard,
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "ClinicFlow API is running!" }))
        .nest(
            "/scheduling",
            create_scheduling_router(SchedulingCellState {
                config: state.config.clone(),
                directory: state.directory.clone(),
            }),
        )
        .nest(
            "/appointments",
            create_appointment_router(AppointmentCellState {
                config: state.config.clone(),
                booking: state.booking.clone(),
                store: state.store.clone(),
            }),
        )
        .nest(
            "/queue",
            create_queue_router(QueueCellState {
                config: state.config.clone(),
                queue: state.queue.clone(),
                notifier: state.notifier.clone(),
            }),
        )
        .nest(
            "/session",
            create_session_router(SessionCellState {
                config: state.config.clone(),
                guard: state.guard.clone(),
            }),
        )
}
