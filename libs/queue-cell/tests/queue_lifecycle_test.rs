// libs/queue-cell/tests/queue_lifecycle_test.rs
// Settlement and recovery flows: done, missed, requeue, cancel, no-show

use assert_matches::assert_matches;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentStatus};
use appointment_cell::services::AppointmentStore;
use queue_cell::error::QueueError;
use queue_cell::models::{QueuePosition, QueuePriority, QueueStatus};
use queue_cell::services::QueueService;

fn utc(s: &str) -> DateTime<Utc> {
    s.parse().expect("valid RFC3339 timestamp")
}

async fn setup() -> (QueueService, AppointmentStore, Uuid) {
    let store = AppointmentStore::new();
    let service = QueueService::new(store.clone());
    let clinic_id = Uuid::new_v4();
    (service, store, clinic_id)
}

async fn scheduled_appointment(store: &AppointmentStore, clinic_id: Uuid) -> Uuid {
    let appointment = Appointment::new(
        Uuid::new_v4(),
        clinic_id,
        None,
        utc("2099-06-02T09:00:00Z"),
    );
    let id = appointment.id;
    store.insert(appointment).await;
    id
}

/// Walks an appointment through check-in, call, and a missed call.
async fn checked_in_and_missed(
    service: &QueueService,
    store: &AppointmentStore,
    clinic_id: Uuid,
) -> Uuid {
    let appointment_id = scheduled_appointment(store, clinic_id).await;
    service
        .check_in(appointment_id, QueuePriority::Normal)
        .await
        .unwrap();
    let called = service.call_by_appointment(appointment_id).await.unwrap();
    service.mark_missed(called.queue_id).await.unwrap();
    appointment_id
}

// ============================================================================
// MARK DONE
// ============================================================================

#[tokio::test]
async fn mark_done_settles_entry_and_appointment() {
    let (service, store, clinic_id) = setup().await;
    let appointment_id = scheduled_appointment(&store, clinic_id).await;
    service
        .check_in(appointment_id, QueuePriority::Normal)
        .await
        .unwrap();
    service.call_next(clinic_id).await.unwrap();

    let done = service.mark_done(appointment_id).await.unwrap().unwrap();

    assert_eq!(done.status, QueueStatus::Done);
    let appointment = store.get(appointment_id).await.unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Completed);
    assert!(service.currently_serving(clinic_id).await.is_none());
    assert_matches!(
        service.position(appointment_id).await,
        QueuePosition::NotInQueue { .. }
    );
}

#[tokio::test]
async fn mark_done_straight_from_waiting() {
    let (service, store, clinic_id) = setup().await;
    let appointment_id = scheduled_appointment(&store, clinic_id).await;
    service
        .check_in(appointment_id, QueuePriority::Normal)
        .await
        .unwrap();

    let done = service.mark_done(appointment_id).await.unwrap().unwrap();

    assert_eq!(done.status, QueueStatus::Done);
    let appointment = store.get(appointment_id).await.unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Completed);
}

#[tokio::test]
async fn mark_done_without_active_entry_is_noop() {
    let (service, store, clinic_id) = setup().await;
    let appointment_id = scheduled_appointment(&store, clinic_id).await;

    let done = service.mark_done(appointment_id).await.unwrap();

    assert!(done.is_none());
    let appointment = store.get(appointment_id).await.unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
}

// ============================================================================
// MARK MISSED
// ============================================================================

#[tokio::test]
async fn mark_missed_leaves_appointment_untouched() {
    let (service, store, clinic_id) = setup().await;
    let appointment_id = scheduled_appointment(&store, clinic_id).await;
    service
        .check_in(appointment_id, QueuePriority::Normal)
        .await
        .unwrap();
    let called = service.call_next(clinic_id).await.unwrap().unwrap();

    let missed = service.mark_missed(called.queue_id).await.unwrap();

    assert_eq!(missed.status, QueueStatus::Missed);
    // Missing the call does not forfeit the booking.
    let appointment = store.get(appointment_id).await.unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Called);
    assert!(service.currently_serving(clinic_id).await.is_none());
}

#[tokio::test]
async fn mark_missed_unknown_entry_rejected() {
    let (service, _store, _clinic_id) = setup().await;

    let result = service.mark_missed(Uuid::new_v4()).await;

    assert_matches!(result, Err(QueueError::EntryNotFound(_)));
}

#[tokio::test]
async fn mark_missed_rejects_settled_entry() {
    let (service, store, clinic_id) = setup().await;
    let appointment_id = scheduled_appointment(&store, clinic_id).await;
    let entry = service
        .check_in(appointment_id, QueuePriority::Normal)
        .await
        .unwrap();
    service.mark_done(appointment_id).await.unwrap();

    let result = service.mark_missed(entry.queue_id).await;

    assert_matches!(result, Err(QueueError::InvalidStatusTransition { .. }));
}

// ============================================================================
// REQUEUE
// ============================================================================

#[tokio::test]
async fn requeue_creates_fresh_entry_and_resets_appointment() {
    let (service, store, clinic_id) = setup().await;
    let appointment_id = checked_in_and_missed(&service, &store, clinic_id).await;

    let entry = service
        .requeue(appointment_id, QueuePriority::Elderly)
        .await
        .unwrap();

    assert_eq!(entry.status, QueueStatus::InQueue);
    assert_eq!(entry.priority, QueuePriority::Elderly);

    // The missed entry survives as history alongside the new one.
    let history = service.history(appointment_id).await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, QueueStatus::Missed);
    assert_eq!(history[1].status, QueueStatus::InQueue);
    assert_ne!(history[0].queue_id, history[1].queue_id);

    let appointment = store.get(appointment_id).await.unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn requeue_rejected_while_entry_active() {
    let (service, store, clinic_id) = setup().await;
    let appointment_id = scheduled_appointment(&store, clinic_id).await;
    service
        .check_in(appointment_id, QueuePriority::Normal)
        .await
        .unwrap();

    let result = service.requeue(appointment_id, QueuePriority::Normal).await;

    assert_matches!(result, Err(QueueError::AlreadyQueued(_)));
}

#[tokio::test]
async fn requeue_requires_missed_history() {
    let (service, store, clinic_id) = setup().await;
    let appointment_id = scheduled_appointment(&store, clinic_id).await;

    let result = service.requeue(appointment_id, QueuePriority::Normal).await;

    assert_matches!(result, Err(QueueError::NotMissed(_)));
}

#[tokio::test]
async fn requeue_rejected_after_visit_completed() {
    let (service, store, clinic_id) = setup().await;
    let appointment_id = scheduled_appointment(&store, clinic_id).await;
    service
        .check_in(appointment_id, QueuePriority::Normal)
        .await
        .unwrap();
    service.mark_done(appointment_id).await.unwrap();

    let result = service.requeue(appointment_id, QueuePriority::Normal).await;

    assert_matches!(result, Err(QueueError::NotCheckable { .. }));
}

// ============================================================================
// CANCELLATION AND NO-SHOW
// ============================================================================

#[tokio::test]
async fn cancel_settles_active_entry_as_missed() {
    let (service, store, clinic_id) = setup().await;
    let appointment_id = scheduled_appointment(&store, clinic_id).await;
    let entry = service
        .check_in(appointment_id, QueuePriority::Normal)
        .await
        .unwrap();

    let cancelled = service.cancel_appointment(appointment_id).await.unwrap();

    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    let history = service.history(appointment_id).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].queue_id, entry.queue_id);
    assert_eq!(history[0].status, QueueStatus::Missed);
    assert_matches!(
        service.position(appointment_id).await,
        QueuePosition::NotInQueue { .. }
    );
}

#[tokio::test]
async fn cancel_works_without_queue_entry() {
    let (service, store, clinic_id) = setup().await;
    let appointment_id = scheduled_appointment(&store, clinic_id).await;

    let cancelled = service.cancel_appointment(appointment_id).await.unwrap();

    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert!(service.history(appointment_id).await.is_empty());
}

#[tokio::test]
async fn cancel_rejected_for_terminal_appointment() {
    let (service, store, clinic_id) = setup().await;
    let appointment_id = scheduled_appointment(&store, clinic_id).await;
    service
        .check_in(appointment_id, QueuePriority::Normal)
        .await
        .unwrap();
    service.mark_done(appointment_id).await.unwrap();

    let result = service.cancel_appointment(appointment_id).await;

    assert_matches!(result, Err(QueueError::NotCancellable { .. }));
}

#[tokio::test]
async fn no_show_applies_to_unqueued_appointment() {
    let (service, store, clinic_id) = setup().await;
    let appointment_id = scheduled_appointment(&store, clinic_id).await;

    let updated = service.mark_no_show(appointment_id).await.unwrap();

    assert_eq!(updated.status, AppointmentStatus::NoShow);
}

#[tokio::test]
async fn no_show_rejected_while_patient_queued() {
    let (service, store, clinic_id) = setup().await;
    let appointment_id = scheduled_appointment(&store, clinic_id).await;
    service
        .check_in(appointment_id, QueuePriority::Normal)
        .await
        .unwrap();

    let result = service.mark_no_show(appointment_id).await;

    assert_matches!(result, Err(QueueError::StillQueued { .. }));

    // The queue entry is untouched by the failed attempt.
    assert_matches!(
        service.position(appointment_id).await,
        QueuePosition::Waiting { position: 1, .. }
    );
}

#[tokio::test]
async fn no_show_appointment_cannot_rejoin_queue_directly() {
    let (service, store, clinic_id) = setup().await;
    let appointment_id = scheduled_appointment(&store, clinic_id).await;
    service.mark_no_show(appointment_id).await.unwrap();

    // A no-show never queued, so there is no missed entry to requeue and
    // a direct check-in is rejected too.
    assert_matches!(
        service.check_in(appointment_id, QueuePriority::Normal).await,
        Err(QueueError::NotCheckable { .. })
    );
    assert_matches!(
        service.requeue(appointment_id, QueuePriority::Normal).await,
        Err(QueueError::NotMissed(_))
    );
}

// ============================================================================
// HISTORY AND MISSED LIST
// ============================================================================

#[tokio::test]
async fn history_lists_entries_oldest_first() {
    let (service, store, clinic_id) = setup().await;
    let appointment_id = checked_in_and_missed(&service, &store, clinic_id).await;
    service
        .requeue(appointment_id, QueuePriority::Normal)
        .await
        .unwrap();
    let called = service.call_by_appointment(appointment_id).await.unwrap();
    service.mark_missed(called.queue_id).await.unwrap();

    let history = service.history(appointment_id).await;

    assert_eq!(history.len(), 2);
    assert!(history[0].created_at <= history[1].created_at);
    assert!(history.iter().all(|e| e.status == QueueStatus::Missed));
}

#[tokio::test]
async fn missed_list_shows_latest_actionable_miss_per_appointment() {
    let (service, store, clinic_id) = setup().await;

    // Missed twice: only the latest miss should be listed.
    let double_missed = checked_in_and_missed(&service, &store, clinic_id).await;
    service
        .requeue(double_missed, QueuePriority::Normal)
        .await
        .unwrap();
    let called = service.call_by_appointment(double_missed).await.unwrap();
    let second_miss = service.mark_missed(called.queue_id).await.unwrap();

    // Missed but already back in the queue: not actionable.
    let requeued = checked_in_and_missed(&service, &store, clinic_id).await;
    service
        .requeue(requeued, QueuePriority::Normal)
        .await
        .unwrap();

    // Missed once but served in the end: not actionable.
    let completed = checked_in_and_missed(&service, &store, clinic_id).await;
    service
        .requeue(completed, QueuePriority::Normal)
        .await
        .unwrap();
    service.call_by_appointment(completed).await.unwrap();
    service.mark_done(completed).await.unwrap();

    let missed = service.missed_entries(clinic_id).await;

    assert_eq!(missed.len(), 1);
    assert_eq!(missed[0].appointment_id, double_missed);
    assert_eq!(missed[0].queue_id, second_miss.queue_id);
}

#[tokio::test]
async fn missed_list_is_scoped_to_clinic() {
    let (service, store, clinic_id) = setup().await;
    let other_clinic = Uuid::new_v4();
    checked_in_and_missed(&service, &store, clinic_id).await;
    checked_in_and_missed(&service, &store, other_clinic).await;

    assert_eq!(service.missed_entries(clinic_id).await.len(), 1);
    assert_eq!(service.missed_entries(other_clinic).await.len(), 1);
}
