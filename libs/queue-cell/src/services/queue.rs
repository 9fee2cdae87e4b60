// libs/queue-cell/src/services/queue.rs
// Walk-in queue engine: priority-ordered check-ins, reception call flow,
// and the appointment status updates that ride along with them.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use appointment_cell::{Appointment, AppointmentStatus, AppointmentStore};

use crate::error::QueueError;
use crate::models::{
    QueueChanged, QueueEntry, QueueOverviewEntry, QueuePosition, QueuePriority, QueueStatus,
};

/// In-memory queue engine. The entry map is append-only history: settled
/// entries stay behind so missed patients can be found and requeued.
/// Clones share the same state.
///
/// Every mutation holds the entries write lock across its whole
/// validate-and-mutate step. Composite operations acquire the entries
/// lock before touching the appointment store, never the other way
/// around.
pub struct QueueService {
    entries: Arc<RwLock<HashMap<Uuid, QueueEntry>>>,
    store: AppointmentStore,
    changes: broadcast::Sender<QueueChanged>,
}

impl QueueService {
    pub fn new(store: AppointmentStore) -> Self {
        let (changes, _) = broadcast::channel(1000);

        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            store,
            changes,
        }
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<QueueChanged> {
        self.changes.subscribe()
    }

    pub fn store(&self) -> &AppointmentStore {
        &self.store
    }

    fn notify(&self, clinic_id: Uuid) {
        if self.changes.send(QueueChanged { clinic_id }).is_err() {
            debug!("No live listeners for queue change in clinic {}", clinic_id);
        }
    }

    // ========================================================================
    // CHECK-IN AND REQUEUE
    // ========================================================================

    /// Adds a scheduled appointment to its clinic's queue.
    pub async fn check_in(
        &self,
        appointment_id: Uuid,
        priority: QueuePriority,
    ) -> Result<QueueEntry, QueueError> {
        let mut entries = self.entries.write().await;

        let appointment = self
            .store
            .get(appointment_id)
            .await
            .ok_or(QueueError::AppointmentNotFound(appointment_id))?;
        if appointment.status != AppointmentStatus::Scheduled {
            return Err(QueueError::NotCheckable {
                appointment_id,
                status: appointment.status.to_string(),
            });
        }

        if entries
            .values()
            .any(|entry| entry.appointment_id == appointment_id && entry.status.is_active())
        {
            return Err(QueueError::AlreadyQueued(appointment_id));
        }

        let entry = QueueEntry::new(appointment.clinic_id, appointment_id, priority);
        entries.insert(entry.queue_id, entry.clone());
        drop(entries);

        info!(
            "Appointment {} checked in to clinic {} queue with priority {}",
            appointment_id, entry.clinic_id, entry.priority
        );
        self.notify(entry.clinic_id);

        Ok(entry)
    }

    /// Puts a missed patient back in the queue as a fresh entry. The missed
    /// entry stays in the history untouched. An appointment left in called
    /// or no-show state is reset to scheduled so it can be called again.
    pub async fn requeue(
        &self,
        appointment_id: Uuid,
        priority: QueuePriority,
    ) -> Result<QueueEntry, QueueError> {
        let mut entries = self.entries.write().await;

        let appointment = self
            .store
            .get(appointment_id)
            .await
            .ok_or(QueueError::AppointmentNotFound(appointment_id))?;
        if appointment.status.is_terminal() {
            return Err(QueueError::NotCheckable {
                appointment_id,
                status: appointment.status.to_string(),
            });
        }

        if entries
            .values()
            .any(|entry| entry.appointment_id == appointment_id && entry.status.is_active())
        {
            return Err(QueueError::AlreadyQueued(appointment_id));
        }

        let latest = entries
            .values()
            .filter(|entry| entry.appointment_id == appointment_id)
            .max_by_key(|entry| (entry.created_at, entry.queue_id))
            .cloned();
        match latest {
            Some(entry) if entry.status == QueueStatus::Missed => {}
            _ => return Err(QueueError::NotMissed(appointment_id)),
        }

        if matches!(
            appointment.status,
            AppointmentStatus::Called | AppointmentStatus::NoShow
        ) {
            self.store
                .update_status(appointment_id, AppointmentStatus::Scheduled)
                .await?;
        }

        let entry = QueueEntry::new(appointment.clinic_id, appointment_id, priority);
        entries.insert(entry.queue_id, entry.clone());
        drop(entries);

        info!(
            "Appointment {} requeued to clinic {} with priority {}",
            appointment_id, entry.clinic_id, entry.priority
        );
        self.notify(entry.clinic_id);

        Ok(entry)
    }

    // ========================================================================
    // RECEPTION CALL FLOW
    // ========================================================================

    /// Claims the head of the clinic's queue. Returns `Ok(None)` when the
    /// queue is empty. At most one entry per clinic may be in called state,
    /// so a second call while one patient is being served is rejected.
    pub async fn call_next(&self, clinic_id: Uuid) -> Result<Option<QueueEntry>, QueueError> {
        let mut entries = self.entries.write().await;

        if let Some(serving) = entries
            .values()
            .find(|entry| entry.clinic_id == clinic_id && entry.status == QueueStatus::Called)
        {
            return Err(QueueError::AlreadyServing {
                clinic_id,
                queue_id: serving.queue_id,
            });
        }

        let head = entries
            .values()
            .filter(|entry| entry.clinic_id == clinic_id && entry.status == QueueStatus::InQueue)
            .min_by(|a, b| QueueEntry::queue_order(a, b))
            .cloned();

        let Some(mut claimed) = head else {
            debug!("Queue for clinic {} is empty, nothing to call", clinic_id);
            return Ok(None);
        };

        self.store
            .update_status(claimed.appointment_id, AppointmentStatus::Called)
            .await?;

        claimed.status = QueueStatus::Called;
        claimed.called_at = Some(Utc::now());
        entries.insert(claimed.queue_id, claimed.clone());
        drop(entries);

        info!(
            "Called appointment {} (queue entry {}) for clinic {}",
            claimed.appointment_id, claimed.queue_id, clinic_id
        );
        self.notify(clinic_id);

        Ok(Some(claimed))
    }

    /// Calls a specific waiting patient out of queue order.
    pub async fn call_by_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<QueueEntry, QueueError> {
        let mut entries = self.entries.write().await;

        let target = entries
            .values()
            .find(|entry| {
                entry.appointment_id == appointment_id && entry.status == QueueStatus::InQueue
            })
            .cloned();
        let Some(mut claimed) = target else {
            return Err(QueueError::NotInQueue(appointment_id));
        };

        if let Some(serving) = entries
            .values()
            .find(|entry| entry.clinic_id == claimed.clinic_id && entry.status == QueueStatus::Called)
        {
            return Err(QueueError::AlreadyServing {
                clinic_id: claimed.clinic_id,
                queue_id: serving.queue_id,
            });
        }

        self.store
            .update_status(appointment_id, AppointmentStatus::Called)
            .await?;

        claimed.status = QueueStatus::Called;
        claimed.called_at = Some(Utc::now());
        entries.insert(claimed.queue_id, claimed.clone());
        drop(entries);

        info!(
            "Called appointment {} (queue entry {}) out of order for clinic {}",
            appointment_id, claimed.queue_id, claimed.clinic_id
        );
        self.notify(claimed.clinic_id);

        Ok(claimed)
    }

    // ========================================================================
    // SETTLEMENT
    // ========================================================================

    /// Settles the active entry for an appointment after the consultation.
    /// Returns `Ok(None)` when the appointment has no active entry, which
    /// is not an error at reception: the patient may never have checked in.
    pub async fn mark_done(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<QueueEntry>, QueueError> {
        let mut entries = self.entries.write().await;

        let active = entries
            .values()
            .find(|entry| entry.appointment_id == appointment_id && entry.status.is_active())
            .cloned();
        let Some(mut entry) = active else {
            warn!(
                "No active queue entry for appointment {}, nothing to mark done",
                appointment_id
            );
            return Ok(None);
        };

        self.store
            .update_status(appointment_id, AppointmentStatus::Completed)
            .await?;

        entry.status = QueueStatus::Done;
        entries.insert(entry.queue_id, entry.clone());
        drop(entries);

        info!(
            "Queue entry {} for appointment {} marked done",
            entry.queue_id, appointment_id
        );
        self.notify(entry.clinic_id);

        Ok(Some(entry))
    }

    /// Marks one queue entry as missed. The appointment itself is left
    /// alone: missing a call does not forfeit the booking, and the patient
    /// can be requeued or cancelled separately.
    pub async fn mark_missed(&self, queue_id: Uuid) -> Result<QueueEntry, QueueError> {
        let mut entries = self.entries.write().await;

        let current = entries
            .get(&queue_id)
            .cloned()
            .ok_or(QueueError::EntryNotFound(queue_id))?;
        if !current.status.can_transition_to(&QueueStatus::Missed) {
            return Err(QueueError::InvalidStatusTransition {
                from: current.status.to_string(),
                to: QueueStatus::Missed.to_string(),
            });
        }

        let mut missed = current;
        missed.status = QueueStatus::Missed;
        entries.insert(queue_id, missed.clone());
        drop(entries);

        info!(
            "Queue entry {} for appointment {} marked missed",
            queue_id, missed.appointment_id
        );
        self.notify(missed.clinic_id);

        Ok(missed)
    }

    /// Cancels an appointment and settles any active queue entry it holds
    /// as missed. Only completed and already-cancelled appointments are
    /// rejected.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Appointment, QueueError> {
        let mut entries = self.entries.write().await;

        let appointment = self
            .store
            .get(appointment_id)
            .await
            .ok_or(QueueError::AppointmentNotFound(appointment_id))?;
        if appointment.status.is_terminal() {
            return Err(QueueError::NotCancellable {
                appointment_id,
                status: appointment.status.to_string(),
            });
        }

        let active = entries
            .values()
            .find(|entry| entry.appointment_id == appointment_id && entry.status.is_active())
            .cloned();
        if let Some(mut entry) = active {
            entry.status = QueueStatus::Missed;
            entries.insert(entry.queue_id, entry);
        }

        let cancelled = self
            .store
            .update_status(appointment_id, AppointmentStatus::Cancelled)
            .await?;
        drop(entries);

        info!("Appointment {} cancelled", appointment_id);
        self.notify(appointment.clinic_id);

        Ok(cancelled)
    }

    /// Marks an appointment as a no-show. Rejected while the patient still
    /// holds an active queue entry: someone standing in the queue is not a
    /// no-show.
    pub async fn mark_no_show(&self, appointment_id: Uuid) -> Result<Appointment, QueueError> {
        let entries = self.entries.write().await;

        self.store
            .get(appointment_id)
            .await
            .ok_or(QueueError::AppointmentNotFound(appointment_id))?;
        if entries
            .values()
            .any(|entry| entry.appointment_id == appointment_id && entry.status.is_active())
        {
            return Err(QueueError::StillQueued { appointment_id });
        }

        let updated = self
            .store
            .update_status(appointment_id, AppointmentStatus::NoShow)
            .await?;
        drop(entries);

        info!("Appointment {} marked as no-show", appointment_id);

        Ok(updated)
    }

    // ========================================================================
    // QUEUE VIEWS
    // ========================================================================

    /// Waiting entries for a clinic in call order.
    pub async fn clinic_queue(&self, clinic_id: Uuid) -> Vec<QueueEntry> {
        let entries = self.entries.read().await;
        let mut waiting: Vec<QueueEntry> = entries
            .values()
            .filter(|entry| entry.clinic_id == clinic_id && entry.status == QueueStatus::InQueue)
            .cloned()
            .collect();

        waiting.sort_by(|a, b| QueueEntry::queue_order(a, b));
        waiting
    }

    /// Waiting entries numbered by call order, for the reception dashboard.
    pub async fn queue_overview(&self, clinic_id: Uuid) -> Vec<QueueOverviewEntry> {
        self.clinic_queue(clinic_id)
            .await
            .into_iter()
            .enumerate()
            .map(|(index, entry)| QueueOverviewEntry {
                position: index + 1,
                entry,
            })
            .collect()
    }

    /// A patient's live view of their place in the queue. Never fails:
    /// unknown and settled appointments simply report not-in-queue.
    pub async fn position(&self, appointment_id: Uuid) -> QueuePosition {
        let entries = self.entries.read().await;

        let active = entries
            .values()
            .find(|entry| entry.appointment_id == appointment_id && entry.status.is_active())
            .cloned();
        let Some(active) = active else {
            return QueuePosition::not_in_queue(appointment_id);
        };
        if active.status == QueueStatus::Called {
            return QueuePosition::called(appointment_id);
        }

        let mut waiting: Vec<&QueueEntry> = entries
            .values()
            .filter(|entry| {
                entry.clinic_id == active.clinic_id && entry.status == QueueStatus::InQueue
            })
            .collect();
        waiting.sort_by(|a, b| QueueEntry::queue_order(a, b));

        let total_waiting = waiting.len();
        match waiting
            .iter()
            .position(|entry| entry.queue_id == active.queue_id)
        {
            Some(index) => {
                QueuePosition::waiting(appointment_id, index + 1, total_waiting, active.priority)
            }
            None => QueuePosition::not_in_queue(appointment_id),
        }
    }

    /// The entry the clinic is serving right now, if any.
    pub async fn currently_serving(&self, clinic_id: Uuid) -> Option<QueueEntry> {
        let entries = self.entries.read().await;
        entries
            .values()
            .find(|entry| entry.clinic_id == clinic_id && entry.status == QueueStatus::Called)
            .cloned()
    }

    pub async fn queue_count(&self, clinic_id: Uuid) -> usize {
        let entries = self.entries.read().await;
        entries
            .values()
            .filter(|entry| entry.clinic_id == clinic_id && entry.status == QueueStatus::InQueue)
            .count()
    }

    /// Full queue history for one appointment, oldest entry first.
    pub async fn history(&self, appointment_id: Uuid) -> Vec<QueueEntry> {
        let entries = self.entries.read().await;
        let mut history: Vec<QueueEntry> = entries
            .values()
            .filter(|entry| entry.appointment_id == appointment_id)
            .cloned()
            .collect();

        history.sort_by_key(|entry| (entry.created_at, entry.queue_id));
        history
    }

    /// Missed patients a receptionist can still act on: the latest missed
    /// entry per appointment, skipping appointments that were since served
    /// or are back in the queue. Oldest miss first.
    pub async fn missed_entries(&self, clinic_id: Uuid) -> Vec<QueueEntry> {
        let entries = self.entries.read().await;

        let mut by_appointment: HashMap<Uuid, Vec<&QueueEntry>> = HashMap::new();
        for entry in entries.values().filter(|entry| entry.clinic_id == clinic_id) {
            by_appointment
                .entry(entry.appointment_id)
                .or_default()
                .push(entry);
        }

        let mut missed: Vec<QueueEntry> = Vec::new();
        for history in by_appointment.values() {
            if history.iter().any(|entry| entry.status == QueueStatus::Done) {
                continue;
            }
            if history.iter().any(|entry| entry.status.is_active()) {
                continue;
            }
            if let Some(latest) = history
                .iter()
                .filter(|entry| entry.status == QueueStatus::Missed)
                .max_by_key(|entry| (entry.created_at, entry.queue_id))
            {
                missed.push((*latest).clone());
            }
        }

        missed.sort_by_key(|entry| (entry.created_at, entry.queue_id));
        missed
    }

    /// Clinic owning an appointment, used to route position updates.
    pub async fn appointment_clinic(&self, appointment_id: Uuid) -> Option<Uuid> {
        self.store
            .get(appointment_id)
            .await
            .map(|appointment| appointment.clinic_id)
    }
}

impl Clone for QueueService {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            store: self.store.clone(),
            changes: self.changes.clone(),
        }
    }
}
