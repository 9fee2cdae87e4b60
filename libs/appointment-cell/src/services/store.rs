use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use scheduling_cell::BookedSlot;

use crate::error::AppointmentError;
use crate::models::{Appointment, AppointmentStatus};

/// In-memory appointment book. Clones share the same underlying map, so
/// the booking service and the queue engine see one consistent state.
pub struct AppointmentStore {
    appointments: Arc<RwLock<HashMap<Uuid, Appointment>>>,
}

impl AppointmentStore {
    pub fn new() -> Self {
        Self {
            appointments: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn insert(&self, appointment: Appointment) {
        let mut map = self.appointments.write().await;
        debug!("Stored appointment {}", appointment.id);
        map.insert(appointment.id, appointment);
    }

    pub async fn get(&self, id: Uuid) -> Option<Appointment> {
        let map = self.appointments.read().await;
        map.get(&id).cloned()
    }

    pub async fn require(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.get(id).await.ok_or(AppointmentError::NotFound(id))
    }

    /// Applies a status change after checking it against the transition
    /// table. Returns the updated appointment.
    pub async fn update_status(
        &self,
        id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let mut map = self.appointments.write().await;
        let appointment = map.get_mut(&id).ok_or(AppointmentError::NotFound(id))?;

        if !appointment.status.can_transition_to(&new_status) {
            return Err(AppointmentError::InvalidStatusTransition {
                from: appointment.status.to_string(),
                to: new_status.to_string(),
            });
        }

        info!(
            "Appointment {} status {} -> {}",
            id, appointment.status, new_status
        );
        appointment.status = new_status;
        Ok(appointment.clone())
    }

    pub async fn set_starts_at(
        &self,
        id: Uuid,
        starts_at: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let mut map = self.appointments.write().await;
        let appointment = map.get_mut(&id).ok_or(AppointmentError::NotFound(id))?;

        info!(
            "Appointment {} moved from {} to {}",
            id, appointment.starts_at, starts_at
        );
        appointment.starts_at = starts_at;
        Ok(appointment.clone())
    }

    /// Live capacity claims for one doctor's pool at a clinic on one
    /// calendar day. Unassigned bookings (`doctor_id` of `None`) form
    /// their own pool. Only appointments that still occupy their slot are
    /// included, so a cancelled or no-show booking frees its seat.
    pub async fn day_claims(
        &self,
        clinic_id: Uuid,
        doctor_id: Option<Uuid>,
        date: NaiveDate,
    ) -> Vec<BookedSlot> {
        let map = self.appointments.read().await;
        map.values()
            .filter(|a| a.clinic_id == clinic_id)
            .filter(|a| a.doctor_id == doctor_id)
            .filter(|a| a.starts_at.date_naive() == date)
            .filter(|a| a.status.claims_slot())
            .map(|a| BookedSlot {
                appointment_id: a.id,
                starts_at: a.starts_at,
            })
            .collect()
    }

    /// Whether the patient already holds a live booking at this instant.
    pub async fn has_active_at(
        &self,
        patient_id: Uuid,
        starts_at: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> bool {
        let map = self.appointments.read().await;
        map.values()
            .filter(|a| exclude != Some(a.id))
            .any(|a| {
                a.patient_id == patient_id
                    && a.starts_at == starts_at
                    && a.status.claims_slot()
            })
    }

    pub async fn list_by_clinic(&self, clinic_id: Uuid) -> Vec<Appointment> {
        let map = self.appointments.read().await;
        let mut appointments: Vec<Appointment> = map
            .values()
            .filter(|a| a.clinic_id == clinic_id)
            .cloned()
            .collect();

        appointments.sort_by_key(|a| a.starts_at);
        appointments
    }

    pub async fn list_by_patient(&self, patient_id: Uuid) -> Vec<Appointment> {
        let map = self.appointments.read().await;
        let mut appointments: Vec<Appointment> = map
            .values()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();

        appointments.sort_by_key(|a| a.starts_at);
        appointments
    }
}

impl Default for AppointmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for AppointmentStore {
    fn clone(&self) -> Self {
        Self {
            appointments: Arc::clone(&self.appointments),
        }
    }
}
