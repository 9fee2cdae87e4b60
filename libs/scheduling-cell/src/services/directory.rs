use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::SchedulingError;
use crate::models::{ClinicHours, Doctor};

/// In-memory registry of clinic opening hours and doctor rosters.
///
/// Clones share the same underlying maps, so one directory handle can be
/// given to every cell that needs to resolve hours or doctors.
pub struct ClinicDirectory {
    hours: Arc<RwLock<HashMap<Uuid, ClinicHours>>>,
    doctors: Arc<RwLock<HashMap<Uuid, Doctor>>>,
}

impl ClinicDirectory {
    pub fn new() -> Self {
        Self {
            hours: Arc::new(RwLock::new(HashMap::new())),
            doctors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn upsert_hours(&self, hours: ClinicHours) -> Result<(), SchedulingError> {
        if hours.slot_interval_minutes <= 0 {
            return Err(SchedulingError::ValidationError(
                "Slot interval must be a positive number of minutes".to_string(),
            ));
        }

        let clinic_id = hours.clinic_id;
        let mut map = self.hours.write().await;
        map.insert(clinic_id, hours);

        info!("Stored opening hours for clinic {}", clinic_id);
        Ok(())
    }

    pub async fn hours_for(&self, clinic_id: Uuid) -> Option<ClinicHours> {
        let map = self.hours.read().await;
        map.get(&clinic_id).cloned()
    }

    pub async fn require_hours(&self, clinic_id: Uuid) -> Result<ClinicHours, SchedulingError> {
        self.hours_for(clinic_id)
            .await
            .ok_or(SchedulingError::HoursNotFound(clinic_id))
    }

    pub async fn upsert_doctor(&self, doctor: Doctor) -> Result<(), SchedulingError> {
        if doctor.full_name.trim().is_empty() {
            return Err(SchedulingError::ValidationError(
                "Doctor name must not be empty".to_string(),
            ));
        }

        if doctor.working_days.iter().any(|day| !(1..=7).contains(day)) {
            return Err(SchedulingError::ValidationError(
                "Working days must use ISO weekday numbers 1-7".to_string(),
            ));
        }

        let doctor_id = doctor.id;
        let mut map = self.doctors.write().await;
        map.insert(doctor_id, doctor);

        debug!("Stored doctor {}", doctor_id);
        Ok(())
    }

    pub async fn doctor(&self, doctor_id: Uuid) -> Option<Doctor> {
        let map = self.doctors.read().await;
        map.get(&doctor_id).cloned()
    }

    pub async fn require_doctor(&self, doctor_id: Uuid) -> Result<Doctor, SchedulingError> {
        self.doctor(doctor_id)
            .await
            .ok_or(SchedulingError::DoctorNotFound(doctor_id))
    }

    pub async fn doctors_for_clinic(&self, clinic_id: Uuid) -> Vec<Doctor> {
        let map = self.doctors.read().await;
        let mut doctors: Vec<Doctor> = map
            .values()
            .filter(|doctor| doctor.clinic_id == clinic_id)
            .cloned()
            .collect();

        doctors.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        doctors
    }
}

impl Default for ClinicDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ClinicDirectory {
    fn clone(&self) -> Self {
        Self {
            hours: Arc::clone(&self.hours),
            doctors: Arc::clone(&self.doctors),
        }
    }
}
