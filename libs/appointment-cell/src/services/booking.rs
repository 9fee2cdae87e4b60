// libs/appointment-cell/src/services/booking.rs
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use scheduling_cell::services::slots::{generate_slots, slot_availability};
use scheduling_cell::{ClinicDirectory, SlotAvailability, SLOT_CAPACITY};

use crate::error::AppointmentError;
use crate::models::{Appointment, AppointmentStatus, BookAppointmentRequest};
use crate::services::store::AppointmentStore;

/// Books walk-up and scheduled visits against a clinic's slot grid,
/// enforcing slot membership, capacity, and patient double-booking.
#[derive(Clone)]
pub struct BookingService {
    directory: ClinicDirectory,
    store: AppointmentStore,
}

impl BookingService {
    pub fn new(directory: ClinicDirectory, store: AppointmentStore) -> Self {
        Self { directory, store }
    }

    pub fn store(&self) -> &AppointmentStore {
        &self.store
    }

    pub async fn book(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking appointment for patient {} at clinic {} ({})",
            request.patient_id, request.clinic_id, request.starts_at
        );

        let now = Utc::now();

        self.validate_slot_request(
            request.clinic_id,
            request.doctor_id,
            request.starts_at,
            now,
            None,
        )
        .await?;

        if self
            .store
            .has_active_at(request.patient_id, request.starts_at, None)
            .await
        {
            return Err(AppointmentError::DoubleBooked(request.starts_at));
        }

        let appointment = Appointment::new(
            request.patient_id,
            request.clinic_id,
            request.doctor_id,
            request.starts_at,
        );
        self.store.insert(appointment.clone()).await;

        info!("Booked appointment {}", appointment.id);
        Ok(appointment)
    }

    /// Moves a scheduled appointment to a new slot. The appointment's own
    /// claim is excluded from the capacity count so it never blocks itself.
    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        new_starts_at: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.store.require(appointment_id).await?;

        if appointment.status != AppointmentStatus::Scheduled {
            return Err(AppointmentError::NotReschedulable {
                id: appointment_id,
                status: appointment.status.to_string(),
            });
        }

        let now = Utc::now();

        self.validate_slot_request(
            appointment.clinic_id,
            appointment.doctor_id,
            new_starts_at,
            now,
            Some(appointment_id),
        )
        .await?;

        if self
            .store
            .has_active_at(appointment.patient_id, new_starts_at, Some(appointment_id))
            .await
        {
            return Err(AppointmentError::DoubleBooked(new_starts_at));
        }

        self.store.set_starts_at(appointment_id, new_starts_at).await
    }

    /// Capacity-aware slot listing for one doctor's day.
    pub async fn availability_for(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        exclude_appointment: Option<Uuid>,
    ) -> Result<Vec<SlotAvailability>, AppointmentError> {
        let doctor = self.directory.require_doctor(doctor_id).await?;
        let hours = self.directory.require_hours(doctor.clinic_id).await?;
        let claims = self
            .store
            .day_claims(doctor.clinic_id, Some(doctor.id), date)
            .await;

        Ok(slot_availability(
            &hours,
            &doctor,
            date,
            &claims,
            Utc::now(),
            exclude_appointment,
        ))
    }

    // Validation cascade shared by book and reschedule. Ordering matters:
    // structural problems surface before capacity problems.
    async fn validate_slot_request(
        &self,
        clinic_id: Uuid,
        doctor_id: Option<Uuid>,
        starts_at: DateTime<Utc>,
        now: DateTime<Utc>,
        exclude_appointment: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        let hours = self.directory.require_hours(clinic_id).await?;

        if let Some(doctor_id) = doctor_id {
            let doctor = self.directory.require_doctor(doctor_id).await?;

            if doctor.clinic_id != clinic_id {
                return Err(AppointmentError::DoctorClinicMismatch {
                    doctor_id,
                    clinic_id,
                });
            }

            if !doctor.works_on(starts_at.date_naive()) {
                return Err(AppointmentError::DoctorNotRostered {
                    doctor_id,
                    date: starts_at.date_naive(),
                });
            }
        }

        if starts_at <= now {
            return Err(AppointmentError::StartsInPast);
        }

        let date = starts_at.date_naive();
        let slots = generate_slots(&hours, date, now);
        if !slots.contains(&starts_at) {
            return Err(AppointmentError::NotASlot(starts_at));
        }

        // Capacity pools are keyed by doctor, so a full pool for one
        // doctor never blocks another doctor's bookings at the same time.
        let claims = self.store.day_claims(clinic_id, doctor_id, date).await;
        let taken = claims
            .iter()
            .filter(|claim| claim.starts_at == starts_at)
            .filter(|claim| exclude_appointment != Some(claim.appointment_id))
            .count();

        debug!("Slot {} holds {} of {} claims", starts_at, taken, SLOT_CAPACITY);

        if taken >= SLOT_CAPACITY {
            return Err(AppointmentError::SlotFull(starts_at));
        }

        Ok(())
    }
}
