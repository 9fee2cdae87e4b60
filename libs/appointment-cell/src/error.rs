use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use scheduling_cell::SchedulingError;

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid appointment status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("No opening hours registered for clinic {0}")]
    UnknownClinic(Uuid),

    #[error("Doctor not found: {0}")]
    DoctorNotFound(Uuid),

    #[error("Doctor {doctor_id} does not consult at clinic {clinic_id}")]
    DoctorClinicMismatch { doctor_id: Uuid, clinic_id: Uuid },

    #[error("Doctor {doctor_id} is not rostered on {date}")]
    DoctorNotRostered { doctor_id: Uuid, date: NaiveDate },

    #[error("Appointments must start in the future")]
    StartsInPast,

    #[error("Requested time {0} is not a bookable slot")]
    NotASlot(DateTime<Utc>),

    #[error("Slot at {0} is fully booked")]
    SlotFull(DateTime<Utc>),

    #[error("Patient already has an appointment at {0}")]
    DoubleBooked(DateTime<Utc>),

    #[error("Appointment {id} is {status} and cannot be rescheduled")]
    NotReschedulable { id: Uuid, status: String },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<SchedulingError> for AppointmentError {
    fn from(e: SchedulingError) -> Self {
        match e {
            SchedulingError::HoursNotFound(clinic_id) => AppointmentError::UnknownClinic(clinic_id),
            SchedulingError::DoctorNotFound(doctor_id) => {
                AppointmentError::DoctorNotFound(doctor_id)
            }
            SchedulingError::ValidationError(msg) => AppointmentError::ValidationError(msg),
        }
    }
}
