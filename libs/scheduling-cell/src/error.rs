use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("No opening hours registered for clinic {0}")]
    HoursNotFound(Uuid),

    #[error("Doctor not found: {0}")]
    DoctorNotFound(Uuid),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
