use appointment_cell::AppointmentError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Appointment not found: {0}")]
    AppointmentNotFound(Uuid),

    #[error("Queue entry not found: {0}")]
    EntryNotFound(Uuid),

    #[error("Appointment {0} is already in the queue")]
    AlreadyQueued(Uuid),

    #[error("Appointment {appointment_id} is {status} and cannot check in")]
    NotCheckable {
        appointment_id: Uuid,
        status: String,
    },

    #[error("Clinic {clinic_id} is already serving queue entry {queue_id}")]
    AlreadyServing { clinic_id: Uuid, queue_id: Uuid },

    #[error("Appointment {0} has no entry waiting in the queue")]
    NotInQueue(Uuid),

    #[error("Invalid queue status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Appointment {0} has no missed queue entry to requeue")]
    NotMissed(Uuid),

    #[error("Appointment {appointment_id} is {status} and cannot be cancelled")]
    NotCancellable {
        appointment_id: Uuid,
        status: String,
    },

    #[error("Appointment {appointment_id} still has an active queue entry")]
    StillQueued { appointment_id: Uuid },

    #[error("Appointment error: {0}")]
    Appointment(#[from] AppointmentError),
}
