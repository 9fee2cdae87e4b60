use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("A provisioning call is already in progress")]
    ProvisioningInProgress,

    #[error("No active operator session to protect")]
    NoActiveSession,

    #[error("Session guard failed a restore and must be reset")]
    GuardFailed,

    #[error("Invalid session token: {0}")]
    InvalidToken(String),

    #[error("Identity gateway error: {0}")]
    GatewayError(String),

    #[error("Identity gateway rejected signup ({status}): {message}")]
    SignupRejected { status: u16, message: String },

    #[error("Restored session does not match operator {expected} (found {found})")]
    RestoreMismatch { expected: String, found: String },

    #[error("Invalid guard state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
}
