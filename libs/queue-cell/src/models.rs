// libs/queue-cell/src/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Flat-rate wait estimate per waiting patient, in minutes.
pub const WAIT_MINUTES_PER_PATIENT: u32 = 10;

// ============================================================================
// CORE QUEUE MODELS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum QueuePriority {
    Normal = 1,
    Elderly = 2,
    Emergency = 3,
}

impl From<QueuePriority> for u8 {
    fn from(priority: QueuePriority) -> u8 {
        priority as u8
    }
}

impl TryFrom<u8> for QueuePriority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(QueuePriority::Normal),
            2 => Ok(QueuePriority::Elderly),
            3 => Ok(QueuePriority::Emergency),
            other => Err(format!("Invalid queue priority: {} (expected 1-3)", other)),
        }
    }
}

impl fmt::Display for QueuePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueuePriority::Normal => write!(f, "normal"),
            QueuePriority::Elderly => write!(f, "elderly"),
            QueuePriority::Emergency => write!(f, "emergency"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    InQueue,
    Called,
    Done,
    Missed,
}

impl QueueStatus {
    /// An active entry occupies the queue for its appointment; each
    /// appointment may hold at most one at a time.
    pub fn is_active(&self) -> bool {
        matches!(self, QueueStatus::InQueue | QueueStatus::Called)
    }

    pub fn can_transition_to(&self, target: &QueueStatus) -> bool {
        use QueueStatus::*;
        match (self, target) {
            (InQueue, Called) => true,
            (InQueue, Done) => true,
            (InQueue, Missed) => true,
            (Called, Done) => true,
            (Called, Missed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueStatus::InQueue => write!(f, "IN_QUEUE"),
            QueueStatus::Called => write!(f, "CALLED"),
            QueueStatus::Done => write!(f, "DONE"),
            QueueStatus::Missed => write!(f, "MISSED"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub queue_id: Uuid,
    pub clinic_id: Uuid,
    pub appointment_id: Uuid,
    pub priority: QueuePriority,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    pub fn new(clinic_id: Uuid, appointment_id: Uuid, priority: QueuePriority) -> Self {
        Self {
            queue_id: Uuid::new_v4(),
            clinic_id,
            appointment_id,
            priority,
            status: QueueStatus::InQueue,
            created_at: Utc::now(),
            called_at: None,
        }
    }

    /// Total order over entries: highest priority first, then earliest
    /// check-in, then queue id as the final tie-break.
    pub fn queue_order(a: &QueueEntry, b: &QueueEntry) -> Ordering {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.queue_id.cmp(&b.queue_id))
    }
}

/// Broadcast whenever a clinic's queue contents change.
#[derive(Debug, Clone, Copy)]
pub struct QueueChanged {
    pub clinic_id: Uuid,
}

/// One numbered row of the reception dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct QueueOverviewEntry {
    pub position: usize,
    pub entry: QueueEntry,
}

// ============================================================================
// POSITION MODELS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueuePosition {
    Waiting {
        appointment_id: Uuid,
        position: usize,
        total_waiting: usize,
        priority: QueuePriority,
        estimated_wait_minutes: u32,
        message: String,
    },
    Called {
        appointment_id: Uuid,
        message: String,
    },
    NotInQueue {
        appointment_id: Uuid,
    },
}

impl QueuePosition {
    pub fn waiting(
        appointment_id: Uuid,
        position: usize,
        total_waiting: usize,
        priority: QueuePriority,
    ) -> Self {
        let message = if position == 1 {
            "You are next".to_string()
        } else {
            format!("{} patients ahead of you", position - 1)
        };

        QueuePosition::Waiting {
            appointment_id,
            position,
            total_waiting,
            priority,
            estimated_wait_minutes: (position.saturating_sub(1) as u32) * WAIT_MINUTES_PER_PATIENT,
            message,
        }
    }

    pub fn called(appointment_id: Uuid) -> Self {
        QueuePosition::Called {
            appointment_id,
            message: "You have been called - please proceed to reception".to_string(),
        }
    }

    pub fn not_in_queue(appointment_id: Uuid) -> Self {
        QueuePosition::NotInQueue { appointment_id }
    }
}

// ============================================================================
// REQUEST MODELS
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CheckInRequest {
    pub appointment_id: Uuid,
    pub priority: QueuePriority,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequeueRequest {
    pub priority: QueuePriority,
}
