use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::appointment::AppointmentStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum SchedulingError {
    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("Doctor not found: {0}")]
    UnknownDoctor(Uuid),

    #[error("No registered doctor with specialty {0:?}")]
    UnknownSpecialty(String),

    #[error("Requested interval conflicts with an existing reservation")]
    Conflict,

    #[error("Waitlist entry not found: {0}")]
    EntryNotFound(Uuid),

    #[error("Waitlist entry {0} has expired")]
    ExpiredEntry(Uuid),

    #[error("Appointment not found: {0}")]
    NotFound(Uuid),

    #[error("Appointment is already in terminal status {0}")]
    AlreadyTerminal(AppointmentStatus),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),
}
