use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scheduler_models::{Appointment, DoctorSelector, SchedulingError, TimeInterval};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub patient_id: Uuid,
    pub target: DoctorSelector,
    /// Acceptable range for the appointment. A window exactly as long as the
    /// duration asks for that precise slot; a wider window lets the engine
    /// pick the earliest fit.
    pub window: TimeInterval,
    pub duration_minutes: i64,
    /// Overrides the doctor's (or engine default) conflict padding.
    pub buffer_minutes: Option<i64>,
}

/// Outcome of a booking request. `Rejected` is reserved for structurally
/// invalid input; a mere conflict yields `Waitlisted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BookingOutcome {
    Confirmed(Appointment),
    Waitlisted {
        appointment_id: Uuid,
        entry_id: Uuid,
        position: usize,
        expires_at: DateTime<Utc>,
    },
    Rejected {
        reason: SchedulingError,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOutcome {
    pub cancelled: Appointment,
    /// The appointment confirmed off the waitlist by this cancellation,
    /// when a compatible entry existed.
    pub promoted: Option<Appointment>,
}

/// Result of cancel-then-rebook. The old slot is never restored when the
/// rebooking is not confirmed; `rebooked` tells the caller what happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReassignOutcome {
    pub cancelled: Appointment,
    pub promoted: Option<Appointment>,
    pub rebooked: BookingOutcome,
}

/// Transition events handed to the notification collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SchedulingEvent {
    Confirmed(Appointment),
    Cancelled(Appointment),
    Waitlisted {
        appointment: Appointment,
        entry_id: Uuid,
        position: usize,
        expires_at: DateTime<Utc>,
    },
    Promoted(Appointment),
    Expired {
        appointment: Appointment,
        entry_id: Uuid,
    },
}
