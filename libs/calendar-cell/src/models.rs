use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scheduler_models::TimeInterval;

/// One reserved interval on a doctor's calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusySlot {
    pub appointment_id: Uuid,
    pub interval: TimeInterval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedSlot {
    pub doctor_id: Uuid,
    pub interval: TimeInterval,
}

/// Result of a read-only conflict check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictReport {
    pub has_conflict: bool,
    pub conflicting_slots: Vec<BusySlot>,
    pub suggested_alternatives: Vec<SuggestedSlot>,
}

/// One row of the per-day availability calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub available: bool,
    pub free_slots: usize,
}
