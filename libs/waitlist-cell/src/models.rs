use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scheduler_models::{DoctorSelector, TimeInterval};

/// A booking request parked until a compatible slot frees up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: Uuid,
    /// The Pending appointment this entry is attached to.
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub target: DoctorSelector,
    /// Acceptable range for the appointment; the original request start is
    /// `window.start`.
    pub window: TimeInterval,
    pub duration_minutes: i64,
    pub buffer_minutes: i64,
    pub enqueued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl WaitlistEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn bucket_key(&self) -> BucketKey {
        BucketKey::new(self.target.clone(), self.window.day())
    }
}

/// Waitlist bucket: FIFO per (target, day of requested window).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub target: DoctorSelector,
    pub day: NaiveDate,
}

impl BucketKey {
    /// Specialty tags are matched case-insensitively, so keys carry them
    /// lowercased.
    pub fn new(target: DoctorSelector, day: NaiveDate) -> Self {
        let target = match target {
            DoctorSelector::AnySpecialty(tag) => DoctorSelector::AnySpecialty(tag.to_lowercase()),
            specific => specific,
        };
        Self { target, day }
    }
}

/// A consumed entry together with the slot it won.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotedEntry {
    pub entry: WaitlistEntry,
    pub doctor_id: Uuid,
    pub reserved: TimeInterval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistStats {
    pub total_entries: usize,
    pub buckets: usize,
}
