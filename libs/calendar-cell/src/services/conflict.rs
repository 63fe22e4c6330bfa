use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use scheduler_config::SchedulerConfig;
use scheduler_models::{SchedulingError, TimeInterval};

use crate::models::{ConflictReport, SuggestedSlot};
use crate::services::index::{overlapping, CalendarIndex};

/// Read-only conflict checks and alternative-slot suggestions.
///
/// Every check runs over a snapshot of the doctor's busy set, so previews
/// can proceed concurrently with other doctors' mutations.
pub struct ConflictDetector {
    calendar: Arc<CalendarIndex>,
    config: SchedulerConfig,
}

impl ConflictDetector {
    pub fn new(calendar: Arc<CalendarIndex>, config: SchedulerConfig) -> Self {
        Self { calendar, config }
    }

    /// Check a proposed interval against the doctor's current busy set,
    /// padded by `buffer`. Side-effect free; suggestions are only computed
    /// when a conflict exists.
    pub async fn check(
        &self,
        doctor_id: Uuid,
        interval: TimeInterval,
        buffer: Duration,
    ) -> Result<ConflictReport, SchedulingError> {
        debug!(
            "Checking conflicts for doctor {} over [{} .. {}]",
            doctor_id, interval.start, interval.end
        );
        let busy = self.calendar.busy_snapshot(doctor_id).await?;
        let conflicting_slots = overlapping(&busy, interval, buffer);
        let has_conflict = !conflicting_slots.is_empty();

        let suggested_alternatives = if has_conflict {
            warn!(
                "Conflict detected for doctor {}: {} overlapping reservations",
                doctor_id,
                conflicting_slots.len()
            );
            self.suggest_alternatives(doctor_id, interval, 3).await?
        } else {
            Vec::new()
        };

        Ok(ConflictReport {
            has_conflict,
            conflicting_slots,
            suggested_alternatives,
        })
    }

    /// Earliest conflict-free slot of the given duration at or after
    /// `preferred_start`, restricted to working hours. Scans in slot
    /// increments up to `max_search_days` ahead.
    pub async fn find_next_available_slot(
        &self,
        doctor_id: Uuid,
        preferred_start: DateTime<Utc>,
        duration: Duration,
        max_search_days: i64,
    ) -> Result<Option<TimeInterval>, SchedulingError> {
        let doctor = self.calendar.doctor(doctor_id).await?;
        let busy = self.calendar.busy_snapshot(doctor_id).await?;
        let buffer = Duration::minutes(doctor.buffer_minutes);
        let step = Duration::minutes(self.config.slot_increment_minutes);
        let search_end = preferred_start + Duration::days(max_search_days);

        let mut start = preferred_start;
        while start < search_end {
            let candidate = TimeInterval { start, end: start + duration };
            if doctor.covers(&candidate) && overlapping(&busy, candidate, buffer).is_empty() {
                return Ok(Some(candidate));
            }
            start += step;
        }
        Ok(None)
    }

    /// Up to `limit` alternative slots: the rest of the same day first,
    /// then the following days within the configured search horizon.
    pub async fn suggest_alternatives(
        &self,
        doctor_id: Uuid,
        original: TimeInterval,
        limit: usize,
    ) -> Result<Vec<SuggestedSlot>, SchedulingError> {
        let doctor = self.calendar.doctor(doctor_id).await?;
        let busy = self.calendar.busy_snapshot(doctor_id).await?;
        let buffer = Duration::minutes(doctor.buffer_minutes);
        let step = Duration::minutes(self.config.slot_increment_minutes);
        let duration = original.duration();

        let mut suggestions = Vec::new();
        let horizon = original.start + Duration::days(self.config.max_search_days);
        let mut start = original.start + step;
        while start < horizon && suggestions.len() < limit {
            let candidate = TimeInterval { start, end: start + duration };
            if doctor.covers(&candidate) && overlapping(&busy, candidate, buffer).is_empty() {
                suggestions.push(SuggestedSlot { doctor_id, interval: candidate });
            }
            start += step;
        }
        Ok(suggestions)
    }
}
