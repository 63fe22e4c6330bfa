use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use scheduler_config::SchedulerConfig;
use scheduler_models::{SchedulingError, TimeInterval};

use crate::models::DayAvailability;
use crate::services::index::{overlapping, CalendarIndex};

/// Slot generation and calendar summaries on top of the calendar index.
pub struct AvailabilityService {
    calendar: Arc<CalendarIndex>,
    config: SchedulerConfig,
}

impl AvailabilityService {
    pub fn new(calendar: Arc<CalendarIndex>, config: SchedulerConfig) -> Self {
        Self { calendar, config }
    }

    /// Free sub-intervals of `window` (working hours minus reservations).
    pub async fn free_intervals(
        &self,
        doctor_id: Uuid,
        window: TimeInterval,
    ) -> Result<Vec<TimeInterval>, SchedulingError> {
        self.calendar.query_availability(doctor_id, window).await
    }

    /// Bookable slots of `duration` on `date`, stepped by the configured
    /// slot increment. `hide_past` drops slots that already started as of
    /// `now` (only meaningful when `date` is today).
    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        duration: Option<Duration>,
        hide_past: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<TimeInterval>, SchedulingError> {
        let doctor = self.calendar.doctor(doctor_id).await?;
        let busy = self.calendar.busy_snapshot(doctor_id).await?;
        let step = Duration::minutes(self.config.slot_increment_minutes);
        let duration = duration.unwrap_or(step);
        if duration <= Duration::zero() {
            return Err(SchedulingError::InvalidWindow(
                "slot duration must be positive".to_string(),
            ));
        }
        let buffer = Duration::minutes(doctor.buffer_minutes);

        let mut slots = Vec::new();
        for working in doctor.windows_for(date) {
            let mut start = working.start;
            while start + duration <= working.end {
                let candidate = TimeInterval { start, end: start + duration };
                if overlapping(&busy, candidate, buffer).is_empty()
                    && !(hide_past && candidate.start <= now)
                {
                    slots.push(candidate);
                }
                start += step;
            }
        }
        debug!(
            "Doctor {} has {} bookable slots on {}",
            doctor_id,
            slots.len(),
            date
        );
        Ok(slots)
    }

    /// Per-day availability over a date range, hard-capped to keep huge
    /// ranges from freezing callers.
    pub async fn availability_calendar(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DayAvailability>, SchedulingError> {
        let (mut day, mut last) = if from <= to { (from, to) } else { (to, from) };
        let cap = day + chrono::Days::new(self.config.max_calendar_days as u64);
        if last > cap {
            last = cap;
        }

        let mut calendar = Vec::new();
        while day <= last {
            let slots = self
                .available_slots(doctor_id, day, None, false, Utc::now())
                .await?;
            calendar.push(DayAvailability {
                date: day,
                available: !slots.is_empty(),
                free_slots: slots.len(),
            });
            day = day.succ_opt().expect("date overflow");
        }
        Ok(calendar)
    }

    /// Days in the range that still have at least one bookable slot.
    pub async fn available_dates(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>, SchedulingError> {
        Ok(self
            .availability_calendar(doctor_id, from, to)
            .await?
            .into_iter()
            .filter(|day| day.available)
            .map(|day| day.date)
            .collect())
    }
}
