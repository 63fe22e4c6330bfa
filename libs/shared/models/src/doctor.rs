use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::interval::TimeInterval;

/// Weekly recurring working-hours window for a doctor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingWindow {
    pub day_of_week: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl WorkingWindow {
    /// Materialize the window on a concrete date. `None` when the date falls
    /// on a different weekday or the window is degenerate.
    pub fn on_date(&self, date: NaiveDate) -> Option<TimeInterval> {
        if date.weekday() != self.day_of_week || self.start >= self.end {
            return None;
        }
        Some(TimeInterval {
            start: date.and_time(self.start).and_utc(),
            end: date.and_time(self.end).and_utc(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    pub specialty: String,
    pub working_hours: Vec<WorkingWindow>,
    /// Per-doctor conflict padding; surgeons and the like can require
    /// more than the engine-wide default.
    pub buffer_minutes: i64,
}

impl Doctor {
    /// Working windows materialized for a concrete date, sorted by start.
    pub fn windows_for(&self, date: NaiveDate) -> Vec<TimeInterval> {
        let mut windows: Vec<TimeInterval> = self
            .working_hours
            .iter()
            .filter_map(|w| w.on_date(date))
            .collect();
        windows.sort_by_key(|w| w.start);
        windows
    }

    /// Whether an interval sits entirely inside one working window on the
    /// day it starts. Cross-midnight appointments are not supported.
    pub fn covers(&self, interval: &TimeInterval) -> bool {
        self.windows_for(interval.day())
            .iter()
            .any(|w| w.contains(interval))
    }

    /// Whether any working window intersects the given window at all.
    /// Used to tell a structurally invalid request from a mere conflict.
    pub fn intersects_working_hours(&self, window: &TimeInterval) -> bool {
        let mut day = window.start.date_naive();
        let last = window.end.date_naive();
        while day <= last {
            if self
                .windows_for(day)
                .iter()
                .any(|w| w.overlaps(window))
            {
                return true;
            }
            day = day.succ_opt().expect("date overflow");
        }
        false
    }
}

/// How a booking request names its doctor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum DoctorSelector {
    /// Exactly this doctor.
    Specific(Uuid),
    /// Any registered doctor carrying this specialty tag.
    AnySpecialty(String),
}
