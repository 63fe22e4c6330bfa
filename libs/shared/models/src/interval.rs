use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchedulingError;

/// Half-open time range `[start, end)` on the UTC timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, SchedulingError> {
        if end <= start {
            return Err(SchedulingError::InvalidWindow(format!(
                "interval must have positive duration ({} >= {})",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn from_duration(start: DateTime<Utc>, duration: Duration) -> Result<Self, SchedulingError> {
        Self::new(start, start + duration)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Two intervals overlap when start1 < end2 AND start2 < end1.
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &TimeInterval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// The interval extended by `buffer` on both sides. A zero buffer is the
    /// identity; negative buffers are treated as zero.
    pub fn padded(&self, buffer: Duration) -> TimeInterval {
        let buffer = buffer.max(Duration::zero());
        TimeInterval {
            start: self.start - buffer,
            end: self.end + buffer,
        }
    }

    pub fn intersection(&self, other: &TimeInterval) -> Option<TimeInterval> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            Some(TimeInterval { start, end })
        } else {
            None
        }
    }

    /// Calendar day the interval starts on; used for waitlist bucketing.
    pub fn day(&self) -> NaiveDate {
        self.start.date_naive()
    }
}
