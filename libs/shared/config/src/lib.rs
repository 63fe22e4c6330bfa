use std::env;
use tracing::warn;

use serde::{Deserialize, Serialize};

/// Runtime tuning knobs for the scheduling engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Default padding applied around intervals during conflict checks,
    /// used when neither the doctor nor the request overrides it.
    pub default_buffer_minutes: i64,
    /// Time-to-live for waitlist entries before the expiry sweep removes them.
    pub waitlist_ttl_hours: i64,
    /// Step used when generating bookable slots and searching for
    /// alternative start times.
    pub slot_increment_minutes: i64,
    /// How far ahead next-available-slot searches are allowed to look.
    pub max_search_days: i64,
    /// Hard cap on availability-calendar ranges.
    pub max_calendar_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_buffer_minutes: 0,
            waitlist_ttl_hours: 48,
            slot_increment_minutes: 30,
            max_search_days: 7,
            max_calendar_days: 365,
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        // Zero is a legal buffer, everything else must move time forward.
        Self {
            default_buffer_minutes: read_i64("SCHEDULER_DEFAULT_BUFFER_MINUTES", defaults.default_buffer_minutes, 0),
            waitlist_ttl_hours: read_i64("SCHEDULER_WAITLIST_TTL_HOURS", defaults.waitlist_ttl_hours, 1),
            slot_increment_minutes: read_i64("SCHEDULER_SLOT_INCREMENT_MINUTES", defaults.slot_increment_minutes, 1),
            max_search_days: read_i64("SCHEDULER_MAX_SEARCH_DAYS", defaults.max_search_days, 1),
            max_calendar_days: read_i64("SCHEDULER_MAX_CALENDAR_DAYS", defaults.max_calendar_days, 1),
        }
    }
}

fn read_i64(key: &str, default: i64, min: i64) -> i64 {
    match env::var(key) {
        Ok(raw) => match raw.parse::<i64>() {
            Ok(value) if value >= min => value,
            _ => {
                warn!("{} has invalid value {:?}, using default {}", key, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}
