use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use calendar_cell::CalendarIndex;
use scheduler_config::SchedulerConfig;
use scheduler_models::{Doctor, DoctorSelector, SchedulingError, TimeInterval};

use crate::models::{BucketKey, PromotedEntry, WaitlistEntry, WaitlistStats};

/// Ordered queues of parked booking requests.
///
/// Entries are FIFO within a (target, day) bucket, each bucket behind its
/// own lock. Promotion reserves through the calendar index; an entry that
/// fails to re-reserve stays at its original position.
pub struct WaitlistManager {
    calendar: Arc<CalendarIndex>,
    buckets: RwLock<HashMap<BucketKey, Arc<RwLock<VecDeque<WaitlistEntry>>>>>,
    config: SchedulerConfig,
}

impl WaitlistManager {
    pub fn new(calendar: Arc<CalendarIndex>, config: SchedulerConfig) -> Self {
        Self {
            calendar,
            buckets: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Append an entry to its bucket and return its 1-based queue position.
    pub async fn enqueue(&self, entry: WaitlistEntry) -> usize {
        let key = entry.bucket_key();
        let bucket = {
            let mut buckets = self.buckets.write().await;
            buckets.entry(key.clone()).or_default().clone()
        };
        let mut bucket = bucket.write().await;
        bucket.push_back(entry.clone());
        let position = bucket.len();
        debug!(
            "Waitlisted entry {} for {:?} on {} at position {}",
            entry.id, key.target, key.day, position
        );
        position
    }

    /// Current 1-based position of an entry within its bucket.
    pub async fn position(&self, entry_id: Uuid) -> Option<usize> {
        let buckets = self.buckets.read().await;
        for bucket in buckets.values() {
            let bucket = bucket.read().await;
            if let Some(i) = bucket.iter().position(|e| e.id == entry_id) {
                return Some(i + 1);
            }
        }
        None
    }

    /// Remove an entry outright (cancelled by the patient).
    pub async fn remove(&self, entry_id: Uuid) -> Option<WaitlistEntry> {
        let buckets = self.buckets.read().await;
        for bucket in buckets.values() {
            let mut bucket = bucket.write().await;
            if let Some(i) = bucket.iter().position(|e| e.id == entry_id) {
                let entry = bucket.remove(i);
                debug!("Removed waitlist entry {}", entry_id);
                return entry;
            }
        }
        None
    }

    /// Remove the entry attached to a pending appointment, if any.
    pub async fn remove_by_appointment(&self, appointment_id: Uuid) -> Option<WaitlistEntry> {
        let buckets = self.buckets.read().await;
        for bucket in buckets.values() {
            let mut bucket = bucket.write().await;
            if let Some(i) = bucket.iter().position(|e| e.appointment_id == appointment_id) {
                let entry = bucket.remove(i);
                debug!("Removed waitlist entry for appointment {}", appointment_id);
                return entry;
            }
        }
        None
    }

    /// Try to fill a freed interval on `doctor`'s calendar with the oldest
    /// compatible entry, looking at both the doctor-specific bucket and the
    /// bucket for the doctor's specialty.
    ///
    /// At most one entry is consumed. Entries whose reservation fails (for
    /// example a race with a direct booking) keep their position.
    pub async fn promote(
        &self,
        doctor: &Doctor,
        freed: TimeInterval,
        now: DateTime<Utc>,
    ) -> Result<Option<PromotedEntry>, SchedulingError> {
        let day = freed.day();
        let keys = [
            BucketKey::new(DoctorSelector::Specific(doctor.id), day),
            BucketKey::new(DoctorSelector::AnySpecialty(doctor.specialty.clone()), day),
        ];

        // Fixed acquisition order; promote is the only path locking two
        // buckets at once.
        let handles: Vec<_> = {
            let buckets = self.buckets.read().await;
            keys.iter().filter_map(|key| buckets.get(key).cloned()).collect()
        };
        let mut guards = Vec::with_capacity(handles.len());
        for handle in &handles {
            guards.push(handle.write().await);
        }

        // Oldest compatible entry first, across both buckets.
        let mut candidates: Vec<(usize, Uuid, DateTime<Utc>)> = Vec::new();
        for (b, guard) in guards.iter().enumerate() {
            for entry in guard.iter() {
                if !entry.is_expired(now) && entry.window.overlaps(&freed) {
                    candidates.push((b, entry.id, entry.enqueued_at));
                }
            }
        }
        candidates.sort_by_key(|&(_, _, enqueued_at)| enqueued_at);

        let step = Duration::minutes(self.config.slot_increment_minutes);
        for (b, entry_id, _) in candidates {
            let entry = guards[b]
                .iter()
                .find(|e| e.id == entry_id)
                .cloned()
                .expect("candidate entry vanished while bucket locked");
            let reserved = self
                .calendar
                .reserve_earliest(
                    doctor.id,
                    entry.appointment_id,
                    entry.window,
                    Duration::minutes(entry.duration_minutes),
                    Duration::minutes(entry.buffer_minutes),
                    step,
                )
                .await;
            match reserved {
                Ok(reserved) => {
                    let i = guards[b]
                        .iter()
                        .position(|e| e.id == entry_id)
                        .expect("candidate entry vanished while bucket locked");
                    guards[b].remove(i);
                    info!(
                        "Promoted waitlist entry {} to [{} .. {}] with doctor {}",
                        entry.id, reserved.start, reserved.end, doctor.id
                    );
                    return Ok(Some(PromotedEntry {
                        entry,
                        doctor_id: doctor.id,
                        reserved,
                    }));
                }
                Err(SchedulingError::Conflict) => {
                    // Entry stays where it was; try the next-oldest.
                    debug!(
                        "Promotion attempt for entry {} could not re-reserve, keeping position",
                        entry.id
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Days that currently hold entries addressed to this doctor, either
    /// directly or through their specialty. Used when a working-hours
    /// change opens new time to promote into.
    pub async fn bucketed_days(&self, doctor: &Doctor) -> Vec<NaiveDate> {
        let buckets = self.buckets.read().await;
        let mut days = Vec::new();
        for (key, bucket) in buckets.iter() {
            let addressed = match &key.target {
                DoctorSelector::Specific(id) => *id == doctor.id,
                DoctorSelector::AnySpecialty(tag) => doctor.specialty.eq_ignore_ascii_case(tag),
            };
            if addressed && !bucket.read().await.is_empty() && !days.contains(&key.day) {
                days.push(key.day);
            }
        }
        days.sort();
        days
    }

    /// Drain every entry past its TTL. Expired entries are returned, never
    /// silently dropped; the caller signals each one.
    pub async fn expire(&self, now: DateTime<Utc>) -> Vec<WaitlistEntry> {
        let mut expired = Vec::new();
        let mut buckets = self.buckets.write().await;
        for bucket in buckets.values() {
            let mut bucket = bucket.write().await;
            let mut i = 0;
            while i < bucket.len() {
                if bucket[i].is_expired(now) {
                    if let Some(entry) = bucket.remove(i) {
                        expired.push(entry);
                    }
                } else {
                    i += 1;
                }
            }
        }
        buckets.retain(|_, bucket| {
            bucket.try_read().map(|b| !b.is_empty()).unwrap_or(true)
        });
        if !expired.is_empty() {
            warn!("Expired {} waitlist entries", expired.len());
            expired.sort_by_key(|e| e.enqueued_at);
        }
        expired
    }

    pub async fn stats(&self) -> WaitlistStats {
        let buckets = self.buckets.read().await;
        let mut total_entries = 0;
        for bucket in buckets.values() {
            total_entries += bucket.read().await.len();
        }
        WaitlistStats {
            total_entries,
            buckets: buckets.len(),
        }
    }
}
