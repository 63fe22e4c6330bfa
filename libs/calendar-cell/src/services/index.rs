use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use scheduler_models::{Doctor, SchedulingError, TimeInterval, WorkingWindow};

use crate::models::BusySlot;

/// Per-doctor ordered store of busy intervals.
///
/// Each doctor's calendar sits behind its own lock, so all mutations for one
/// doctor are serialized while other doctors' calendars stay untouched.
/// Reads clone a snapshot and never observe a partial reservation.
pub struct CalendarIndex {
    doctors: RwLock<HashMap<Uuid, Arc<RwLock<DoctorCalendar>>>>,
}

struct DoctorCalendar {
    doctor: Doctor,
    /// Sorted by interval start; pairwise non-overlapping.
    busy: Vec<BusySlot>,
}

impl Default for CalendarIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl CalendarIndex {
    pub fn new() -> Self {
        Self {
            doctors: RwLock::new(HashMap::new()),
        }
    }

    /// Register a doctor, or replace their profile if already known.
    /// Existing reservations are kept on re-registration.
    pub async fn register_doctor(&self, doctor: Doctor) {
        let mut doctors = self.doctors.write().await;
        match doctors.get(&doctor.id) {
            Some(calendar) => {
                debug!("Updating registered doctor {}", doctor.id);
                calendar.write().await.doctor = doctor;
            }
            None => {
                debug!("Registering doctor {} ({})", doctor.id, doctor.specialty);
                doctors.insert(
                    doctor.id,
                    Arc::new(RwLock::new(DoctorCalendar { doctor, busy: Vec::new() })),
                );
            }
        }
    }

    /// Administrative replacement of a doctor's weekly working hours.
    pub async fn update_working_hours(
        &self,
        doctor_id: Uuid,
        windows: Vec<WorkingWindow>,
    ) -> Result<(), SchedulingError> {
        let calendar = self.calendar_for(doctor_id).await?;
        let mut calendar = calendar.write().await;
        calendar.doctor.working_hours = windows;
        debug!("Working hours updated for doctor {}", doctor_id);
        Ok(())
    }

    pub async fn doctor(&self, doctor_id: Uuid) -> Result<Doctor, SchedulingError> {
        let calendar = self.calendar_for(doctor_id).await?;
        let calendar = calendar.read().await;
        Ok(calendar.doctor.clone())
    }

    /// All registered doctors carrying the given specialty tag, in stable
    /// id order so allocation is deterministic.
    pub async fn doctors_with_specialty(&self, specialty: &str) -> Vec<Doctor> {
        let doctors = self.doctors.read().await;
        let mut matching = Vec::new();
        for calendar in doctors.values() {
            let calendar = calendar.read().await;
            if calendar.doctor.specialty.eq_ignore_ascii_case(specialty) {
                matching.push(calendar.doctor.clone());
            }
        }
        matching.sort_by_key(|d| d.id);
        matching
    }

    /// Read-only clone of a doctor's busy set, for pure conflict checks.
    pub async fn busy_snapshot(&self, doctor_id: Uuid) -> Result<Vec<BusySlot>, SchedulingError> {
        let calendar = self.calendar_for(doctor_id).await?;
        let calendar = calendar.read().await;
        Ok(calendar.busy.clone())
    }

    /// Reserve `interval` for `appointment_id`, padding the overlap check
    /// by `buffer`. Atomic per doctor: the check and the insert happen
    /// under one write lock.
    pub async fn reserve(
        &self,
        doctor_id: Uuid,
        appointment_id: Uuid,
        interval: TimeInterval,
        buffer: Duration,
    ) -> Result<(), SchedulingError> {
        let calendar = self.calendar_for(doctor_id).await?;
        let mut calendar = calendar.write().await;
        calendar.insert(appointment_id, interval, buffer)?;
        debug!(
            "Reserved [{} .. {}] for appointment {} with doctor {}",
            interval.start, interval.end, appointment_id, doctor_id
        );
        Ok(())
    }

    /// Reserve the earliest conflict-free sub-interval of `window` of
    /// length `duration`, trying `window.start` first and then stepping
    /// forward. The whole search runs under the doctor's write lock.
    pub async fn reserve_earliest(
        &self,
        doctor_id: Uuid,
        appointment_id: Uuid,
        window: TimeInterval,
        duration: Duration,
        buffer: Duration,
        step: Duration,
    ) -> Result<TimeInterval, SchedulingError> {
        if duration <= Duration::zero() {
            return Err(SchedulingError::InvalidWindow(
                "appointment duration must be positive".to_string(),
            ));
        }
        let step = if step > Duration::zero() { step } else { duration };

        let calendar = self.calendar_for(doctor_id).await?;
        let mut calendar = calendar.write().await;

        let mut start = window.start;
        while start + duration <= window.end {
            let candidate = TimeInterval { start, end: start + duration };
            match calendar.insert(appointment_id, candidate, buffer) {
                Ok(()) => {
                    debug!(
                        "Reserved earliest slot [{} .. {}] for appointment {} with doctor {}",
                        candidate.start, candidate.end, appointment_id, doctor_id
                    );
                    return Ok(candidate);
                }
                Err(SchedulingError::Conflict) | Err(SchedulingError::InvalidWindow(_)) => {
                    start += step;
                }
                Err(e) => return Err(e),
            }
        }
        Err(SchedulingError::Conflict)
    }

    /// Remove the reservation held by `appointment_id` and return the freed
    /// interval, so the caller can attempt a waitlist promotion within the
    /// same unit of work.
    pub async fn release(
        &self,
        doctor_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<TimeInterval, SchedulingError> {
        let calendar = self.calendar_for(doctor_id).await?;
        let mut calendar = calendar.write().await;
        let position = calendar
            .busy
            .iter()
            .position(|slot| slot.appointment_id == appointment_id);
        match position {
            Some(i) => {
                let freed = calendar.busy.remove(i).interval;
                debug!(
                    "Released [{} .. {}] for appointment {} with doctor {}",
                    freed.start, freed.end, appointment_id, doctor_id
                );
                Ok(freed)
            }
            None => {
                warn!(
                    "Release requested for appointment {} with no reservation on doctor {}",
                    appointment_id, doctor_id
                );
                Err(SchedulingError::NotFound(appointment_id))
            }
        }
    }

    /// Free sub-intervals of `window`: working hours minus busy slots.
    pub async fn query_availability(
        &self,
        doctor_id: Uuid,
        window: TimeInterval,
    ) -> Result<Vec<TimeInterval>, SchedulingError> {
        let calendar = self.calendar_for(doctor_id).await?;
        let calendar = calendar.read().await;

        let mut free = Vec::new();
        let mut day = window.start.date_naive();
        let last = window.end.date_naive();
        while day <= last {
            for working in calendar.doctor.windows_for(day) {
                if let Some(segment) = working.intersection(&window) {
                    subtract_busy(segment, &calendar.busy, &mut free);
                }
            }
            day = day.succ_opt().expect("date overflow");
        }
        Ok(free)
    }

    async fn calendar_for(
        &self,
        doctor_id: Uuid,
    ) -> Result<Arc<RwLock<DoctorCalendar>>, SchedulingError> {
        let doctors = self.doctors.read().await;
        doctors
            .get(&doctor_id)
            .cloned()
            .ok_or(SchedulingError::UnknownDoctor(doctor_id))
    }
}

impl DoctorCalendar {
    /// Overlap check plus sorted insert. O(log n + k) where k is the number
    /// of slots intersecting the padded probe.
    fn insert(
        &mut self,
        appointment_id: Uuid,
        interval: TimeInterval,
        buffer: Duration,
    ) -> Result<(), SchedulingError> {
        if !self.doctor.covers(&interval) {
            return Err(SchedulingError::InvalidWindow(format!(
                "interval [{} .. {}] is outside doctor {}'s working hours",
                interval.start, interval.end, self.doctor.id
            )));
        }
        if !overlapping(&self.busy, interval, buffer).is_empty() {
            return Err(SchedulingError::Conflict);
        }
        let at = self
            .busy
            .partition_point(|slot| slot.interval.start < interval.start);
        self.busy.insert(at, BusySlot { appointment_id, interval });
        Ok(())
    }
}

/// Busy slots whose interval intersects `probe` padded by `buffer`.
/// Pure over the given snapshot; binary search on the sorted starts.
pub fn overlapping(busy: &[BusySlot], probe: TimeInterval, buffer: Duration) -> Vec<BusySlot> {
    let padded = probe.padded(buffer);
    let first = busy.partition_point(|slot| slot.interval.end <= padded.start);
    busy[first..]
        .iter()
        .take_while(|slot| slot.interval.start < padded.end)
        .copied()
        .collect()
}

/// Carve the busy slots out of `segment`, appending the remaining free
/// pieces to `out`.
fn subtract_busy(segment: TimeInterval, busy: &[BusySlot], out: &mut Vec<TimeInterval>) {
    let mut cursor = segment.start;
    for slot in overlapping(busy, segment, Duration::zero()) {
        if slot.interval.start > cursor {
            out.push(TimeInterval { start: cursor, end: slot.interval.start.min(segment.end) });
        }
        cursor = cursor.max(slot.interval.end);
        if cursor >= segment.end {
            return;
        }
    }
    if cursor < segment.end {
        out.push(TimeInterval { start: cursor, end: segment.end });
    }
}
