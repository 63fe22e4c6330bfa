use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use calendar_cell::{CalendarIndex, ConflictDetector, ConflictReport};
use scheduler_config::SchedulerConfig;
use scheduler_models::{
    Appointment, AppointmentStatus, Doctor, DoctorSelector, SchedulingError, TimeInterval,
    WorkingWindow,
};
use waitlist_cell::{WaitlistEntry, WaitlistManager};

use crate::collaborators::{NotificationSink, PersistenceSink};
use crate::models::{
    BookingOutcome, BookingRequest, CancelOutcome, ReassignOutcome, SchedulingEvent,
};
use crate::services::lifecycle::LifecycleService;

/// Booking orchestrator: direct reservation, waitlist fallback,
/// cancellation with synchronous promotion, and reassignment.
///
/// Appointments are retained after cancellation for audit; the map is the
/// engine's authoritative record, persistence writes are fire-and-forget.
pub struct AllocatorService {
    calendar: Arc<CalendarIndex>,
    conflicts: ConflictDetector,
    waitlist: Arc<WaitlistManager>,
    lifecycle: LifecycleService,
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    persistence: Arc<dyn PersistenceSink>,
    notifier: Arc<dyn NotificationSink>,
    config: SchedulerConfig,
}

impl AllocatorService {
    pub fn new(
        calendar: Arc<CalendarIndex>,
        waitlist: Arc<WaitlistManager>,
        persistence: Arc<dyn PersistenceSink>,
        notifier: Arc<dyn NotificationSink>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            conflicts: ConflictDetector::new(calendar.clone(), config.clone()),
            calendar,
            waitlist,
            lifecycle: LifecycleService::new(),
            appointments: RwLock::new(HashMap::new()),
            persistence,
            notifier,
            config,
        }
    }

    /// Read-only conflict preview for a proposed interval.
    pub async fn preview(
        &self,
        doctor_id: Uuid,
        interval: TimeInterval,
        buffer_minutes: Option<i64>,
    ) -> Result<ConflictReport, SchedulingError> {
        let doctor = self.calendar.doctor(doctor_id).await?;
        let buffer = self.effective_buffer(&doctor, buffer_minutes);
        self.conflicts.check(doctor_id, interval, buffer).await
    }

    /// Book an appointment. Tries a direct reservation with every candidate
    /// doctor; falls back to the waitlist on conflict. `Rejected` is
    /// returned only for structurally invalid input.
    pub async fn book(&self, request: BookingRequest) -> BookingOutcome {
        let duration = Duration::minutes(request.duration_minutes);
        if duration <= Duration::zero() {
            return BookingOutcome::Rejected {
                reason: SchedulingError::InvalidWindow(
                    "appointment duration must be positive".to_string(),
                ),
            };
        }
        if request.window.duration() < duration {
            return BookingOutcome::Rejected {
                reason: SchedulingError::InvalidWindow(
                    "requested window is shorter than the appointment duration".to_string(),
                ),
            };
        }

        let candidates = match self.resolve_candidates(&request.target).await {
            Ok(candidates) => candidates,
            Err(reason) => return BookingOutcome::Rejected { reason },
        };
        let workable: Vec<&Doctor> = candidates
            .iter()
            .filter(|d| d.intersects_working_hours(&request.window))
            .collect();
        if workable.is_empty() {
            return BookingOutcome::Rejected {
                reason: SchedulingError::InvalidWindow(
                    "requested window falls outside every candidate's working hours".to_string(),
                ),
            };
        }

        let appointment_id = Uuid::new_v4();
        let step = Duration::minutes(self.config.slot_increment_minutes);
        let mut duplicates = 0;
        for doctor in &workable {
            if self
                .has_same_day_booking(request.patient_id, doctor.id, &request.window)
                .await
            {
                debug!(
                    "Patient {} already has an active appointment with doctor {} that day",
                    request.patient_id, doctor.id
                );
                duplicates += 1;
                continue;
            }

            let buffer = self.effective_buffer(doctor, request.buffer_minutes);
            match self
                .calendar
                .reserve_earliest(doctor.id, appointment_id, request.window, duration, buffer, step)
                .await
            {
                Ok(reserved) => {
                    let now = Utc::now();
                    let appointment = Appointment {
                        id: appointment_id,
                        patient_id: request.patient_id,
                        doctor_id: Some(doctor.id),
                        interval: reserved,
                        status: AppointmentStatus::Confirmed,
                        created_at: now,
                        updated_at: now,
                    };
                    // The duplicate guard above ran under an earlier read
                    // lock; re-check under the write lock so two concurrent
                    // bookings by the same patient cannot both land.
                    let raced = {
                        let mut appointments = self.appointments.write().await;
                        if holds_same_day(
                            &appointments,
                            request.patient_id,
                            doctor.id,
                            reserved.day(),
                        ) {
                            true
                        } else {
                            appointments.insert(appointment_id, appointment.clone());
                            false
                        }
                    };
                    if raced {
                        debug!(
                            "Concurrent booking by patient {} won the same-day slot with doctor {}",
                            request.patient_id, doctor.id
                        );
                        if let Err(e) = self.calendar.release(doctor.id, appointment_id).await {
                            warn!(
                                "Could not release raced reservation {}: {}",
                                appointment_id, e
                            );
                        }
                        duplicates += 1;
                        continue;
                    }
                    info!(
                        "Confirmed appointment {} for patient {} with doctor {}",
                        appointment_id, request.patient_id, doctor.id
                    );
                    self.persist_appointment(&appointment).await;
                    self.emit(SchedulingEvent::Confirmed(appointment.clone())).await;
                    return BookingOutcome::Confirmed(appointment);
                }
                Err(SchedulingError::Conflict) => continue,
                Err(e) => {
                    warn!("Reservation attempt with doctor {} failed: {}", doctor.id, e);
                    continue;
                }
            }
        }

        if duplicates == workable.len() {
            return BookingOutcome::Rejected {
                reason: SchedulingError::ValidationError(
                    "patient already has an appointment with this doctor on that day".to_string(),
                ),
            };
        }

        self.waitlist_request(appointment_id, request).await
    }

    /// Replace a doctor's weekly working hours, then offer the newly opened
    /// time to the waitlist: requests parked because their window fell
    /// outside the old template get promoted here. Returns the appointments
    /// confirmed as a result.
    pub async fn update_working_hours(
        &self,
        doctor_id: Uuid,
        windows: Vec<WorkingWindow>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        self.calendar.update_working_hours(doctor_id, windows).await?;
        let doctor = self.calendar.doctor(doctor_id).await?;
        let now = Utc::now();

        let mut promoted = Vec::new();
        for day in self.waitlist.bucketed_days(&doctor).await {
            for window in doctor.windows_for(day) {
                // A widened template can admit several parked requests.
                while let Some(won) = self.waitlist.promote(&doctor, window, now).await? {
                    promoted.push(self.confirm_promotion(won, now).await?);
                }
            }
        }
        if !promoted.is_empty() {
            info!(
                "Working-hours change for doctor {} promoted {} waitlisted requests",
                doctor_id,
                promoted.len()
            );
        }
        Ok(promoted)
    }

    /// Cancel an appointment. Cancelling a Confirmed appointment releases
    /// its slot and attempts exactly one waitlist promotion before the
    /// cancellation is reported, so an observer never sees a freed slot the
    /// waitlist was not offered.
    pub async fn cancel(&self, appointment_id: Uuid) -> Result<CancelOutcome, SchedulingError> {
        let now = Utc::now();
        let (cancelled, doctor_id) = {
            let mut appointments = self.appointments.write().await;
            let appointment = appointments
                .get_mut(&appointment_id)
                .ok_or(SchedulingError::NotFound(appointment_id))?;
            self.lifecycle
                .validate_status_transition(&appointment.status, &AppointmentStatus::Cancelled)?;
            let was_confirmed = appointment.status == AppointmentStatus::Confirmed;
            appointment.status = AppointmentStatus::Cancelled;
            appointment.updated_at = now;
            (appointment.clone(), appointment.doctor_id.filter(|_| was_confirmed))
        };

        let mut promoted = None;
        if let Some(doctor_id) = doctor_id {
            let freed = self.calendar.release(doctor_id, appointment_id).await?;
            let doctor = self.calendar.doctor(doctor_id).await?;
            if let Some(won) = self.waitlist.promote(&doctor, freed, now).await? {
                promoted = Some(self.confirm_promotion(won, now).await?);
            }
        } else {
            // Waitlisted request: drop its entry alongside the appointment.
            if let Some(entry) = self.waitlist.remove_by_appointment(appointment_id).await {
                self.delete_entry(entry.id).await;
            }
        }

        info!("Cancelled appointment {}", appointment_id);
        self.persist_appointment(&cancelled).await;
        self.emit(SchedulingEvent::Cancelled(cancelled.clone())).await;
        Ok(CancelOutcome { cancelled, promoted })
    }

    /// Mark a Confirmed appointment Completed and release its slot. The
    /// completed interval lies in the past, so no promotion is attempted.
    pub async fn complete(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        let completed = {
            let mut appointments = self.appointments.write().await;
            let appointment = appointments
                .get_mut(&appointment_id)
                .ok_or(SchedulingError::NotFound(appointment_id))?;
            self.lifecycle
                .validate_status_transition(&appointment.status, &AppointmentStatus::Completed)?;
            appointment.status = AppointmentStatus::Completed;
            appointment.updated_at = Utc::now();
            appointment.clone()
        };

        if let Some(doctor_id) = completed.doctor_id {
            if let Err(e) = self.calendar.release(doctor_id, appointment_id).await {
                warn!("Completed appointment {} held no reservation: {}", appointment_id, e);
            }
        }
        info!("Completed appointment {}", appointment_id);
        self.persist_appointment(&completed).await;
        Ok(completed)
    }

    /// Cancel-then-rebook. Explicitly no rollback: when the new booking is
    /// not confirmed the old slot stays released (a waitlisted request may
    /// already have claimed it) and the caller must re-book.
    pub async fn reassign(
        &self,
        appointment_id: Uuid,
        new_target: DoctorSelector,
        new_window: TimeInterval,
        duration_minutes: Option<i64>,
    ) -> Result<ReassignOutcome, SchedulingError> {
        let existing = self
            .appointment(appointment_id)
            .await
            .ok_or(SchedulingError::NotFound(appointment_id))?;
        if existing.status != AppointmentStatus::Confirmed {
            if existing.status.is_terminal() {
                return Err(SchedulingError::AlreadyTerminal(existing.status));
            }
            return Err(SchedulingError::ValidationError(
                "only confirmed appointments can be reassigned".to_string(),
            ));
        }

        let duration_minutes =
            duration_minutes.unwrap_or_else(|| existing.interval.duration().num_minutes());
        let outcome = self.cancel(appointment_id).await?;
        let rebooked = self
            .book(BookingRequest {
                patient_id: existing.patient_id,
                target: new_target,
                window: new_window,
                duration_minutes,
                buffer_minutes: None,
            })
            .await;
        Ok(ReassignOutcome {
            cancelled: outcome.cancelled,
            promoted: outcome.promoted,
            rebooked,
        })
    }

    /// Sweep expired waitlist entries: each one's pending appointment is
    /// cancelled and an Expired event fires. Nothing vanishes silently.
    pub async fn expire_sweep(&self, now: DateTime<Utc>) -> Vec<WaitlistEntry> {
        let expired = self.waitlist.expire(now).await;
        for entry in &expired {
            let appointment = {
                let mut appointments = self.appointments.write().await;
                appointments.get_mut(&entry.appointment_id).map(|appointment| {
                    if appointment.status == AppointmentStatus::Pending {
                        appointment.status = AppointmentStatus::Cancelled;
                        appointment.updated_at = now;
                    }
                    appointment.clone()
                })
            };
            self.delete_entry(entry.id).await;
            if let Some(appointment) = appointment {
                self.persist_appointment(&appointment).await;
                self.emit(SchedulingEvent::Expired {
                    appointment,
                    entry_id: entry.id,
                })
                .await;
            } else {
                warn!(
                    "Expired waitlist entry {} had no pending appointment {}",
                    entry.id, entry.appointment_id
                );
            }
        }
        expired
    }

    pub async fn appointment(&self, appointment_id: Uuid) -> Option<Appointment> {
        self.appointments.read().await.get(&appointment_id).cloned()
    }

    pub async fn appointments_for_patient(&self, patient_id: Uuid) -> Vec<Appointment> {
        let appointments = self.appointments.read().await;
        let mut found: Vec<Appointment> = appointments
            .values()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.interval.start);
        found
    }

    pub async fn appointments_for_doctor(&self, doctor_id: Uuid) -> Vec<Appointment> {
        let appointments = self.appointments.read().await;
        let mut found: Vec<Appointment> = appointments
            .values()
            .filter(|a| a.doctor_id == Some(doctor_id))
            .cloned()
            .collect();
        found.sort_by_key(|a| a.interval.start);
        found
    }

    // ------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------

    async fn resolve_candidates(
        &self,
        target: &DoctorSelector,
    ) -> Result<Vec<Doctor>, SchedulingError> {
        match target {
            DoctorSelector::Specific(doctor_id) => {
                Ok(vec![self.calendar.doctor(*doctor_id).await?])
            }
            DoctorSelector::AnySpecialty(specialty) => {
                let doctors = self.calendar.doctors_with_specialty(specialty).await;
                if doctors.is_empty() {
                    return Err(SchedulingError::UnknownSpecialty(specialty.clone()));
                }
                Ok(doctors)
            }
        }
    }

    fn effective_buffer(&self, doctor: &Doctor, override_minutes: Option<i64>) -> Duration {
        let minutes = override_minutes.unwrap_or(if doctor.buffer_minutes > 0 {
            doctor.buffer_minutes
        } else {
            self.config.default_buffer_minutes
        });
        Duration::minutes(minutes.max(0))
    }

    async fn has_same_day_booking(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        window: &TimeInterval,
    ) -> bool {
        let appointments = self.appointments.read().await;
        holds_same_day(&appointments, patient_id, doctor_id, window.day())
    }

    async fn waitlist_request(
        &self,
        appointment_id: Uuid,
        request: BookingRequest,
    ) -> BookingOutcome {
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.config.waitlist_ttl_hours);
        let doctor_id = match &request.target {
            DoctorSelector::Specific(id) => Some(*id),
            DoctorSelector::AnySpecialty(_) => None,
        };
        let appointment = Appointment {
            id: appointment_id,
            patient_id: request.patient_id,
            doctor_id,
            interval: request.window,
            status: AppointmentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let entry = WaitlistEntry {
            id: Uuid::new_v4(),
            appointment_id,
            patient_id: request.patient_id,
            target: request.target,
            window: request.window,
            duration_minutes: request.duration_minutes,
            buffer_minutes: request
                .buffer_minutes
                .unwrap_or(self.config.default_buffer_minutes),
            enqueued_at: now,
            expires_at,
        };

        self.appointments
            .write()
            .await
            .insert(appointment_id, appointment.clone());
        let position = self.waitlist.enqueue(entry.clone()).await;
        info!(
            "Waitlisted request for patient {} at position {} (expires {})",
            request.patient_id, position, expires_at
        );
        self.persist_appointment(&appointment).await;
        self.persist_entry(&entry).await;
        self.emit(SchedulingEvent::Waitlisted {
            appointment,
            entry_id: entry.id,
            position,
            expires_at,
        })
        .await;
        BookingOutcome::Waitlisted {
            appointment_id,
            entry_id: entry.id,
            position,
            expires_at,
        }
    }

    /// Convert a promoted waitlist entry into its Confirmed appointment.
    async fn confirm_promotion(
        &self,
        won: waitlist_cell::PromotedEntry,
        now: DateTime<Utc>,
    ) -> Result<Appointment, SchedulingError> {
        let promoted = {
            let mut appointments = self.appointments.write().await;
            let appointment = appointments
                .get_mut(&won.entry.appointment_id)
                .ok_or(SchedulingError::NotFound(won.entry.appointment_id))?;
            self.lifecycle
                .validate_status_transition(&appointment.status, &AppointmentStatus::Confirmed)?;
            appointment.status = AppointmentStatus::Confirmed;
            appointment.doctor_id = Some(won.doctor_id);
            appointment.interval = won.reserved;
            appointment.updated_at = now;
            appointment.clone()
        };
        self.delete_entry(won.entry.id).await;
        self.persist_appointment(&promoted).await;
        self.emit(SchedulingEvent::Promoted(promoted.clone())).await;
        Ok(promoted)
    }

    async fn persist_appointment(&self, appointment: &Appointment) {
        if let Err(e) = self.persistence.save_appointment(appointment).await {
            warn!("Persistence failed for appointment {}: {:#}", appointment.id, e);
        }
    }

    async fn persist_entry(&self, entry: &WaitlistEntry) {
        if let Err(e) = self.persistence.save_waitlist_entry(entry).await {
            warn!("Persistence failed for waitlist entry {}: {:#}", entry.id, e);
        }
    }

    async fn delete_entry(&self, entry_id: Uuid) {
        if let Err(e) = self.persistence.delete_waitlist_entry(entry_id).await {
            warn!("Persistence failed deleting waitlist entry {}: {:#}", entry_id, e);
        }
    }

    async fn emit(&self, event: SchedulingEvent) {
        if let Err(e) = self.notifier.notify(event).await {
            warn!("Notification delivery failed: {:#}", e);
        }
    }
}

fn holds_same_day(
    appointments: &HashMap<Uuid, Appointment>,
    patient_id: Uuid,
    doctor_id: Uuid,
    day: NaiveDate,
) -> bool {
    appointments.values().any(|a| {
        a.patient_id == patient_id
            && a.doctor_id == Some(doctor_id)
            && a.is_active()
            && a.interval.day() == day
    })
}
