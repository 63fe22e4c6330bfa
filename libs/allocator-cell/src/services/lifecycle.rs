use tracing::{debug, warn};

use scheduler_models::{AppointmentStatus, SchedulingError};

/// Guards the appointment status state machine.
pub struct LifecycleService;

impl Default for LifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed.
    pub fn validate_status_transition(
        &self,
        current: &AppointmentStatus,
        target: &AppointmentStatus,
    ) -> Result<(), SchedulingError> {
        if current.is_terminal() {
            warn!("Transition attempted out of terminal status {}", current);
            return Err(SchedulingError::AlreadyTerminal(*current));
        }
        if !current.can_transition_to(target) {
            warn!("Invalid status transition attempted: {} -> {}", current, target);
            return Err(SchedulingError::InvalidStatusTransition {
                from: *current,
                to: *target,
            });
        }
        debug!("Status transition validated: {} -> {}", current, target);
        Ok(())
    }

    /// All valid next statuses for a given current status.
    pub fn valid_transitions(&self, current: &AppointmentStatus) -> Vec<AppointmentStatus> {
        use AppointmentStatus::*;
        match current {
            Pending => vec![Confirmed, Cancelled],
            Confirmed => vec![Cancelled, Completed],
            Cancelled | Completed => vec![],
        }
    }
}
