use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use scheduler_models::Appointment;
use waitlist_cell::WaitlistEntry;

use crate::models::SchedulingEvent;

/// Durable storage collaborator. The engine issues writes after each state
/// transition and assumes crash-consistency is handled on the other side.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn save_appointment(&self, appointment: &Appointment) -> anyhow::Result<()>;
    async fn save_waitlist_entry(&self, entry: &WaitlistEntry) -> anyhow::Result<()>;
    async fn delete_waitlist_entry(&self, entry_id: Uuid) -> anyhow::Result<()>;
}

/// Notification collaborator. Fire-and-forget: a delivery failure never
/// rolls back a scheduling decision.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: SchedulingEvent) -> anyhow::Result<()>;
}

/// Default persistence sink for embedders that wire storage elsewhere.
pub struct NoopPersistence;

#[async_trait]
impl PersistenceSink for NoopPersistence {
    async fn save_appointment(&self, appointment: &Appointment) -> anyhow::Result<()> {
        debug!("noop persistence: appointment {} ({})", appointment.id, appointment.status);
        Ok(())
    }

    async fn save_waitlist_entry(&self, entry: &WaitlistEntry) -> anyhow::Result<()> {
        debug!("noop persistence: waitlist entry {}", entry.id);
        Ok(())
    }

    async fn delete_waitlist_entry(&self, entry_id: Uuid) -> anyhow::Result<()> {
        debug!("noop persistence: delete waitlist entry {}", entry_id);
        Ok(())
    }
}

/// Default notification sink that only logs.
pub struct NoopNotifier;

#[async_trait]
impl NotificationSink for NoopNotifier {
    async fn notify(&self, event: SchedulingEvent) -> anyhow::Result<()> {
        debug!("noop notifier: {:?}", event);
        Ok(())
    }
}
