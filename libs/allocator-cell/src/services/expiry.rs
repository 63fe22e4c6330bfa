use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::services::allocator::AllocatorService;

/// Periodic TTL sweep over the waitlist. Runs independently of booking
/// traffic; each tick drains whatever has expired by then.
pub struct ExpirySweeper {
    allocator: Arc<AllocatorService>,
    period: Duration,
}

impl ExpirySweeper {
    pub fn new(allocator: Arc<AllocatorService>, period: Duration) -> Self {
        Self { allocator, period }
    }

    /// Run one sweep immediately; returns how many entries expired.
    pub async fn run_once(&self) -> usize {
        let expired = self.allocator.expire_sweep(Utc::now()).await;
        if !expired.is_empty() {
            info!("Expiry sweep removed {} waitlist entries", expired.len());
        }
        expired.len()
    }

    /// Spawn the background sweep loop.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.period);
            loop {
                ticker.tick().await;
                debug!("Running waitlist expiry sweep");
                self.run_once().await;
            }
        })
    }
}
