use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::{RecordResult, RecordStore};

/// Default pause between `cleanup_expired_messages` calls
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Periodically asks the server to expire messages past their `expires_at`
pub struct ExpirySweeper {
    records: Arc<dyn RecordStore>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self {
            records,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(records: Arc<dyn RecordStore>, interval: Duration) -> Self {
        Self { records, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sweep now, then on every interval. Failures are logged and the loop continues.
    pub async fn start(self) {
        // first tick completes immediately
        let mut ticker = interval(self.interval);

        info!("Starting expiry sweeper with interval: {:?}", self.interval);

        loop {
            ticker.tick().await;

            match self.run_once().await {
                Ok(expired) if expired > 0 => info!("Expired {} messages", expired),
                Ok(_) => debug!("No messages to expire"),
                Err(e) => warn!("Error during expiry sweep: {}", e),
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.start())
    }

    /// One sweep
    pub async fn run_once(&self) -> RecordResult<u64> {
        self.records.cleanup_expired_messages().await
    }
}
