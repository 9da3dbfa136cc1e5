//! TTL Cleanup Task
//!
//! Background task that periodically sweeps expired records out of the
//! in-memory driver.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::MemoryDriver;

/// Spawns a background task that periodically removes expired records.
///
/// The task runs in an infinite loop, sleeping for the interval between
/// sweeps. The driver takes its own write lock for each sweep.
///
/// # Arguments
/// * `driver` - Shared in-memory driver, also held by the facade
/// * `cleanup_interval_secs` - Seconds between sweeps; values below 1 are raised to 1
///
/// # Returns
/// A JoinHandle that can be aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let driver = Arc::new(MemoryDriver::new());
/// let cleanup_handle = spawn_cleanup_task(driver.clone(), 1);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(driver: Arc<MemoryDriver>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            // Sleep for the configured interval
            tokio::time::sleep(interval).await;

            // Sweep expired records under the driver's write lock
            let removed = driver.cleanup_expired();

            // Log cleanup results

            if removed > 0 {
                info!("TTL cleanup: removed {} expired records", removed);
            } else {
                debug!("TTL cleanup: no expired records found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Payload, StorageDriver};

    fn plain(value: &str) -> Payload {
        Payload::Plain(value.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_records() {
        let driver = Arc::new(MemoryDriver::new());
        driver.store("expire_soon", plain("value"), 1);

        let handle = spawn_cleanup_task(driver.clone(), 1);

        tokio::time::sleep(Duration::from_millis(2500)).await;

        // Swept without any fetch touching the record
        assert!(driver.keys().is_empty(), "Expired record should have been swept");
        assert_eq!(driver.stats().expirations, 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_live_records() {
        let driver = Arc::new(MemoryDriver::new());
        driver.store("long_lived", plain("value"), 3600);
        driver.store("forever", plain("value"), 0);

        let handle = spawn_cleanup_task(driver.clone(), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(driver.len(), 2);
        assert_eq!(driver.fetch("long_lived"), Some(plain("value")));

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let handle = spawn_cleanup_task(Arc::new(MemoryDriver::new()), 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
