//! Snapshot rotation: keep one rollback point per VM
//!
//! The hypervisor lists snapshots oldest first and always appends a
//! `current` marker for the live state, so the rotation snapshot of the
//! previous run is the second-to-last entry.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::clients::Hypervisor;
use crate::error::SnapshotError;
use crate::model::VmId;

static LAST_SNAPSHOT_NANOS: AtomicI64 = AtomicI64::new(0);

/// `snapshot-<nanoseconds>`, strictly increasing within the process
pub fn snapshot_name() -> String {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let previous = LAST_SNAPSHOT_NANOS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
        .unwrap_or(now);
    format!("snapshot-{}", now.max(previous + 1))
}

pub struct SnapshotRotator<'a> {
    hypervisor: &'a dyn Hypervisor,
    settle_delay: Duration,
}

impl<'a> SnapshotRotator<'a> {
    pub fn new(hypervisor: &'a dyn Hypervisor, settle_delay: Duration) -> Self {
        Self { hypervisor, settle_delay }
    }

    /// Delete the previous rotation snapshot, create a new one and verify it.
    /// Returns the new snapshot name.
    pub async fn rotate(&self, id: VmId, hostname: &str) -> Result<String, SnapshotError> {
        let existing = self.hypervisor.list_snapshots(id).await?;
        if existing.len() > 1 {
            let previous = &existing[existing.len() - 2];
            info!("Snapshot {} found for {}. Deleting snapshot...", previous, hostname);
            self.hypervisor.delete_snapshot(id, previous).await?;
            sleep(self.settle_delay).await;
        } else {
            info!("No snapshot found for {}. Continue as normal...", hostname);
        }

        let name = snapshot_name();
        info!("Creating new snapshot {} for {}", name, hostname);
        self.hypervisor.create_snapshot(id, &name).await?;
        sleep(self.settle_delay).await;

        let after = self.hypervisor.list_snapshots(id).await?;
        if after.iter().any(|s| s == &name) {
            Ok(name)
        } else {
            warn!("Snapshot {} was not found for {}", name, hostname);
            Err(SnapshotError::NotFound(name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_names_are_unique_and_increasing() {
        let names: Vec<String> = (0..100).map(|_| snapshot_name()).collect();
        let stamps: Vec<i64> = names
            .iter()
            .map(|n| n.strip_prefix("snapshot-").unwrap().parse().unwrap())
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }
}
