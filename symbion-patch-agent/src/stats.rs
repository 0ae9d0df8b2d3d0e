//! Fleet-level outcome aggregation
//!
//! One value per run, threaded through the fleet runner. Buckets keep
//! insertion order (= processing order) and are never deduplicated.

use serde::Serialize;

use crate::model::{PackageCount, PipelineOutcome, RebootOutcome};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FleetStats {
    pub patched: Vec<(String, PackageCount)>,
    pub failed_patches: Vec<String>,
    pub ssh_failed: Vec<String>,
    pub failed_snapshots: Vec<String>,
    pub needs_reboot: Vec<String>,
    pub manual: Vec<String>,
    pub unsupported: Vec<String>,
}

impl FleetStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a VM's terminal outcome to its bucket(s)
    pub fn record(&mut self, hostname: &str, outcome: &PipelineOutcome) {
        let host = hostname.to_string();
        match outcome {
            PipelineOutcome::Patched { packages, reboot } => {
                self.patched.push((host.clone(), *packages));
                if *reboot == RebootOutcome::NeedsManualReboot {
                    self.needs_reboot.push(host);
                }
            }
            PipelineOutcome::FailedSsh => self.ssh_failed.push(host),
            PipelineOutcome::FailedSnapshot => self.failed_snapshots.push(host),
            PipelineOutcome::FailedPatch => self.failed_patches.push(host),
            PipelineOutcome::UnsupportedDistro => self.unsupported.push(host),
            PipelineOutcome::SkippedManual => self.manual.push(host),
        }
    }

    /// Any connectivity, snapshot or patch failure
    pub fn has_errors(&self) -> bool {
        !self.ssh_failed.is_empty()
            || !self.failed_snapshots.is_empty()
            || !self.failed_patches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_routes_outcomes() {
        let mut stats = FleetStats::new();
        let patched = PipelineOutcome::Patched {
            packages: PackageCount::Counted(4),
            reboot: RebootOutcome::NoAction,
        };
        stats.record("a", &patched);
        stats.record("b", &PipelineOutcome::FailedSsh);
        stats.record("c", &PipelineOutcome::SkippedManual);
        stats.record("d", &PipelineOutcome::UnsupportedDistro);
        stats.record("e", &PipelineOutcome::FailedSnapshot);
        stats.record("f", &PipelineOutcome::FailedPatch);

        assert_eq!(stats.patched, vec![("a".to_string(), PackageCount::Counted(4))]);
        assert_eq!(stats.ssh_failed, vec!["b"]);
        assert_eq!(stats.manual, vec!["c"]);
        assert_eq!(stats.unsupported, vec!["d"]);
        assert_eq!(stats.failed_snapshots, vec!["e"]);
        assert_eq!(stats.failed_patches, vec!["f"]);
        assert!(stats.needs_reboot.is_empty());
        assert!(stats.has_errors());
    }

    #[test]
    fn test_manual_reboot_is_also_patched() {
        let mut stats = FleetStats::new();
        stats.record(
            "db01",
            &PipelineOutcome::Patched {
                packages: PackageCount::Counted(1),
                reboot: RebootOutcome::NeedsManualReboot,
            },
        );
        assert_eq!(stats.patched.len(), 1);
        assert_eq!(stats.needs_reboot, vec!["db01"]);
        assert!(!stats.has_errors());
    }

    #[test]
    fn test_no_deduplication() {
        let mut stats = FleetStats::new();
        stats.record("web01", &PipelineOutcome::FailedSsh);
        stats.record("web01", &PipelineOutcome::FailedSsh);
        assert_eq!(stats.ssh_failed, vec!["web01", "web01"]);
    }

    #[test]
    fn test_unsupported_and_manual_are_not_errors() {
        let mut stats = FleetStats::new();
        stats.record("a", &PipelineOutcome::UnsupportedDistro);
        stats.record("b", &PipelineOutcome::SkippedManual);
        assert!(!stats.has_errors());
    }
}
