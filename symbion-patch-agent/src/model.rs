//! Domain model for the patch pipeline
//!
//! Handles:
//! - VM identity and power state as reported by the hypervisor
//! - The fleet descriptor built from inventory + hypervisor state
//! - Distro classification and package counts
//! - The tagged per-VM pipeline outcome

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hypervisor-side VM identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VmId(pub u32);

impl fmt::Display for VmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Power state as reported at discovery time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    Running,
    Stopped,
}

impl PowerState {
    /// Proxmox reports a handful of transient states; only `stopped` needs a power-on
    pub fn from_status(status: &str) -> Self {
        match status {
            "stopped" => PowerState::Stopped,
            _ => PowerState::Running,
        }
    }
}

/// VM entry returned by the hypervisor listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HypervisorVm {
    pub id: VmId,
    pub name: String,
    pub power: PowerState,
}

/// One member of the fleet, read-only during the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmDescriptor {
    pub id: VmId,
    pub name: String,
    pub hostname: String,
    pub power: PowerState,
    /// Reboot automatically when the host reports it is required
    pub auto_reboot: bool,
    /// Tagged for automated patching
    pub eligible: bool,
}

/// Package-management family of a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Redhat,
    Debian,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Redhat => write!(f, "redhat"),
            Family::Debian => write!(f, "debian"),
        }
    }
}

/// Resolved package manager for a supported host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistroInfo {
    pub family: Family,
    /// Full invocation prefix, e.g. `sudo /usr/bin/dnf`
    pub package_manager: String,
    /// Family update subcommand, e.g. `update -y`
    pub update_subcommand: String,
}

impl DistroInfo {
    pub fn update_command(&self) -> String {
        format!("{} {}", self.package_manager, self.update_subcommand)
    }
}

/// Result of distro detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Distro {
    Supported(DistroInfo),
    Unsupported,
}

/// Number of packages an update touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageCount {
    Counted(u32),
    /// Output did not carry a usable count
    Unknown,
}

impl fmt::Display for PackageCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageCount::Counted(n) => write!(f, "{} packages updated", n),
            PackageCount::Unknown => write!(f, "unknown number of packages updated"),
        }
    }
}

/// What the reboot evaluator decided for a patched host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebootOutcome {
    Rebooted,
    NeedsManualReboot,
    NoAction,
}

/// Terminal outcome of one VM's pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum PipelineOutcome {
    Patched {
        packages: PackageCount,
        reboot: RebootOutcome,
    },
    FailedSsh,
    FailedSnapshot,
    FailedPatch,
    UnsupportedDistro,
    SkippedManual,
}

impl PipelineOutcome {
    pub fn is_patched(&self) -> bool {
        matches!(self, PipelineOutcome::Patched { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_state_from_status() {
        assert_eq!(PowerState::from_status("stopped"), PowerState::Stopped);
        assert_eq!(PowerState::from_status("running"), PowerState::Running);
        assert_eq!(PowerState::from_status("paused"), PowerState::Running);
    }

    #[test]
    fn test_update_command() {
        let info = DistroInfo {
            family: Family::Debian,
            package_manager: "sudo /usr/bin/apt-get".to_string(),
            update_subcommand: "upgrade -y".to_string(),
        };
        assert_eq!(info.update_command(), "sudo /usr/bin/apt-get upgrade -y");
    }

    #[test]
    fn test_package_count_display() {
        assert_eq!(PackageCount::Counted(3).to_string(), "3 packages updated");
        assert_eq!(PackageCount::Unknown.to_string(), "unknown number of packages updated");
    }
}
