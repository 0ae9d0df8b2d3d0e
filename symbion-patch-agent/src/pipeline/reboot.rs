//! Post-patch reboot evaluation
//!
//! - Debian family: `/var/run/reboot-required` exists (exit status 0)
//! - Red Hat family: `needs-restarting -r` exits with 1

use tracing::{error, info, warn};

use crate::clients::{Hypervisor, RemoteExecutor};
use crate::model::{Family, RebootOutcome, VmDescriptor};

/// Command and the exit status meaning "reboot required"
fn reboot_check(family: Family) -> (&'static str, i32) {
    match family {
        Family::Debian => ("sudo ls -lah /var/run/reboot-required", 0),
        Family::Redhat => ("sudo needs-restarting -r", 1),
    }
}

pub struct RebootEvaluator<'a> {
    hypervisor: &'a dyn Hypervisor,
    remote: &'a dyn RemoteExecutor,
}

impl<'a> RebootEvaluator<'a> {
    pub fn new(hypervisor: &'a dyn Hypervisor, remote: &'a dyn RemoteExecutor) -> Self {
        Self { hypervisor, remote }
    }

    pub async fn evaluate(&self, vm: &VmDescriptor, family: Family) -> RebootOutcome {
        info!("Checking if reboot for {} is necessary...", vm.hostname);

        if !self.reboot_required(&vm.hostname, family).await {
            info!("No reboot required on {}.", vm.hostname);
            return RebootOutcome::NoAction;
        }

        if !vm.auto_reboot {
            warn!("Reboot required on {} but automatic reboot is disabled", vm.hostname);
            return RebootOutcome::NeedsManualReboot;
        }

        warn!("Reboot required on {}. Rebooting now...", vm.hostname);
        match self.hypervisor.reboot(vm.id).await {
            Ok(()) => RebootOutcome::Rebooted,
            Err(e) => {
                error!("Failed to reboot {} (VM {}): {}", vm.hostname, vm.id, e);
                RebootOutcome::NeedsManualReboot
            }
        }
    }

    async fn reboot_required(&self, host: &str, family: Family) -> bool {
        let (command, required_status) = reboot_check(family);
        match self.remote.run(host, command).await {
            Ok(output) => output.exit_status == required_status,
            Err(e) => {
                warn!("Reboot check on {} failed: {}", host, e);
                false
            }
        }
    }
}
