//! Fleet discovery and the rolling patch run
//!
//! Handles:
//! - Joining inventory entries with the hypervisor's VM listing
//! - Powering on stopped eligible VMs before any pipeline starts
//! - Sequential per-VM pipelines in inventory order
//! - Powering the started VMs back off, whatever their outcome

use tracing::{error, info, info_span, warn, Instrument};

use crate::clients::{Hypervisor, RemoteExecutor};
use crate::error::FleetError;
use crate::inventory::Inventory;
use crate::model::{HypervisorVm, PowerState, VmDescriptor, VmId};
use crate::pipeline::{PatchPipeline, PipelineSettings};
use crate::stats::FleetStats;

/// Build the fleet from inventory order; every inventory VM must exist on the hypervisor
pub fn build_fleet(
    inventory: &Inventory,
    vms: &[HypervisorVm],
    domain: &str,
) -> Result<Vec<VmDescriptor>, FleetError> {
    inventory
        .virtual_machines
        .iter()
        .map(|(name, policy)| {
            let vm = vms
                .iter()
                .find(|vm| &vm.name == name)
                .ok_or_else(|| FleetError::UnknownVm(name.clone()))?;
            Ok(VmDescriptor {
                id: vm.id,
                name: name.clone(),
                hostname: format!("{}.{}", name, domain),
                power: vm.power,
                auto_reboot: policy.reboot,
                eligible: policy.patch,
            })
        })
        .collect()
}

pub struct FleetRunner<'a> {
    hypervisor: &'a dyn Hypervisor,
    remote: &'a dyn RemoteExecutor,
    settings: PipelineSettings,
}

impl<'a> FleetRunner<'a> {
    pub fn new(
        hypervisor: &'a dyn Hypervisor,
        remote: &'a dyn RemoteExecutor,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            hypervisor,
            remote,
            settings,
        }
    }

    pub async fn discover(
        &self,
        inventory: &Inventory,
        domain: &str,
    ) -> Result<Vec<VmDescriptor>, FleetError> {
        let vms = self.hypervisor.list_vms().await?;
        let fleet = build_fleet(inventory, &vms, domain)?;
        info!(
            "Discovered {} VMs ({} eligible for automated patching)",
            fleet.len(),
            fleet.iter().filter(|vm| vm.eligible).count()
        );
        Ok(fleet)
    }

    /// Patch every VM of the fleet and return the aggregated outcomes
    pub async fn run(&self, fleet: &[VmDescriptor]) -> FleetStats {
        let started = self.power_on_stopped(fleet).await;

        let pipeline = PatchPipeline::new(self.hypervisor, self.remote, self.settings.clone());
        let mut stats = FleetStats::new();
        for vm in fleet {
            let span = info_span!("vm", host = %vm.hostname, id = %vm.id);
            let outcome = pipeline.run(vm).instrument(span).await;
            if vm.eligible {
                if outcome.is_patched() {
                    info!("Patching of {} complete.", vm.hostname);
                } else {
                    error!("Patching of {} failed!", vm.hostname);
                }
            }
            stats.record(&vm.hostname, &outcome);
        }

        self.restore_power(&started).await;
        stats
    }

    /// Start eligible VMs that are stopped; returns the ones actually started
    async fn power_on_stopped(&self, fleet: &[VmDescriptor]) -> Vec<VmId> {
        let mut started = Vec::new();
        for vm in fleet.iter().filter(|vm| vm.eligible && vm.power == PowerState::Stopped) {
            info!("Starting VM {} ({})", vm.id, vm.name);
            match self.hypervisor.power_on(vm.id).await {
                Ok(()) => started.push(vm.id),
                Err(e) => error!("Failed to start VM {} ({}): {}", vm.id, vm.name, e),
            }
        }
        started
    }

    async fn restore_power(&self, started: &[VmId]) {
        for id in started {
            info!("Stopping VM {}", id);
            if let Err(e) = self.hypervisor.power_off(*id).await {
                warn!("Failed to stop VM {}: {}", id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::PatchPolicy;

    fn policy(patch: bool, reboot: bool) -> PatchPolicy {
        PatchPolicy { patch, reboot }
    }

    fn vm(id: u32, name: &str, power: PowerState) -> HypervisorVm {
        HypervisorVm { id: VmId(id), name: name.to_string(), power }
    }

    #[test]
    fn test_build_fleet_follows_inventory_order() {
        let mut inventory = Inventory::default();
        inventory.virtual_machines.insert("web01".into(), policy(true, true));
        inventory.virtual_machines.insert("db01".into(), policy(false, false));
        let vms = vec![vm(101, "db01", PowerState::Running), vm(100, "web01", PowerState::Stopped)];

        let fleet = build_fleet(&inventory, &vms, "example.com").unwrap();
        assert_eq!(fleet.len(), 2);
        assert_eq!(fleet[0].hostname, "web01.example.com");
        assert_eq!(fleet[0].id, VmId(100));
        assert_eq!(fleet[0].power, PowerState::Stopped);
        assert!(fleet[0].auto_reboot && fleet[0].eligible);
        assert_eq!(fleet[1].hostname, "db01.example.com");
        assert!(!fleet[1].eligible);
    }

    #[test]
    fn test_build_fleet_unknown_vm() {
        let mut inventory = Inventory::default();
        inventory.virtual_machines.insert("ghost".into(), policy(true, false));
        let vms = [vm(100, "web01", PowerState::Running)];
        let result = build_fleet(&inventory, &vms, "example.com");
        assert!(matches!(result, Err(FleetError::UnknownVm(name)) if name == "ghost"));
    }
}
