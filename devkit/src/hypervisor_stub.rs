/*!
Fake hypervisor for pipeline and fleet tests

Keeps VMs and snapshot listings in memory, records every call in order and
lets tests inject failures per operation.
*/

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use symbion_patch_agent::error::HypervisorError;
use symbion_patch_agent::model::{HypervisorVm, PowerState, VmId};
use symbion_patch_agent::Hypervisor;

/// Name the hypervisor appends for the live state of a VM
pub const CURRENT_MARKER: &str = "current";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HypervisorCall {
    ListVms,
    PowerOn(VmId),
    PowerOff(VmId),
    Reboot(VmId),
    ListSnapshots(VmId),
    CreateSnapshot(VmId, String),
    DeleteSnapshot(VmId, String),
}

/// Operations a test can make fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    ListVms,
    PowerOn,
    PowerOff,
    Reboot,
    ListSnapshots,
    CreateSnapshot,
    DeleteSnapshot,
}

#[derive(Default)]
struct State {
    vms: Vec<HypervisorVm>,
    snapshots: HashMap<VmId, Vec<String>>,
    calls: Vec<HypervisorCall>,
    failing: HashSet<FailPoint>,
    discard_created: bool,
}

#[derive(Clone, Default)]
pub struct FakeHypervisor {
    state: Arc<Mutex<State>>,
}

impl FakeHypervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vm(self, id: u32, name: &str, power: PowerState) -> Self {
        self.state.lock().unwrap().vms.push(HypervisorVm {
            id: VmId(id),
            name: name.to_string(),
            power,
        });
        self
    }

    /// Raw listing for a VM, exactly as `list_snapshots` will return it
    pub fn with_snapshots(self, id: u32, names: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .snapshots
            .insert(VmId(id), names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn failing(self, point: FailPoint) -> Self {
        self.state.lock().unwrap().failing.insert(point);
        self
    }

    /// Accept snapshot creation but never list the new snapshot
    pub fn discarding_created_snapshots(self) -> Self {
        self.state.lock().unwrap().discard_created = true;
        self
    }

    pub fn calls(&self) -> Vec<HypervisorCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn snapshots(&self, id: u32) -> Vec<String> {
        self.state.lock().unwrap().snapshots.get(&VmId(id)).cloned().unwrap_or_default()
    }

    pub fn power_state(&self, id: u32) -> Option<PowerState> {
        self.state.lock().unwrap().vms.iter().find(|vm| vm.id == VmId(id)).map(|vm| vm.power)
    }

    pub fn count(&self, matcher: impl Fn(&HypervisorCall) -> bool) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| matcher(c)).count()
    }

    fn enter(&self, call: HypervisorCall, point: FailPoint) -> Result<(), HypervisorError> {
        let mut state = self.state.lock().unwrap();
        tracing::debug!("[FAKE] {:?}", call);
        state.calls.push(call);
        if state.failing.contains(&point) {
            return Err(HypervisorError::Other(format!("injected {:?} failure", point)));
        }
        Ok(())
    }

    fn set_power(&self, id: VmId, power: PowerState) {
        let mut state = self.state.lock().unwrap();
        if let Some(vm) = state.vms.iter_mut().find(|vm| vm.id == id) {
            vm.power = power;
        }
    }
}

#[async_trait]
impl Hypervisor for FakeHypervisor {
    async fn list_vms(&self) -> Result<Vec<HypervisorVm>, HypervisorError> {
        self.enter(HypervisorCall::ListVms, FailPoint::ListVms)?;
        Ok(self.state.lock().unwrap().vms.clone())
    }

    async fn power_on(&self, id: VmId) -> Result<(), HypervisorError> {
        self.enter(HypervisorCall::PowerOn(id), FailPoint::PowerOn)?;
        self.set_power(id, PowerState::Running);
        Ok(())
    }

    async fn power_off(&self, id: VmId) -> Result<(), HypervisorError> {
        self.enter(HypervisorCall::PowerOff(id), FailPoint::PowerOff)?;
        self.set_power(id, PowerState::Stopped);
        Ok(())
    }

    async fn reboot(&self, id: VmId) -> Result<(), HypervisorError> {
        self.enter(HypervisorCall::Reboot(id), FailPoint::Reboot)
    }

    async fn list_snapshots(&self, id: VmId) -> Result<Vec<String>, HypervisorError> {
        self.enter(HypervisorCall::ListSnapshots(id), FailPoint::ListSnapshots)?;
        Ok(self.state.lock().unwrap().snapshots.get(&id).cloned().unwrap_or_default())
    }

    async fn create_snapshot(&self, id: VmId, name: &str) -> Result<(), HypervisorError> {
        let call = HypervisorCall::CreateSnapshot(id, name.to_string());
        self.enter(call, FailPoint::CreateSnapshot)?;
        let mut state = self.state.lock().unwrap();
        if state.discard_created {
            return Ok(());
        }
        let listing = state.snapshots.entry(id).or_default();
        // new snapshots go before the live-state marker
        match listing.iter().position(|s| s == CURRENT_MARKER) {
            Some(marker) => listing.insert(marker, name.to_string()),
            None => listing.push(name.to_string()),
        }
        Ok(())
    }

    async fn delete_snapshot(&self, id: VmId, name: &str) -> Result<(), HypervisorError> {
        let call = HypervisorCall::DeleteSnapshot(id, name.to_string());
        self.enter(call, FailPoint::DeleteSnapshot)?;
        if let Some(listing) = self.state.lock().unwrap().snapshots.get_mut(&id) {
            listing.retain(|s| s != name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_created_snapshot_lands_before_marker() {
        let hypervisor = FakeHypervisor::new().with_snapshots(100, &["snapshot-1", CURRENT_MARKER]);
        hypervisor.create_snapshot(VmId(100), "snapshot-2").await.unwrap();
        assert_eq!(hypervisor.snapshots(100), vec!["snapshot-1", "snapshot-2", CURRENT_MARKER]);
    }

    #[tokio::test]
    async fn test_injected_failure_is_still_recorded() {
        let hypervisor = FakeHypervisor::new()
            .with_vm(100, "web01", PowerState::Stopped)
            .failing(FailPoint::PowerOn);
        assert!(hypervisor.power_on(VmId(100)).await.is_err());
        assert_eq!(hypervisor.calls(), vec![HypervisorCall::PowerOn(VmId(100))]);
        assert_eq!(hypervisor.power_state(100), Some(PowerState::Stopped));
    }
}
