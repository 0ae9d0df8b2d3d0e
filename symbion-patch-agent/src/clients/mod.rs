//! Collaborator interfaces consumed by the patch pipeline
//!
//! - `Hypervisor`: VM enumeration, power operations, snapshot CRUD
//! - `RemoteExecutor`: command execution on a guest host
//! - `Notifier`: delivery of the end-of-run report
//!
//! Concrete implementations live in the submodules; tests use the fakes from
//! the devkit crate.

pub mod proxmox;
pub mod ssh;
pub mod telegram;

use async_trait::async_trait;

use crate::error::{HypervisorError, NotifyError, RemoteError};
use crate::model::{HypervisorVm, VmId};

pub use proxmox::ProxmoxClient;
pub use ssh::SshExecutor;
pub use telegram::TelegramNotifier;

/// Captured result of one remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_status == 0
    }
}

#[async_trait]
pub trait Hypervisor: Send + Sync {
    async fn list_vms(&self) -> Result<Vec<HypervisorVm>, HypervisorError>;
    async fn power_on(&self, id: VmId) -> Result<(), HypervisorError>;
    async fn power_off(&self, id: VmId) -> Result<(), HypervisorError>;
    async fn reboot(&self, id: VmId) -> Result<(), HypervisorError>;
    /// Snapshot names in hypervisor order; the last entry is the current-state marker
    async fn list_snapshots(&self, id: VmId) -> Result<Vec<String>, HypervisorError>;
    async fn create_snapshot(&self, id: VmId, name: &str) -> Result<(), HypervisorError>;
    async fn delete_snapshot(&self, id: VmId, name: &str) -> Result<(), HypervisorError>;
}

#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Open and immediately close a session on the host
    async fn probe(&self, host: &str) -> Result<(), RemoteError>;
    async fn run(&self, host: &str, command: &str) -> Result<CommandOutput, RemoteError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}
