//! Per-VM patch pipeline
//!
//! Stages run in strict order, each one a precondition for the next:
//! `AwaitingSsh → RotatingSnapshot → DetectingDistro → Patching → EvaluatingReboot`.
//! The first failing stage decides the VM's terminal outcome; reboot
//! evaluation never fails the pipeline.

pub mod distro;
pub mod patch;
pub mod reboot;
pub mod snapshot;
pub mod ssh_wait;

use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::clients::{Hypervisor, RemoteExecutor};
use crate::model::{Distro, PipelineOutcome, VmDescriptor};

pub use distro::DistroDetector;
pub use patch::PatchExecutor;
pub use reboot::RebootEvaluator;
pub use snapshot::SnapshotRotator;
pub use ssh_wait::SshProber;

/// Pause after a hypervisor mutation before the next API call
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub ssh_timeout: Duration,
    pub retry_interval: Duration,
    pub settle_delay: Duration,
    /// Log stdout of the update command
    pub show_patch_output: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            ssh_timeout: Duration::from_secs(300),
            retry_interval: Duration::from_secs(10),
            settle_delay: DEFAULT_SETTLE_DELAY,
            show_patch_output: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingSsh,
    RotatingSnapshot,
    DetectingDistro,
    Patching,
    EvaluatingReboot,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::AwaitingSsh => "awaiting-ssh",
            Stage::RotatingSnapshot => "rotating-snapshot",
            Stage::DetectingDistro => "detecting-distro",
            Stage::Patching => "patching",
            Stage::EvaluatingReboot => "evaluating-reboot",
        };
        write!(f, "{}", name)
    }
}

pub struct PatchPipeline<'a> {
    hypervisor: &'a dyn Hypervisor,
    remote: &'a dyn RemoteExecutor,
    settings: PipelineSettings,
}

impl<'a> PatchPipeline<'a> {
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

    /// Drive one VM through every stage and return its terminal outcome
    pub async fn run(&self, vm: &VmDescriptor) -> PipelineOutcome {
        let host = vm.hostname.as_str();

        if !vm.eligible {
            info!("{} is configured for manual patching. Skipping.", host);
            return PipelineOutcome::SkippedManual;
        }

        enter(Stage::AwaitingSsh, host);
        let prober = SshProber::new(
            self.remote,
            self.settings.ssh_timeout,
            self.settings.retry_interval,
        );
        if !prober.wait_until_available(host).await {
            error!(
                "SSH not available on {} after {} seconds! Skipping patch.",
                host,
                self.settings.ssh_timeout.as_secs()
            );
            return PipelineOutcome::FailedSsh;
        }
        info!("SSH is available on {}. Looking for snapshot...", host);

        enter(Stage::RotatingSnapshot, host);
        let rotator = SnapshotRotator::new(self.hypervisor, self.settings.settle_delay);
        match rotator.rotate(vm.id, host).await {
            Ok(name) => info!("Snapshot {} successfully created for {}.", name, host),
            Err(e) => {
                error!("Snapshot creation failed for {}: {}. Skipping patch!", host, e);
                return PipelineOutcome::FailedSnapshot;
            }
        }

        enter(Stage::DetectingDistro, host);
        let distro = match DistroDetector::new(self.remote).detect(host).await {
            Distro::Supported(info) => info,
            Distro::Unsupported => {
                error!("Skipping patch for {}", host);
                return PipelineOutcome::UnsupportedDistro;
            }
        };

        enter(Stage::Patching, host);
        let executor = PatchExecutor::new(self.remote, self.settings.show_patch_output);
        let packages = match executor.patch(host, &distro).await {
            Ok(packages) => packages,
            Err(e) => {
                error!("Patching {} failed: {}", host, e);
                return PipelineOutcome::FailedPatch;
            }
        };

        enter(Stage::EvaluatingReboot, host);
        let reboot = RebootEvaluator::new(self.hypervisor, self.remote)
            .evaluate(vm, distro.family)
            .await;

        PipelineOutcome::Patched { packages, reboot }
    }
}

fn enter(stage: Stage, host: &str) {
    debug!("{}: entering stage {}", host, stage);
}
