/*!
Test harness for patch runs

Bundles the three fakes, fast pipeline settings and helpers to build the
fleet from inline inventory YAML.
*/

use std::time::Duration;

use symbion_patch_agent::model::VmDescriptor;
use symbion_patch_agent::{
    report, FleetRunner, FleetStats, Inventory, PatchPipeline, PipelineSettings,
};

use crate::hypervisor_stub::FakeHypervisor;
use crate::remote_stub::{FakeNotifier, FakeRemote};

pub const TEST_DOMAIN: &str = "example.com";

/// Install a test subscriber once; `RUST_LOG` controls verbosity
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "symbion_patch_agent=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

pub fn fqdn(name: &str) -> String {
    format!("{}.{}", name, TEST_DOMAIN)
}

pub struct TestHarness {
    pub hypervisor: FakeHypervisor,
    pub remote: FakeRemote,
    pub notifier: FakeNotifier,
    pub settings: PipelineSettings,
}

impl TestHarness {
    pub fn new(hypervisor: FakeHypervisor, remote: FakeRemote) -> Self {
        init_tracing();
        Self {
            hypervisor,
            remote,
            notifier: FakeNotifier::new(),
            settings: PipelineSettings {
                ssh_timeout: Duration::from_secs(60),
                retry_interval: Duration::from_secs(10),
                settle_delay: Duration::from_secs(5),
                show_patch_output: false,
            },
        }
    }

    pub fn with_notifier(mut self, notifier: FakeNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn runner(&self) -> FleetRunner<'_> {
        FleetRunner::new(&self.hypervisor, &self.remote, self.settings.clone())
    }

    pub fn pipeline(&self) -> PatchPipeline<'_> {
        PatchPipeline::new(&self.hypervisor, &self.remote, self.settings.clone())
    }

    pub async fn discover(&self, inventory_yaml: &str) -> anyhow::Result<Vec<VmDescriptor>> {
        let inventory = Inventory::parse(inventory_yaml)?;
        Ok(self.runner().discover(&inventory, TEST_DOMAIN).await?)
    }

    /// Discover, run, then compose and deliver the report like the binary does
    pub async fn run_cycle(&self, inventory_yaml: &str) -> anyhow::Result<(FleetStats, String)> {
        let fleet = self.discover(inventory_yaml).await?;
        let stats = self.runner().run(&fleet).await;
        let message = report::compose(&stats);
        report::deliver(&self.notifier, &message).await;
        Ok((stats, message))
    }
}
