//! Symbion Patch Agent - rolling OS patching for hypervisor-hosted VMs
//!
//! For each VM of the inventory the agent:
//! - Powers it on if it is stopped (and back off at the end of the run)
//! - Waits for SSH, rotates its rollback snapshot
//! - Detects the package manager family and applies updates
//! - Reboots it when required and allowed
//!
//! Outcomes are aggregated into `FleetStats` and rendered into a report.

pub mod clients;
pub mod config;
pub mod error;
pub mod fleet;
pub mod inventory;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod stats;

pub use clients::{CommandOutput, Hypervisor, Notifier, RemoteExecutor};
pub use config::Settings;
pub use fleet::FleetRunner;
pub use inventory::Inventory;
pub use model::{PipelineOutcome, VmDescriptor};
pub use pipeline::{PatchPipeline, PipelineSettings};
pub use stats::FleetStats;
