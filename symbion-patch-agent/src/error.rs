//! Error types shared by the patch agent
//!
//! Per-VM failures never leave the pipeline as errors: they are folded into a
//! `PipelineOutcome`. The types here cover collaborator transport failures and
//! the startup errors that abort a run before any VM is touched.

/// Configuration errors (environment variables)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: String, value: String },
}

/// Inventory file errors
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Failed to read inventory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid inventory YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Hypervisor control plane errors
#[derive(Debug, thiserror::Error)]
pub enum HypervisorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("No node available on hypervisor")]
    NoNode,
    #[error("{0}")]
    Other(String),
}

/// Remote execution errors
///
/// `Connect` means no session was established, so no exit status exists.
/// `Channel` means the session came up but the command could not be run.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Connection to {host} failed: {reason}")]
    Connect { host: String, reason: String },
    #[error("Command channel on {host} failed: {reason}")]
    Channel { host: String, reason: String },
}

/// Notification delivery errors
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Notification rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Snapshot rotation failures
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot API call failed: {0}")]
    Api(#[from] HypervisorError),
    #[error("Snapshot {0} was not found after creation")]
    NotFound(String),
}

/// Patch execution failures
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("Package index refresh failed with exit status {0}")]
    IndexRefresh(i32),
    #[error("Update command produced no output")]
    NoOutput { stderr: String },
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Fleet discovery errors
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("VM {0} from inventory is unknown to the hypervisor")]
    UnknownVm(String),
    #[error(transparent)]
    Hypervisor(#[from] HypervisorError),
}
