//! Patch execution and package-count scraping
//!
//! Success of the update command is judged by `output_indicates_success`
//! alone; its exit status is not consulted.

use tracing::{error, info, warn};

use crate::clients::{CommandOutput, RemoteExecutor};
use crate::error::PatchError;
use crate::model::{DistroInfo, Family, PackageCount};

/// Update command success: any stdout at all
pub fn output_indicates_success(output: &CommandOutput) -> bool {
    !output.stdout.is_empty()
}

pub fn count_updated_packages(output: &str, family: Family) -> PackageCount {
    match family {
        Family::Redhat => PackageCount::Counted(count_redhat(output)),
        Family::Debian => count_debian(output),
    }
}

/// Lines of the `Upgraded:` section, up to `Removed:` or `Complete!`
fn count_redhat(output: &str) -> u32 {
    let mut in_upgrade_section = false;
    let mut updated = 0;

    for line in output.lines() {
        let line = line.trim();
        if line.starts_with("Upgraded:") {
            in_upgrade_section = true;
        } else if line.is_empty() || !in_upgrade_section || line.starts_with("Installed:") {
            continue;
        } else if line.starts_with("Removed:") || line.starts_with("Complete!") {
            break;
        } else {
            updated += 1;
        }
    }

    updated
}

/// Leading token of the last `... upgraded, ...` summary line
fn count_debian(output: &str) -> PackageCount {
    let Some(summary) = output.lines().rev().find(|line| line.contains("upgraded")) else {
        return PackageCount::Unknown;
    };

    match summary.split_whitespace().next().map(str::parse::<u32>) {
        Some(Ok(count)) => PackageCount::Counted(count),
        _ => {
            warn!("Could not read package count from apt summary line {:?}", summary);
            PackageCount::Unknown
        }
    }
}

pub struct PatchExecutor<'a> {
    remote: &'a dyn RemoteExecutor,
    show_output: bool,
}

impl<'a> PatchExecutor<'a> {
    pub fn new(remote: &'a dyn RemoteExecutor, show_output: bool) -> Self {
        Self { remote, show_output }
    }

    pub async fn patch(&self, host: &str, distro: &DistroInfo) -> Result<PackageCount, PatchError> {
        info!("Starting patch for {}...", host);

        if distro.family == Family::Debian {
            let refresh = format!("{} update -y", distro.package_manager);
            let output = self.remote.run(host, &refresh).await?;
            if !output.succeeded() {
                error!("Error while updating the package database on {}! Skipping.", host);
                return Err(PatchError::IndexRefresh(output.exit_status));
            }
        }

        let output = self.remote.run(host, &distro.update_command()).await?;
        if !output_indicates_success(&output) {
            if !output.stderr.is_empty() {
                warn!("Errors from {}:\n{}", host, output.stderr);
            }
            return Err(PatchError::NoOutput { stderr: output.stderr });
        }

        if self.show_output {
            info!("Output from {}:\n{}", host, output.stdout);
        }
        let packages = count_updated_packages(&output.stdout, distro.family);
        info!("{} on {}", packages, host);
        Ok(packages)
    }
}
