//! Distro detection by package manager lookup
//!
//! Candidates are probed in a fixed priority: dnf (Red Hat family) first,
//! then apt-get (Debian family). At most two round trips per host.

use tracing::{error, info, warn};

use crate::clients::RemoteExecutor;
use crate::model::{Distro, DistroInfo, Family};

/// Package manager invocations run with elevated privileges
pub const SUDO_PREFIX: &str = "sudo";

struct Candidate {
    family: Family,
    binary: &'static str,
    update_subcommand: &'static str,
}

const CANDIDATES: [Candidate; 2] = [
    Candidate {
        family: Family::Redhat,
        binary: "dnf",
        update_subcommand: "update -y",
    },
    Candidate {
        family: Family::Debian,
        binary: "apt-get",
        update_subcommand: "upgrade -y",
    },
];

pub struct DistroDetector<'a> {
    remote: &'a dyn RemoteExecutor,
}

impl<'a> DistroDetector<'a> {
    pub fn new(remote: &'a dyn RemoteExecutor) -> Self {
        Self { remote }
    }

    pub async fn detect(&self, host: &str) -> Distro {
        for candidate in &CANDIDATES {
            let command = format!("which {}", candidate.binary);
            match self.remote.run(host, &command).await {
                Ok(output) => {
                    if let Some(path) = resolve_binary_path(&output.stdout, candidate.binary) {
                        info!(
                            "{} based distro detected on {}. Setting package manager to {}",
                            candidate.family, host, path
                        );
                        return Distro::Supported(DistroInfo {
                            family: candidate.family,
                            package_manager: format!("{} {}", SUDO_PREFIX, path),
                            update_subcommand: candidate.update_subcommand.to_string(),
                        });
                    }
                }
                Err(e) => warn!("Probe for {} on {} failed: {}", candidate.binary, host, e),
            }
        }

        error!("Unsupported distro detected on {}! Could not set package manager!", host);
        Distro::Unsupported
    }
}

/// First stdout line, if it is an absolute path to `binary`
fn resolve_binary_path<'o>(stdout: &'o str, binary: &str) -> Option<&'o str> {
    let first = stdout.lines().next()?.trim();
    (first.starts_with('/') && first.ends_with(binary)).then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_binary_path() {
        assert_eq!(resolve_binary_path("/usr/bin/dnf\n", "dnf"), Some("/usr/bin/dnf"));
        assert_eq!(resolve_binary_path("/usr/bin/apt-get", "apt-get"), Some("/usr/bin/apt-get"));
        assert_eq!(resolve_binary_path("", "dnf"), None);
        assert_eq!(resolve_binary_path("which: no dnf in (/usr/bin)", "dnf"), None);
        assert_eq!(resolve_binary_path("/usr/bin/dnf-3\n", "dnf"), None);
    }
}
