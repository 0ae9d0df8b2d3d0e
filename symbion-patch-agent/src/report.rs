//! End-of-run report
//!
//! Headline, the always-present patched section, then one section per
//! non-empty bucket in a fixed order. Only the headline is followed by a
//! blank line.

use tracing::{error, info};

use crate::clients::Notifier;
use crate::error::NotifyError;
use crate::stats::FleetStats;

pub const HEADLINE_ERRORS: &str = "Patchmanagement completed with errors";
pub const HEADLINE_SUCCESS: &str = "Patchmanagement completed successfully";
pub const PATCHED_HEADER: &str = "The following VMs have been patched:";
pub const FAILED_PATCHES_HEADER: &str = "Failed to patch the following VMs:";
pub const SSH_FAILED_HEADER: &str = "Failed to connect to the following VMs:";
pub const FAILED_SNAPSHOTS_HEADER: &str = "Failed to create snapshots for the following VMs:";
pub const NEEDS_REBOOT_HEADER: &str = "The following VMs have to be rebooted manually:";
pub const MANUAL_HEADER: &str = "The following VMs are configured to be manually patched:";
pub const UNSUPPORTED_HEADER: &str = "The following VMs are unsupported and could not be patched:";

pub fn headline(stats: &FleetStats) -> &'static str {
    if stats.has_errors() {
        HEADLINE_ERRORS
    } else {
        HEADLINE_SUCCESS
    }
}

pub fn compose(stats: &FleetStats) -> String {
    let mut lines: Vec<String> = vec![format!("{}\n", headline(stats))];

    lines.push(PATCHED_HEADER.to_string());
    for (host, packages) in &stats.patched {
        lines.push(format!("{}: {}", host, packages));
    }

    let sections: [(&str, &[String]); 6] = [
        (FAILED_PATCHES_HEADER, stats.failed_patches.as_slice()),
        (SSH_FAILED_HEADER, stats.ssh_failed.as_slice()),
        (FAILED_SNAPSHOTS_HEADER, stats.failed_snapshots.as_slice()),
        (NEEDS_REBOOT_HEADER, stats.needs_reboot.as_slice()),
        (MANUAL_HEADER, stats.manual.as_slice()),
        (UNSUPPORTED_HEADER, stats.unsupported.as_slice()),
    ];
    for (header, members) in sections {
        if members.is_empty() {
            continue;
        }
        lines.push(header.to_string());
        lines.extend(members.iter().cloned());
    }

    lines.join("\n")
}

/// Send the report; delivery failures are logged and never retried
pub async fn deliver(notifier: &dyn Notifier, message: &str) -> bool {
    match notifier.send(message).await {
        Ok(()) => {
            info!("Patch report sent");
            true
        }
        Err(e) => {
            error!("Failed to send message: {}", e);
            false
        }
    }
}

/// Deliver through a freshly built notifier; a failed build is logged like a failed send
pub async fn deliver_via<N: Notifier>(notifier: Result<N, NotifyError>, message: &str) -> bool {
    match notifier {
        Ok(notifier) => deliver(&notifier, message).await,
        Err(e) => {
            error!("Failed to set up notifications, report not sent: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PackageCount;

    #[test]
    fn test_empty_run_is_successful_with_patched_section() {
        let report = compose(&FleetStats::new());
        assert_eq!(report, format!("{}\n\n{}", HEADLINE_SUCCESS, PATCHED_HEADER));
    }

    #[test]
    fn test_sections_in_fixed_order() {
        let stats = FleetStats {
            patched: vec![("web01.example.com".into(), PackageCount::Counted(3))],
            failed_patches: vec!["app01.example.com".into()],
            ssh_failed: vec!["app02.example.com".into()],
            failed_snapshots: vec!["app03.example.com".into()],
            needs_reboot: vec!["web01.example.com".into()],
            manual: vec!["db01.example.com".into()],
            unsupported: vec!["bsd01.example.com".into()],
        };
        let report = compose(&stats);
        assert!(report.starts_with(HEADLINE_ERRORS));
        assert!(report.contains("web01.example.com: 3 packages updated"));

        let positions: Vec<usize> = [
            PATCHED_HEADER,
            FAILED_PATCHES_HEADER,
            SSH_FAILED_HEADER,
            FAILED_SNAPSHOTS_HEADER,
            NEEDS_REBOOT_HEADER,
            MANUAL_HEADER,
            UNSUPPORTED_HEADER,
        ]
        .iter()
        .map(|header| report.find(header).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_empty_optional_sections_are_omitted() {
        let stats = FleetStats {
            manual: vec!["db01.example.com".into()],
            ..FleetStats::default()
        };
        let report = compose(&stats);
        assert!(report.starts_with(HEADLINE_SUCCESS));
        assert!(report.contains(MANUAL_HEADER));
        assert!(!report.contains(SSH_FAILED_HEADER));
        assert!(!report.contains(UNSUPPORTED_HEADER));
        assert!(report.ends_with("db01.example.com"));
    }

    #[tokio::test]
    async fn test_notifier_setup_failure_is_not_fatal() {
        let broken: Result<crate::clients::TelegramNotifier, NotifyError> =
            Err(NotifyError::Rejected {
                status: 401,
                body: "Unauthorized".to_string(),
            });
        assert!(!deliver_via(broken, "Patchmanagement completed successfully").await);
    }

    #[test]
    fn test_exact_layout() {
        let stats = FleetStats {
            patched: vec![("web01.example.com".into(), PackageCount::Counted(2))],
            ssh_failed: vec!["app02.example.com".into()],
            manual: vec!["db01.example.com".into()],
            ..FleetStats::default()
        };
        let expected = "\
Patchmanagement completed with errors

The following VMs have been patched:
web01.example.com: 2 packages updated
Failed to connect to the following VMs:
app02.example.com
The following VMs are configured to be manually patched:
db01.example.com";
        assert_eq!(compose(&stats), expected);
    }

    #[test]
    fn test_unknown_package_count_rendering() {
        let stats = FleetStats {
            patched: vec![("deb01.example.com".into(), PackageCount::Unknown)],
            ..FleetStats::default()
        };
        assert!(compose(&stats).contains("deb01.example.com: unknown number of packages updated"));
    }
}
