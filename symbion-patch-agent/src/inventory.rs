//! Inventory file: which VMs are patched automatically and which may reboot
//!
//! ```yaml
//! virtual_machines:
//!   web01:
//!     patch: true
//!     reboot: true
//!   db01:
//!     patch: false
//! ```
//!
//! Entry order is preserved; it is the order VMs are processed in.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use crate::error::InventoryError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub virtual_machines: IndexMap<String, PatchPolicy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchPolicy {
    pub patch: bool,
    #[serde(default)]
    pub reboot: bool,
}

impl Inventory {
    pub async fn load(path: &Path) -> Result<Self, InventoryError> {
        let text = fs::read_to_string(path).await.map_err(|source| InventoryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, InventoryError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_preserves_order_and_defaults() {
        let yaml = "virtual_machines:\n  zeta:\n    patch: true\n    reboot: true\n  alpha:\n    patch: false\n";
        let inventory = Inventory::parse(yaml).unwrap();
        let names: Vec<&str> = inventory.virtual_machines.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(inventory.virtual_machines["zeta"], PatchPolicy { patch: true, reboot: true });
        assert_eq!(
            inventory.virtual_machines["alpha"],
            PatchPolicy { patch: false, reboot: false }
        );
    }

    #[test]
    fn test_missing_patch_flag_is_error() {
        let yaml = "virtual_machines:\n  web01:\n    reboot: true\n";
        assert!(Inventory::parse(yaml).is_err());
    }

    #[test]
    fn test_empty_inventory() {
        assert!(Inventory::parse("").unwrap().virtual_machines.is_empty());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "virtual_machines:\n  web01:\n    patch: true").unwrap();
        let inventory = Inventory::load(file.path()).await.unwrap();
        assert!(inventory.virtual_machines["web01"].patch);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let result = Inventory::load(Path::new("/nonexistent/inventory.yml")).await;
        assert!(matches!(result, Err(InventoryError::Io { .. })));
    }
}
