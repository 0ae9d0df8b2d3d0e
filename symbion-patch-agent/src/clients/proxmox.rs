//! Proxmox VE API client
//!
//! Handles:
//! - Ticket authentication (`/access/ticket`) with cookie + CSRF token
//! - Node resolution (configured node or first node of the cluster)
//! - QEMU VM listing and power operations
//! - Snapshot listing, creation and deletion

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::Hypervisor;
use crate::error::HypervisorError;
use crate::model::{HypervisorVm, PowerState, VmId};

const DEFAULT_API_PORT: u16 = 8006;

/// Connection settings for the Proxmox API
#[derive(Debug, Clone)]
pub struct ProxmoxConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub verify_ssl: bool,
    pub node: Option<String>,
    pub request_timeout: Duration,
}

/// Authenticated Proxmox client bound to one node
pub struct ProxmoxClient {
    http: reqwest::Client,
    base_url: String,
    node: String,
    ticket: String,
    csrf_token: String,
    request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct TicketData {
    ticket: String,
    #[serde(rename = "CSRFPreventionToken")]
    csrf_prevention_token: String,
}

#[derive(Debug, Deserialize)]
struct NodeEntry {
    node: String,
}

#[derive(Debug, Deserialize)]
struct QemuEntry {
    vmid: u32,
    #[serde(default)]
    name: Option<String>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct SnapshotEntry {
    name: String,
}

impl ProxmoxClient {
    /// Log in and resolve the node to operate on
    pub async fn connect(config: &ProxmoxConfig) -> Result<Self, HypervisorError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_ssl)
            .timeout(config.request_timeout)
            .build()?;
        let base_url = api_base_url(&config.host);

        info!("Authenticating to Proxmox API at {} as {}", base_url, config.user);
        let response = http
            .post(format!("{}/access/ticket", base_url))
            .form(&[("username", config.user.as_str()), ("password", config.password.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(HypervisorError::Auth(format!(
                "login rejected with status {}",
                response.status()
            )));
        }
        let ticket: ApiResponse<TicketData> = response.json().await?;

        let mut client = Self {
            http,
            base_url,
            node: String::new(),
            ticket: ticket.data.ticket,
            csrf_token: ticket.data.csrf_prevention_token,
            request_timeout: config.request_timeout,
        };

        client.node = match &config.node {
            Some(node) => node.clone(),
            None => {
                let nodes: Vec<NodeEntry> = client.get_data("/nodes").await?;
                nodes.into_iter().next().map(|n| n.node).ok_or(HypervisorError::NoNode)?
            }
        };
        info!("Using Proxmox node {}", client.node);

        Ok(client)
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    fn vm_path(&self, id: VmId, suffix: &str) -> String {
        format!("/nodes/{}/qemu/{}{}", self.node, id, suffix)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("Cookie", format!("PVEAuthCookie={}", self.ticket))
    }

    fn mutating(&self, builder: RequestBuilder) -> RequestBuilder {
        self.authed(builder)
            .header("CSRFPreventionToken", &self.csrf_token)
            .timeout(self.request_timeout)
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T, HypervisorError> {
        debug!("GET {}", path);
        let response = self
            .authed(self.http.get(format!("{}{}", self.base_url, path)))
            .send()
            .await?;
        let body: ApiResponse<T> = check_status(response).await?.json().await?;
        Ok(body.data)
    }

    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<(), HypervisorError> {
        debug!("POST {}", path);
        let response = self
            .mutating(self.http.post(format!("{}{}", self.base_url, path)))
            .form(form)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), HypervisorError> {
        debug!("DELETE {}", path);
        let response = self
            .mutating(self.http.delete(format!("{}{}", self.base_url, path)))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl Hypervisor for ProxmoxClient {
    async fn list_vms(&self) -> Result<Vec<HypervisorVm>, HypervisorError> {
        let entries: Vec<QemuEntry> = self.get_data(&format!("/nodes/{}/qemu", self.node)).await?;
        Ok(entries
            .into_iter()
            .map(|entry| HypervisorVm {
                id: VmId(entry.vmid),
                name: entry.name.unwrap_or_else(|| entry.vmid.to_string()),
                power: PowerState::from_status(&entry.status),
            })
            .collect())
    }

    async fn power_on(&self, id: VmId) -> Result<(), HypervisorError> {
        self.post_form(&self.vm_path(id, "/status/start"), &[]).await
    }

    async fn power_off(&self, id: VmId) -> Result<(), HypervisorError> {
        self.post_form(&self.vm_path(id, "/status/shutdown"), &[]).await
    }

    async fn reboot(&self, id: VmId) -> Result<(), HypervisorError> {
        self.post_form(&self.vm_path(id, "/status/reboot"), &[]).await
    }

    async fn list_snapshots(&self, id: VmId) -> Result<Vec<String>, HypervisorError> {
        let entries: Vec<SnapshotEntry> = self.get_data(&self.vm_path(id, "/snapshot")).await?;
        Ok(entries.into_iter().map(|s| s.name).collect())
    }

    async fn create_snapshot(&self, id: VmId, name: &str) -> Result<(), HypervisorError> {
        self.post_form(&self.vm_path(id, "/snapshot"), &[("snapname", name)]).await
    }

    async fn delete_snapshot(&self, id: VmId, name: &str) -> Result<(), HypervisorError> {
        self.delete(&self.vm_path(id, &format!("/snapshot/{}", name))).await
    }
}

async fn check_status(response: Response) -> Result<Response, HypervisorError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(HypervisorError::Api { status: status.as_u16(), body })
    }
}

/// Build `https://host:8006/api2/json` from a bare host, `host:port` or full URL
fn api_base_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    let root = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else if host.contains(':') {
        format!("https://{}", host)
    } else {
        format!("https://{}:{}", host, DEFAULT_API_PORT)
    };
    format!("{}/api2/json", root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_url() {
        assert_eq!(api_base_url("pve.example.com"), "https://pve.example.com:8006/api2/json");
        assert_eq!(api_base_url("pve.example.com:443"), "https://pve.example.com:443/api2/json");
        assert_eq!(api_base_url("https://pve.local:8006/"), "https://pve.local:8006/api2/json");
    }

    #[test]
    fn test_qemu_listing_deserialization() {
        let json = r#"{"data":[{"vmid":100,"name":"web01","status":"running","cpus":2},{"vmid":101,"status":"stopped"}]}"#;
        let parsed: ApiResponse<Vec<QemuEntry>> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data.len(), 2);
        assert_eq!(parsed.data[0].name.as_deref(), Some("web01"));
        assert!(parsed.data[1].name.is_none());
        assert_eq!(parsed.data[1].status, "stopped");
    }

    #[test]
    fn test_ticket_deserialization() {
        let json = r#"{"data":{"ticket":"PVE:root@pam:ABC","CSRFPreventionToken":"XYZ","username":"root@pam"}}"#;
        let parsed: ApiResponse<TicketData> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data.ticket, "PVE:root@pam:ABC");
        assert_eq!(parsed.data.csrf_prevention_token, "XYZ");
    }
}
