//! Symbion Patch Agent - one rolling patch run over the VM inventory
//!
//! Reads its settings from the environment (optionally a `.env` file),
//! patches every eligible VM and reports the outcome via Telegram.

use anyhow::{Context, Result};
use tracing::{debug, info};

use symbion_patch_agent::clients::{ProxmoxClient, SshExecutor, TelegramNotifier};
use symbion_patch_agent::{report, FleetRunner, Inventory, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "symbion_patch_agent=info".into()),
        )
        .init();

    info!("🩹 Symbion Patch Agent starting...");

    let settings = Settings::from_env().context("Failed to load configuration")?;
    let inventory = Inventory::load(&settings.inventory_file)
        .await
        .with_context(|| {
            format!("Failed to load inventory {}", settings.inventory_file.display())
        })?;

    let hypervisor = ProxmoxClient::connect(&settings.proxmox)
        .await
        .context("Failed to connect to Proxmox")?;
    let remote = SshExecutor::new(settings.ssh.clone());

    let runner = FleetRunner::new(&hypervisor, &remote, settings.pipeline.clone());
    let fleet = runner
        .discover(&inventory, &settings.domain)
        .await
        .context("Failed to discover VMs")?;

    let stats = runner.run(&fleet).await;
    debug!("Run summary: {}", serde_json::to_string(&stats).unwrap_or_default());
    let message = report::compose(&stats);
    info!("{}", message);

    match &settings.notification {
        Some(telegram) => {
            let notifier = TelegramNotifier::new(
                telegram.bot_token.clone(),
                telegram.chat_id.clone(),
                telegram.timeout,
            );
            report::deliver_via(notifier, &message).await;
        }
        None => info!("Notifications disabled"),
    }

    info!("✅ Patch run finished");
    Ok(())
}
