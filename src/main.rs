use anyhow::Context;
use kube::Client;

use network_state_sync::config::OperatorConfig;
use network_state_sync::controller::{start_controllers, ControllerContext};
use network_state_sync::telemetry::SyncLog;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = OperatorConfig::from_env().context("failed to load configuration")?;
    log::info!(
        "Using manifests from {} for namespace {}",
        config.manifests_dir.display(),
        config.namespace
    );

    let client = Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    let log = SyncLog::facade("network_state_sync::state");
    let context = ControllerContext::new(client.clone(), &config, &log)
        .context("failed to load state manifests")?;

    start_controllers(client, context).await;

    Ok(())
}
