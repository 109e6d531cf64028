use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use kube::api::{Api, ApiResource, DynamicObject, Patch, PatchParams, ResourceExt};
use kube::client::Client;
use kube::runtime::{controller::Action, watcher, Controller};
use kube::Resource;
use serde::de::DeserializeOwned;

use crate::cluster::{ClusterClient, KubeCluster};
use crate::config::OperatorConfig;
use crate::crd::{HostDeviceNetwork, NicClusterPolicy};
use crate::error::SyncError;
use crate::nodeinfo::NodeSnapshotProvider;
use crate::state::host_device_network::new_state_host_device_network;
use crate::state::manager::{Results, StateManager};
use crate::state::sriov_device_plugin::new_state_sriov_dp;
use crate::state::{gvk_of, InfoCatalog, State, SyncState, WatchSources};
use crate::telemetry::SyncLog;

pub const HOST_DEVICE_NETWORK_MANIFESTS: &str = "state-host-device-network";
pub const SRIOV_DEVICE_PLUGIN_MANIFESTS: &str = "state-sriov-device-plugin";

/// Delay before retrying a resource that did not converge
const NOT_READY_REQUEUE: Duration = Duration::from_secs(5);

/// Context shared by both controllers
pub struct ControllerContext {
    client: Client,
    nic_cluster_policy: StateManager<NicClusterPolicy>,
    host_device_network: StateManager<HostDeviceNetwork>,
    requeue: Duration,
}

impl ControllerContext {
    pub fn new(client: Client, config: &OperatorConfig, log: &SyncLog) -> Result<Self, SyncError> {
        let cluster: Arc<dyn ClusterClient> = Arc::new(KubeCluster::new(client.clone()));

        let sriov_dp = new_state_sriov_dp(
            cluster.clone(),
            &config.state_manifest_dir(SRIOV_DEVICE_PLUGIN_MANIFESTS),
            &config.namespace,
            log,
        )?;
        let host_device = new_state_host_device_network(
            cluster,
            &config.state_manifest_dir(HOST_DEVICE_NETWORK_MANIFESTS),
            &config.namespace,
            log,
        )?;

        let nic_states: Vec<Box<dyn State<NicClusterPolicy>>> = vec![Box::new(sriov_dp)];
        let hdn_states: Vec<Box<dyn State<HostDeviceNetwork>>> = vec![Box::new(host_device)];

        Ok(Self {
            client,
            nic_cluster_policy: StateManager::new(nic_states, log),
            host_device_network: StateManager::new(hdn_states, log),
            requeue: config.requeue,
        })
    }

    /// Snapshot of the cluster facts states may consult during one reconcile
    async fn catalog(&self) -> Result<InfoCatalog, Error> {
        let nodes = NodeSnapshotProvider::from_cluster(self.client.clone()).await?;
        Ok(InfoCatalog::new().with_node_info_provider(Arc::new(nodes)))
    }

    fn requeue_after(&self, status: SyncState) -> Action {
        match status {
            SyncState::Ready | SyncState::Ignore => Action::requeue(self.requeue),
            SyncState::NotReady | SyncState::Error => Action::requeue(NOT_READY_REQUEUE),
        }
    }
}

/// Error type for controller operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Kube API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

async fn reconcile_nic_cluster_policy(
    ncp: Arc<NicClusterPolicy>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, Error> {
    let name = ncp.name_any();
    log::debug!("Reconciling NicClusterPolicy {}", name);

    let catalog = ctx.catalog().await?;
    let results = ctx.nic_cluster_policy.sync_state(&ncp, &catalog).await;

    let status = serde_json::json!({
        "status": {
            "state": results.status.to_string(),
            "appliedStates": results.applied_states(),
            "reason": results.reason(),
        }
    });
    let api: Api<NicClusterPolicy> = Api::all(ctx.client.clone());
    api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&status))
        .await?;

    log_results("NicClusterPolicy", &name, &results);
    Ok(ctx.requeue_after(results.status))
}

async fn reconcile_host_device_network(
    hdn: Arc<HostDeviceNetwork>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, Error> {
    let name = hdn.name_any();
    log::debug!("Reconciling HostDeviceNetwork {}", name);

    let catalog = ctx.catalog().await?;
    let results = ctx.host_device_network.sync_state(&hdn, &catalog).await;

    let attachment_def = (results.status == SyncState::Ready)
        .then(|| format!("{}/{}", hdn.spec.network_namespace, name));
    let status = serde_json::json!({
        "status": {
            "state": results.status.to_string(),
            "hostDeviceNetworkAttachmentDef": attachment_def,
            "reason": results.reason(),
        }
    });
    let api: Api<HostDeviceNetwork> = Api::all(ctx.client.clone());
    api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&status))
        .await?;

    log_results("HostDeviceNetwork", &name, &results);
    Ok(ctx.requeue_after(results.status))
}

fn log_results(kind: &str, name: &str, results: &Results) {
    match results.status {
        SyncState::Ready => log::info!("{} {} is ready", kind, name),
        state => log::info!("{} {} is {}, will be reconciled again", kind, name, state),
    }
}

/// Error handler for the controllers
fn error_policy<K>(_obj: Arc<K>, error: &Error, _ctx: Arc<ControllerContext>) -> Action {
    log::error!("Error during reconciliation: {:?}", error);
    Action::requeue(NOT_READY_REQUEUE)
}

/// Add a watch on every owned kind a state asked for
fn watch_sources<K>(
    controller: Controller<K>,
    client: &Client,
    sources: &WatchSources,
) -> Controller<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    let own = gvk_of::<K>();
    sources
        .iter()
        .filter(|(_, gvk)| **gvk != own)
        .fold(controller, |controller, (name, gvk)| {
            log::debug!("Watching {} for {}", name, K::kind(&()));
            let ar = ApiResource::from_gvk(gvk);
            let api: Api<DynamicObject> = Api::all_with(client.clone(), &ar);
            controller.owns_with(api, ar, watcher::Config::default())
        })
}

/// Run the NicClusterPolicy and HostDeviceNetwork controllers until they stop
pub async fn start_controllers(client: Client, context: ControllerContext) {
    let context = Arc::new(context);

    log::info!("Starting NicClusterPolicy controller");
    let policies: Api<NicClusterPolicy> = Api::all(client.clone());
    let policy_controller = watch_sources(
        Controller::new(policies, watcher::Config::default()),
        &client,
        &context.nic_cluster_policy.watch_sources(),
    )
    .run(reconcile_nic_cluster_policy, error_policy, context.clone())
    .for_each(|res| async move {
        match res {
            Ok(o) => log::debug!("Reconciliation completed: {:?}", o),
            Err(e) => log::error!("Reconciliation error: {:?}", e),
        }
    });

    log::info!("Starting HostDeviceNetwork controller");
    let networks: Api<HostDeviceNetwork> = Api::all(client.clone());
    let network_controller = watch_sources(
        Controller::new(networks, watcher::Config::default()),
        &client,
        &context.host_device_network.watch_sources(),
    )
    .run(reconcile_host_device_network, error_policy, context.clone())
    .for_each(|res| async move {
        match res {
            Ok(o) => log::debug!("Reconciliation completed: {:?}", o),
            Err(e) => log::error!("Reconciliation error: {:?}", e),
        }
    });

    futures_util::future::join(policy_controller, network_controller).await;
}
