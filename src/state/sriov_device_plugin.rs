use std::path::Path;
use std::sync::Arc;

use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::NodeAffinity;
use serde::Serialize;

use super::host_device_network::RuntimeSpec;
use super::{gvk_of, BuildOutcome, InfoCatalog, ManifestState, RenderDataBuilder, WatchSources};
use crate::cluster::ClusterClient;
use crate::consts::NODE_LABEL_MLNX_NIC;
use crate::crd::{DevicePluginSpec, NicClusterPolicy};
use crate::error::{SyncError, SyncResult};
use crate::nodeinfo::{AttributeType, NodeLabelFilterBuilder};
use crate::telemetry::SyncLog;

pub const STATE_SRIOV_DEVICE_PLUGIN_NAME: &str = "state-SRIOV-device-plugin";
pub const STATE_SRIOV_DEVICE_PLUGIN_DESCRIPTION: &str =
    "SR-IOV device plugin deployed in the cluster";

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SriovDpRuntimeSpec {
    #[serde(flatten)]
    pub runtime_spec: RuntimeSpec,
    #[serde(rename = "CPUArch")]
    pub cpu_arch: String,
    #[serde(rename = "OSName")]
    pub os_name: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SriovDpManifestRenderData {
    pub cr_spec: DevicePluginSpec,
    pub node_affinity: Option<NodeAffinity>,
    /// Set when the OFED driver is deployed too, so the plugin waits for it
    pub deploy_init_container: bool,
    pub runtime_spec: SriovDpRuntimeSpec,
}

pub struct SriovDpRenderDataBuilder {
    namespace: String,
}

impl SriovDpRenderDataBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

impl RenderDataBuilder for SriovDpRenderDataBuilder {
    type Resource = NicClusterPolicy;
    type Data = SriovDpManifestRenderData;

    fn build(
        &self,
        cr: &NicClusterPolicy,
        catalog: &InfoCatalog,
        log: &SyncLog,
    ) -> SyncResult<BuildOutcome<SriovDpManifestRenderData>> {
        let Some(dp_spec) = &cr.spec.sriov_device_plugin else {
            // Not requested or removed by an update; objects created earlier stay in place
            log.info(format_args!("Device plugin spec in CR is nil, no action required"));
            return Ok(BuildOutcome::NotApplicable);
        };

        let node_info = catalog
            .node_info_provider()
            .ok_or(SyncError::MissingCapability("node information"))?;

        let attrs = node_info.get_nodes_attributes(
            &NodeLabelFilterBuilder::new()
                .with_label(NODE_LABEL_MLNX_NIC, "true")
                .build(),
        );
        let Some(first) = attrs.first() else {
            log.info(format_args!("No nodes with NVIDIA NICs where found in the cluster."));
            return Ok(BuildOutcome::NothingToRender);
        };

        Ok(BuildOutcome::Render(SriovDpManifestRenderData {
            cr_spec: dp_spec.clone(),
            node_affinity: cr.spec.node_affinity.clone(),
            deploy_init_container: cr.spec.ofed_driver.is_some(),
            runtime_spec: SriovDpRuntimeSpec {
                runtime_spec: RuntimeSpec {
                    namespace: self.namespace.clone(),
                },
                cpu_arch: first.get(AttributeType::CpuArch).unwrap_or_default().to_string(),
                os_name: first.get(AttributeType::OsName).unwrap_or_default().to_string(),
            },
        }))
    }

    fn watch_sources(&self) -> WatchSources {
        WatchSources::from([("DaemonSet".to_string(), gvk_of::<DaemonSet>())])
    }
}

pub type StateSriovDp = ManifestState<SriovDpRenderDataBuilder>;

pub fn new_state_sriov_dp(
    client: Arc<dyn ClusterClient>,
    manifest_dir: &Path,
    namespace: &str,
    log: &SyncLog,
) -> SyncResult<StateSriovDp> {
    ManifestState::new(
        STATE_SRIOV_DEVICE_PLUGIN_NAME,
        STATE_SRIOV_DEVICE_PLUGIN_DESCRIPTION,
        client,
        manifest_dir,
        SriovDpRenderDataBuilder::new(namespace),
        log,
    )
}
