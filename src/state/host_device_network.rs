use std::path::Path;
use std::sync::Arc;

use kube::api::GroupVersionKind;
use kube::ResourceExt;
use serde::Serialize;

use super::{
    gvk_of, BuildOutcome, InfoCatalog, ManifestState, RenderDataBuilder, SyncState, WatchSources,
};
use crate::cluster::ClusterClient;
use crate::consts::RESOURCE_NAME_PREFIX;
use crate::crd::{HostDeviceNetwork, HostDeviceNetworkSpec};
use crate::error::{SyncError, SyncResult};
use crate::telemetry::SyncLog;

pub const STATE_HOST_DEVICE_NETWORK_NAME: &str = "state-host-device-network";
pub const STATE_HOST_DEVICE_NETWORK_DESCRIPTION: &str =
    "Host Device net-attach-def CR deployed in cluster";

const NETWORK_ATTACHMENT_DEFINITION_KIND: &str = "NetworkAttachmentDefinition";

/// Environment facts every state exposes to its templates
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct RuntimeSpec {
    pub namespace: String,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct HostDeviceManifestRenderData {
    pub host_device_network_name: String,
    pub cr_spec: HostDeviceNetworkSpec,
    pub runtime_spec: RuntimeSpec,
    pub resource_name: String,
    /// Parsed IPAM configuration, an empty object when none is set
    pub ipam: serde_json::Value,
}

/// Prefix `name` with `nvidia.com/` unless it already carries it
pub fn normalize_resource_name(name: &str) -> String {
    if name.starts_with(RESOURCE_NAME_PREFIX) {
        name.to_string()
    } else {
        format!("{}{}", RESOURCE_NAME_PREFIX, name)
    }
}

pub struct HostDeviceNetworkRenderDataBuilder {
    namespace: String,
}

impl HostDeviceNetworkRenderDataBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

impl RenderDataBuilder for HostDeviceNetworkRenderDataBuilder {
    type Resource = HostDeviceNetwork;
    type Data = HostDeviceManifestRenderData;

    fn build(
        &self,
        cr: &HostDeviceNetwork,
        _catalog: &InfoCatalog,
        _log: &SyncLog,
    ) -> SyncResult<BuildOutcome<HostDeviceManifestRenderData>> {
        let spec = &cr.spec;

        let short_name = spec
            .resource_name
            .strip_prefix(RESOURCE_NAME_PREFIX)
            .unwrap_or(&spec.resource_name);
        if short_name.trim().is_empty() {
            return Err(SyncError::InvalidSpec(format!(
                "HostDeviceNetwork {} has no resourceName",
                cr.name_any()
            )));
        }

        let ipam = if spec.ipam.trim().is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            let ipam: serde_json::Value = serde_json::from_str(&spec.ipam).map_err(|e| {
                SyncError::InvalidSpec(format!(
                    "ipam of {} is not valid JSON: {}",
                    cr.name_any(),
                    e
                ))
            })?;
            if !ipam.is_object() {
                return Err(SyncError::InvalidSpec(format!(
                    "ipam of {} must be a JSON object",
                    cr.name_any()
                )));
            }
            ipam
        };

        Ok(BuildOutcome::Render(HostDeviceManifestRenderData {
            host_device_network_name: cr.name_any(),
            cr_spec: spec.clone(),
            runtime_spec: RuntimeSpec {
                namespace: self.namespace.clone(),
            },
            resource_name: normalize_resource_name(&spec.resource_name),
            ipam,
        }))
    }

    fn empty_render_verdict(&self) -> SyncState {
        SyncState::Error
    }

    fn primary_kind(&self) -> Option<&'static str> {
        Some(NETWORK_ATTACHMENT_DEFINITION_KIND)
    }

    fn watch_sources(&self) -> WatchSources {
        WatchSources::from([
            ("HostDeviceNetwork".to_string(), gvk_of::<HostDeviceNetwork>()),
            (
                NETWORK_ATTACHMENT_DEFINITION_KIND.to_string(),
                GroupVersionKind::gvk("k8s.cni.cncf.io", "v1", NETWORK_ATTACHMENT_DEFINITION_KIND),
            ),
        ])
    }
}

pub type StateHostDeviceNetwork = ManifestState<HostDeviceNetworkRenderDataBuilder>;

/// Creates the state managing the NetworkAttachmentDefinition of a HostDeviceNetwork
pub fn new_state_host_device_network(
    client: Arc<dyn ClusterClient>,
    manifest_dir: &Path,
    namespace: &str,
    log: &SyncLog,
) -> SyncResult<StateHostDeviceNetwork> {
    ManifestState::new(
        STATE_HOST_DEVICE_NETWORK_NAME,
        STATE_HOST_DEVICE_NETWORK_DESCRIPTION,
        client,
        manifest_dir,
        HostDeviceNetworkRenderDataBuilder::new(namespace),
        log,
    )
}
