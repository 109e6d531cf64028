use k8s_openapi::api::core::v1::NodeAffinity;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Container image coordinates shared by every deployable component
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    /// Image name
    pub image: String,

    /// Registry / repository the image is pulled from
    pub repository: String,

    /// Image tag
    pub version: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_pull_secrets: Vec<String>,
}

/// Mellanox OFED driver container
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OfedDriverSpec {
    #[serde(flatten)]
    pub image_spec: ImageSpec,
}

/// SR-IOV network device plugin
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DevicePluginSpec {
    #[serde(flatten)]
    pub image_spec: ImageSpec,

    /// Device plugin configuration, rendered verbatim into its ConfigMap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
}

/// Result of one state as recorded on the policy status
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AppliedState {
    pub name: String,
    pub state: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NicClusterPolicyStatus {
    /// Aggregated state of every sub-component
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_states: Vec<AppliedState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Cluster-wide policy describing which NIC components should be deployed
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize)]
#[kube(
    group = "mellanox.com",
    version = "v1alpha1",
    kind = "NicClusterPolicy",
    shortname = "ncp",
    schema = "disabled",
    status = "NicClusterPolicyStatus",
    printcolumn = r#"{"name":"Status", "jsonPath":".status.state", "type": "string"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NicClusterPolicySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_affinity: Option<NodeAffinity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ofed_driver: Option<OfedDriverSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sriov_device_plugin: Option<DevicePluginSpec>,
}
