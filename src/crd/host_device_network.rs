use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostDeviceNetworkStatus {
    /// Readiness of the generated NetworkAttachmentDefinition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Reference of the generated NetworkAttachmentDefinition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_device_network_attachment_def: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A host-device CNI network backed by a device-plugin resource
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[kube(
    group = "mellanox.com",
    version = "v1alpha1",
    kind = "HostDeviceNetwork",
    shortname = "hdn",
    schema = "disabled",
    status = "HostDeviceNetworkStatus",
    printcolumn = r#"{"name":"Status", "jsonPath":".status.state", "type": "string"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct HostDeviceNetworkSpec {
    /// Namespace the NetworkAttachmentDefinition is created in
    #[serde(default = "default_network_namespace")]
    pub network_namespace: String,

    /// Device plugin resource backing the network, e.g. `nvidia.com/hostdev`
    #[serde(default)]
    pub resource_name: String,

    /// IPAM configuration as raw JSON
    #[serde(default)]
    pub ipam: String,
}

fn default_network_namespace() -> String {
    "default".to_string()
}
