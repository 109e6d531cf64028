pub mod host_device_network;
pub mod nic_cluster_policy;

pub use host_device_network::{HostDeviceNetwork, HostDeviceNetworkSpec, HostDeviceNetworkStatus};
pub use nic_cluster_policy::{
    AppliedState, DevicePluginSpec, ImageSpec, NicClusterPolicy, NicClusterPolicySpec,
    NicClusterPolicyStatus, OfedDriverSpec,
};
