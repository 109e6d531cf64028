/// Namespace the operator deploys its sub-resources into
pub const NETWORK_OPERATOR_RESOURCE_NAMESPACE: &str = "nvidia-network-operator";

/// Prefix every device-plugin resource name must carry
pub const RESOURCE_NAME_PREFIX: &str = "nvidia.com/";

/// Label set by node-feature-discovery on nodes with a Mellanox PCI device
pub const NODE_LABEL_MLNX_NIC: &str = "feature.node.kubernetes.io/pci-15b3.present";

pub const NODE_LABEL_OS_NAME: &str = "feature.node.kubernetes.io/system-os_release.ID";
pub const NODE_LABEL_OS_VERSION: &str = "feature.node.kubernetes.io/system-os_release.VERSION_ID";
pub const NODE_LABEL_CPU_ARCH: &str = "kubernetes.io/arch";
pub const NODE_LABEL_HOSTNAME: &str = "kubernetes.io/hostname";

/// Field manager recorded on objects written by this operator
pub const FIELD_MANAGER: &str = "network-state-sync";
