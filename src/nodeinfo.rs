//! Node facts gathered from node labels.

use std::collections::{BTreeMap, HashMap};

use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;

use crate::consts::{
    NODE_LABEL_CPU_ARCH, NODE_LABEL_HOSTNAME, NODE_LABEL_OS_NAME, NODE_LABEL_OS_VERSION,
};

/// Facts a provider can report about a node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeType {
    Hostname,
    CpuArch,
    OsName,
    OsVersion,
}

impl AttributeType {
    pub const ALL: [AttributeType; 4] = [
        AttributeType::Hostname,
        AttributeType::CpuArch,
        AttributeType::OsName,
        AttributeType::OsVersion,
    ];

    /// Node label the attribute is read from
    pub fn label(&self) -> &'static str {
        match self {
            AttributeType::Hostname => NODE_LABEL_HOSTNAME,
            AttributeType::CpuArch => NODE_LABEL_CPU_ARCH,
            AttributeType::OsName => NODE_LABEL_OS_NAME,
            AttributeType::OsVersion => NODE_LABEL_OS_VERSION,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeAttributes {
    pub name: String,
    pub attributes: HashMap<AttributeType, String>,
}

impl NodeAttributes {
    fn from_node(node: &Node) -> Self {
        let labels = node.labels();
        let attributes = AttributeType::ALL
            .iter()
            .filter_map(|attr| labels.get(attr.label()).map(|v| (*attr, v.clone())))
            .collect();

        Self {
            name: node.name_any(),
            attributes,
        }
    }

    pub fn get(&self, attr: AttributeType) -> Option<&str> {
        self.attributes.get(&attr).map(|s| s.as_str())
    }
}

/// Predicate over nodes
pub trait Filter: Send + Sync {
    fn matches(&self, node: &Node) -> bool;
}

/// Matches nodes carrying every configured label with the given value
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeLabelFilter {
    labels: BTreeMap<String, String>,
}

impl Filter for NodeLabelFilter {
    fn matches(&self, node: &Node) -> bool {
        let node_labels = node.labels();
        self.labels
            .iter()
            .all(|(key, value)| node_labels.get(key) == Some(value))
    }
}

#[derive(Clone, Debug, Default)]
pub struct NodeLabelFilterBuilder {
    filter: NodeLabelFilter,
}

impl NodeLabelFilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.labels.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> NodeLabelFilter {
        self.filter
    }
}

/// Source of node facts queried while building render data
pub trait Provider: Send + Sync {
    fn get_nodes_attributes(&self, filter: &dyn Filter) -> Vec<NodeAttributes>;
}

/// Provider over a point-in-time list of nodes
#[derive(Clone, Debug, Default)]
pub struct NodeSnapshotProvider {
    nodes: Vec<Node>,
}

impl NodeSnapshotProvider {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Lists the cluster's nodes once
    pub async fn from_cluster(client: kube::Client) -> Result<Self, kube::Error> {
        let api: kube::Api<Node> = kube::Api::all(client);
        let nodes = api.list(&Default::default()).await?.items;
        Ok(Self::new(nodes))
    }
}

impl Provider for NodeSnapshotProvider {
    fn get_nodes_attributes(&self, filter: &dyn Filter) -> Vec<NodeAttributes> {
        self.nodes
            .iter()
            .filter(|node| filter.matches(node))
            .map(NodeAttributes::from_node)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::NODE_LABEL_MLNX_NIC;
    use kube::api::ObjectMeta;

    fn node(name: &str, labels: &[(&str, &str)]) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn filter_requires_every_label() {
        let filter = NodeLabelFilterBuilder::new()
            .with_label(NODE_LABEL_MLNX_NIC, "true")
            .with_label("zone", "a")
            .build();

        assert!(filter.matches(&node("n1", &[(NODE_LABEL_MLNX_NIC, "true"), ("zone", "a")])));
        assert!(!filter.matches(&node("n2", &[(NODE_LABEL_MLNX_NIC, "true")])));
        assert!(!filter.matches(&node("n3", &[(NODE_LABEL_MLNX_NIC, "false"), ("zone", "a")])));
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = NodeLabelFilterBuilder::new().build();
        assert!(filter.matches(&node("bare", &[])));
    }

    #[test]
    fn provider_reports_label_attributes_of_matching_nodes() {
        let provider = NodeSnapshotProvider::new(vec![
            node(
                "worker-1",
                &[
                    (NODE_LABEL_MLNX_NIC, "true"),
                    (NODE_LABEL_OS_NAME, "ubuntu"),
                    (NODE_LABEL_CPU_ARCH, "amd64"),
                ],
            ),
            node("worker-2", &[(NODE_LABEL_OS_NAME, "rhel")]),
        ]);

        let attrs = provider.get_nodes_attributes(
            &NodeLabelFilterBuilder::new()
                .with_label(NODE_LABEL_MLNX_NIC, "true")
                .build(),
        );

        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].name, "worker-1");
        assert_eq!(attrs[0].get(AttributeType::OsName), Some("ubuntu"));
        assert_eq!(attrs[0].get(AttributeType::CpuArch), Some("amd64"));
        assert_eq!(attrs[0].get(AttributeType::OsVersion), None);
    }
}
