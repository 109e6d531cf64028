use std::fmt;

use async_trait::async_trait;
use kube::api::{Api, DynamicObject, GroupVersionKind, PostParams, TypeMeta};
use kube::core::discovery;
use kube::discovery::pinned_kind;
use kube::{Client, ResourceExt};

#[cfg(test)]
use mockall::automock;

use crate::consts::FIELD_MANAGER;
use crate::error::ClusterError;

/// Identity of an object in the cluster
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub api_version: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn from_object(obj: &DynamicObject) -> Result<Self, ClusterError> {
        let types = obj
            .types
            .as_ref()
            .ok_or(ClusterError::MissingField("types"))?;
        let name = obj
            .metadata
            .name
            .clone()
            .ok_or(ClusterError::MissingField("metadata.name"))?;

        Ok(Self {
            api_version: types.api_version.clone(),
            kind: types.kind.clone(),
            namespace: obj.metadata.namespace.clone(),
            name,
        })
    }

    pub fn gvk(&self) -> Result<GroupVersionKind, ClusterError> {
        GroupVersionKind::try_from(&TypeMeta {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
        })
        .map_err(|e| ClusterError::InvalidGvk(e.to_string()))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Human readable reference used in log lines and errors
pub fn describe(obj: &DynamicObject) -> String {
    match ObjectKey::from_object(obj) {
        Ok(key) => key.to_string(),
        Err(_) => obj.name_any(),
    }
}

/// Trait abstracting the cluster API calls the reconciliation core needs
///
/// Implementations must be safe to share between concurrent reconciliations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Read the live object, `None` when it does not exist
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>, ClusterError>;

    /// Create a new object; fails with `AlreadyExists` when it is already there
    async fn create(&self, obj: &DynamicObject) -> Result<DynamicObject, ClusterError>;

    /// Replace an existing object; the object carries the resourceVersion it was read at
    async fn update(&self, obj: &DynamicObject) -> Result<DynamicObject, ClusterError>;
}

/// `ClusterClient` backed by a real API server
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn api_for(&self, key: &ObjectKey) -> Result<Api<DynamicObject>, ClusterError> {
        let gvk = key.gvk()?;

        // resolve ApiResource and scope
        let (ar, caps) =
            pinned_kind(&self.client, &gvk)
                .await
                .map_err(|source| ClusterError::Discovery {
                    gvk: format!("{:?}", gvk),
                    source,
                })?;

        let api = match caps.scope {
            discovery::Scope::Namespaced => {
                let ns = key
                    .namespace
                    .as_deref()
                    .ok_or(ClusterError::MissingField("metadata.namespace"))?;
                Api::namespaced_with(self.client.clone(), ns, &ar)
            }
            discovery::Scope::Cluster => Api::all_with(self.client.clone(), &ar),
        };
        Ok(api)
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>, ClusterError> {
        let api = self.api_for(key).await?;
        let obj = api.get_opt(&key.name).await?;
        // the API server does not always echo type information back
        Ok(obj.map(|mut o| {
            o.types = o.types.or(Some(TypeMeta {
                api_version: key.api_version.clone(),
                kind: key.kind.clone(),
            }));
            o
        }))
    }

    async fn create(&self, obj: &DynamicObject) -> Result<DynamicObject, ClusterError> {
        let key = ObjectKey::from_object(obj)?;
        let api = self.api_for(&key).await?;

        match api.create(&post_params(), obj).await {
            Ok(created) => Ok(created),
            Err(kube::Error::Api(e)) if e.code == 409 => Err(ClusterError::AlreadyExists {
                kind: key.kind,
                name: key.name,
            }),
            Err(e) => Err(ClusterError::Kubernetes(e)),
        }
    }

    async fn update(&self, obj: &DynamicObject) -> Result<DynamicObject, ClusterError> {
        let key = ObjectKey::from_object(obj)?;
        let api = self.api_for(&key).await?;

        match api.replace(&key.name, &post_params(), obj).await {
            Ok(updated) => Ok(updated),
            Err(kube::Error::Api(e)) if e.code == 409 => Err(ClusterError::Conflict {
                kind: key.kind,
                name: key.name,
            }),
            Err(kube::Error::Api(e)) if e.code == 404 => Err(ClusterError::NotFound {
                kind: key.kind,
                name: key.name,
            }),
            Err(e) => Err(ClusterError::Kubernetes(e)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn nad() -> DynamicObject {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "k8s.cni.cncf.io/v1",
            "kind": "NetworkAttachmentDefinition",
            "metadata": { "name": "hostdev-net", "namespace": "default" },
            "spec": { "config": "{}" }
        }))
        .unwrap()
    }

    #[test]
    fn key_from_object() {
        let key = ObjectKey::from_object(&nad()).unwrap();
        assert_eq!(key.kind, "NetworkAttachmentDefinition");
        assert_eq!(key.namespace.as_deref(), Some("default"));
        assert_eq!(key.to_string(), "NetworkAttachmentDefinition/default/hostdev-net");

        let gvk = key.gvk().unwrap();
        assert_eq!(gvk.group, "k8s.cni.cncf.io");
        assert_eq!(gvk.version, "v1");
    }

    #[test]
    fn cluster_scoped_key_display() {
        let mut obj = nad();
        obj.metadata.namespace = None;
        assert_eq!(describe(&obj), "NetworkAttachmentDefinition/hostdev-net");
    }

    #[test]
    fn key_requires_name_and_types() {
        let mut obj = nad();
        obj.metadata.name = None;
        assert!(matches!(
            ObjectKey::from_object(&obj),
            Err(ClusterError::MissingField("metadata.name"))
        ));

        let mut obj = nad();
        obj.types = None;
        assert!(matches!(
            ObjectKey::from_object(&obj),
            Err(ClusterError::MissingField("types"))
        ));
    }
}
