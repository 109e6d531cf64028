//! States: the units that bring one part of the cluster in line with a custom resource.
//!
//! Each state renders a set of objects from the resource it is synced with,
//! applies them with the resource as their controller and reports a single
//! [`SyncState`]. States never share data with one another during a sync.

pub mod host_device_network;
pub mod manager;
pub mod skel;
pub mod sriov_device_plugin;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use kube::api::GroupVersionKind;
use kube::Resource;
use serde::Serialize;

use crate::error::SyncError;
use crate::nodeinfo::Provider;

pub use skel::{BuildOutcome, ManifestState, RenderDataBuilder};

/// Outcome of one sync
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum SyncState {
    /// Every rendered object exists and is healthy
    #[serde(rename = "ready")]
    Ready,
    /// Applied, but something has not converged yet
    #[serde(rename = "notReady")]
    NotReady,
    /// The resource does not ask for this state; previously created objects are orphans
    #[serde(rename = "ignore")]
    Ignore,
    #[serde(rename = "error")]
    Error,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Ready => write!(f, "ready"),
            SyncState::NotReady => write!(f, "notReady"),
            SyncState::Ignore => write!(f, "ignore"),
            SyncState::Error => write!(f, "error"),
        }
    }
}

/// A sync that ended with an error attached
///
/// The verdict is `Error` for faults that need a change to the resource or the
/// manifests, `NotReady` for faults the next reconcile is expected to clear.
#[derive(Debug, thiserror::Error)]
#[error("sync ended {state}")]
pub struct SyncFailure {
    pub state: SyncState,
    #[source]
    pub source: SyncError,
}

impl SyncFailure {
    pub fn error(source: SyncError) -> Self {
        Self {
            state: SyncState::Error,
            source,
        }
    }

    pub fn not_ready(source: SyncError) -> Self {
        Self {
            state: SyncState::NotReady,
            source,
        }
    }
}

/// Read-only directory of cluster fact providers
#[derive(Clone, Default)]
pub struct InfoCatalog {
    node_info: Option<Arc<dyn Provider>>,
}

impl InfoCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node_info_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.node_info = Some(provider);
        self
    }

    pub fn node_info_provider(&self) -> Option<&dyn Provider> {
        self.node_info.as_deref()
    }
}

/// Kinds whose changes should trigger another sync, keyed by a readable name
pub type WatchSources = BTreeMap<String, GroupVersionKind>;

/// GVK of a statically typed resource
pub fn gvk_of<K: Resource<DynamicType = ()>>() -> GroupVersionKind {
    GroupVersionKind::gvk(&K::group(&()), &K::version(&()), &K::kind(&()))
}

/// A synchronization unit for custom resources of type `K`
#[async_trait]
pub trait State<K: Send + Sync>: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Attempt to get the cluster to match the desired state this State represents.
    /// A sync must be short and must not wait for objects to converge.
    async fn sync(&self, cr: &K, catalog: &InfoCatalog) -> Result<SyncState, SyncFailure>;

    /// Kinds to watch for this state, fixed at construction
    fn watch_sources(&self) -> &WatchSources;
}
