pub mod apply;
pub mod cluster;
pub mod config;
pub mod controller;
pub mod consts;
pub mod crd;
pub mod error;
pub mod nodeinfo;
pub mod render;
pub mod state;
pub mod status;
pub mod telemetry;
pub mod utils;

pub mod prelude {
    pub use crate::cluster::{ClusterClient, KubeCluster, ObjectKey};
    pub use crate::config::OperatorConfig;
    pub use crate::crd::*;
    pub use crate::error::{format_error_chain, SyncError, SyncResult};
    pub use crate::nodeinfo::{NodeLabelFilterBuilder, NodeSnapshotProvider, Provider};
    pub use crate::state::{
        manager::{Results, StateManager},
        InfoCatalog, State, SyncFailure, SyncState, WatchSources,
    };
    pub use crate::telemetry::SyncLog;
}
