//! Readiness of applied objects.
//!
//! Every rendered object is re-read from the cluster and judged by the
//! predicate registered for its kind. Kinds without a predicate count as ready
//! as soon as they exist.

use std::collections::HashMap;

use k8s_openapi::api::{
    apps::v1::{DaemonSet, Deployment},
    core::v1::Pod,
};
use kube::api::DynamicObject;
use serde::de::DeserializeOwned;

use crate::cluster::{ClusterClient, ObjectKey};
use crate::error::{SyncError, SyncResult};
use crate::state::SyncState;
use crate::telemetry::SyncLog;

/// Verdict for a single live object
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady(String),
    /// A condition that will not clear without intervention
    Failed(String),
}

pub type ReadinessCheck = fn(&DynamicObject) -> Readiness;

#[derive(Clone)]
pub struct ReadinessRegistry {
    checks: HashMap<String, ReadinessCheck>,
}

impl Default for ReadinessRegistry {
    fn default() -> Self {
        Self::empty()
            .with_check("DaemonSet", daemon_set_readiness)
            .with_check("Deployment", deployment_readiness)
            .with_check("Pod", pod_readiness)
            .with_check("NetworkAttachmentDefinition", |_| Readiness::Ready)
    }
}

impl ReadinessRegistry {
    pub fn empty() -> Self {
        Self {
            checks: HashMap::new(),
        }
    }

    pub fn with_check(mut self, kind: impl Into<String>, check: ReadinessCheck) -> Self {
        self.checks.insert(kind.into(), check);
        self
    }

    pub fn is_known(&self, kind: &str) -> bool {
        self.checks.contains_key(kind)
    }

    pub fn readiness(&self, obj: &DynamicObject) -> Readiness {
        let kind = obj.types.as_ref().map(|t| t.kind.as_str()).unwrap_or("");
        match self.checks.get(kind) {
            Some(check) => check(obj),
            None => Readiness::Ready,
        }
    }
}

fn from_dynamic_object<T: DeserializeOwned>(obj: &DynamicObject) -> Result<T, serde_json::Error> {
    serde_json::to_value(obj).and_then(serde_json::from_value)
}

fn daemon_set_readiness(obj: &DynamicObject) -> Readiness {
    let ds = match from_dynamic_object::<DaemonSet>(obj) {
        Ok(ds) => ds,
        Err(e) => return Readiness::Failed(format!("malformed DaemonSet: {}", e)),
    };
    let Some(status) = ds.status else {
        return Readiness::NotReady("no status reported yet".to_string());
    };

    if let (Some(generation), Some(observed)) =
        (ds.metadata.generation, status.observed_generation)
    {
        if observed < generation {
            return Readiness::NotReady("rollout not observed yet".to_string());
        }
    }

    let unavailable = status.number_unavailable.unwrap_or(0);
    if unavailable > 0 {
        return Readiness::NotReady(format!("{} pods unavailable", unavailable));
    }

    if status.desired_number_scheduled != status.number_ready {
        return Readiness::NotReady(format!(
            "{} ready / {}",
            status.number_ready, status.desired_number_scheduled
        ));
    }

    Readiness::Ready
}

fn deployment_readiness(obj: &DynamicObject) -> Readiness {
    let deployment = match from_dynamic_object::<Deployment>(obj) {
        Ok(d) => d,
        Err(e) => return Readiness::Failed(format!("malformed Deployment: {}", e)),
    };
    let desired = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let Some(status) = deployment.status else {
        return Readiness::NotReady("no status reported yet".to_string());
    };

    let deadline_exceeded = status.conditions.iter().flatten().any(|c| {
        c.type_ == "Progressing" && c.reason.as_deref() == Some("ProgressDeadlineExceeded")
    });
    if deadline_exceeded {
        return Readiness::Failed("ProgressDeadlineExceeded".to_string());
    }

    let ready = status.ready_replicas.unwrap_or(0);
    if ready < desired {
        return Readiness::NotReady(format!("{} ready / {}", ready, desired));
    }
    Readiness::Ready
}

fn pod_readiness(obj: &DynamicObject) -> Readiness {
    let pod = match from_dynamic_object::<Pod>(obj) {
        Ok(p) => p,
        Err(e) => return Readiness::Failed(format!("malformed Pod: {}", e)),
    };
    let Some(status) = pod.status else {
        return Readiness::NotReady("no status reported yet".to_string());
    };

    match status.phase.as_deref() {
        Some("Succeeded") => Readiness::Ready,
        Some("Failed") => Readiness::Failed(
            status
                .reason
                .unwrap_or_else(|| "pod failed".to_string()),
        ),
        Some("Running") => {
            let ready = status
                .conditions
                .iter()
                .flatten()
                .any(|c| c.type_ == "Ready" && c.status == "True");
            if ready {
                Readiness::Ready
            } else {
                Readiness::NotReady("containers not ready".to_string())
            }
        }
        phase => Readiness::NotReady(phase.unwrap_or("Unknown").to_string()),
    }
}

/// Reduce per-object verdicts: any failure wins, then any not-ready, else ready
pub fn aggregate<'a>(verdicts: impl IntoIterator<Item = &'a Readiness>) -> SyncState {
    let mut state = SyncState::Ready;
    for verdict in verdicts {
        match verdict {
            Readiness::Failed(_) => return SyncState::Error,
            Readiness::NotReady(_) => state = SyncState::NotReady,
            Readiness::Ready => {}
        }
    }
    state
}

/// Re-read every object and reduce their readiness to one verdict
///
/// An object that cannot be read back, or that reports a failure, is an error.
pub async fn get_sync_state(
    client: &dyn ClusterClient,
    registry: &ReadinessRegistry,
    log: &SyncLog,
    objs: &[DynamicObject],
) -> SyncResult<SyncState> {
    let mut verdicts = Vec::with_capacity(objs.len());

    for obj in objs {
        let key = ObjectKey::from_object(obj).map_err(|source| SyncError::Observe {
            object: crate::cluster::describe(obj),
            source,
        })?;
        let live = client
            .get(&key)
            .await
            .map_err(|source| SyncError::Observe {
                object: key.to_string(),
                source,
            })?
            .ok_or_else(|| SyncError::Vanished(key.to_string()))?;

        if !registry.is_known(&key.kind) {
            log.debug(format_args!("No readiness check for {}, treating as ready", key));
        }

        let verdict = registry.readiness(&live);
        match &verdict {
            Readiness::Ready => {}
            Readiness::NotReady(reason) => {
                log.info(format_args!("Object {} is not ready: {}", key, reason));
            }
            Readiness::Failed(reason) => {
                return Err(SyncError::Failed {
                    object: key.to_string(),
                    reason: reason.clone(),
                });
            }
        }
        verdicts.push(verdict);
    }

    Ok(aggregate(&verdicts))
}
