use std::fmt::Write;
use thiserror::Error;

/// Formats an error and its entire source chain with each error on a new line
///
/// This produces output like:
/// ```text
/// Error message
///   Caused by: First cause
///   Caused by: Second cause
///   Caused by: Root cause
/// ```
pub fn format_error_chain(err: &dyn std::error::Error) -> String {
    let mut output = String::new();
    write!(&mut output, "{}", err).ok();

    let mut source = err.source();
    while let Some(err) = source {
        write!(&mut output, "\n  Caused by: {}", err).ok();
        source = err.source();
    }

    output
}

/// Errors raised by the cluster API transport
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Kubernetes error: {0}")]
    Kubernetes(#[from] kube::Error),

    #[error("GVK {gvk} not resolvable via discovery: {source}")]
    Discovery {
        gvk: String,
        #[source]
        source: kube::Error,
    },

    #[error("object is missing {0}")]
    MissingField(&'static str),

    #[error("failed parsing GVK: {0}")]
    InvalidGvk(String),

    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: String, name: String },

    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },

    #[error("conflict updating {kind} {name}")]
    Conflict { kind: String, name: String },
}

/// Errors raised while turning templates into objects
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to evaluate template {path}: {source}")]
    Template {
        path: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("failed to serialize render data: {0}")]
    Data(#[from] serde_json::Error),

    #[error("rendered manifest {path} is not valid YAML: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("rendered manifest {path} did not look like a Kubernetes object: {reason}")]
    NotAnObject { path: String, reason: String },
}

/// Errors raised while stamping controller references
#[derive(Error, Debug, PartialEq, Eq)]
pub enum OwnershipError {
    #[error("owner {0} has no UID")]
    OwnerWithoutUid(String),

    #[error("cross-namespace owner references are disallowed, owner's namespace {owner_namespace}, obj's namespace {object_namespace}")]
    CrossNamespace {
        owner_namespace: String,
        object_namespace: String,
    },

    #[error("cluster-scoped resource must not have a namespace-scoped owner, owner's namespace {0}")]
    NamespacedOwnerOfClusterObject(String),

    #[error("object {object} is already owned by another {kind} controller {name}")]
    AlreadyOwned {
        object: String,
        kind: String,
        name: String,
    },
}

/// Central error type for a state synchronization
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    #[error("unexpected state, catalog does not provide {0}")]
    MissingCapability(&'static str),

    #[error("failed to render objects")]
    Render(#[from] RenderError),

    #[error("no rendered objects found")]
    NothingRendered,

    #[error("no {0} object found")]
    MissingPrimary(&'static str),

    #[error("failed to set controller reference for object {object}")]
    Ownership {
        object: String,
        #[source]
        source: OwnershipError,
    },

    #[error("failed to create/update {object}")]
    Apply {
        object: String,
        #[source]
        source: ClusterError,
    },

    #[error("failed to get {object}")]
    Observe {
        object: String,
        #[source]
        source: ClusterError,
    },

    #[error("{0} not found after apply")]
    Vanished(String),

    #[error("{object} reported a failure: {reason}")]
    Failed { object: String, reason: String },

    #[error("failed to read manifest dir: {0}")]
    ManifestDir(#[source] std::io::Error),
}

/// Convenience type alias for Results using SyncError
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised while loading operator configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_chain_lists_every_cause() {
        let err = SyncError::Apply {
            object: "DaemonSet/nvidia-network-operator/sriov-dp".to_string(),
            source: ClusterError::Conflict {
                kind: "DaemonSet".to_string(),
                name: "sriov-dp".to_string(),
            },
        };

        let formatted = format_error_chain(&err);
        assert_eq!(
            formatted,
            "failed to create/update DaemonSet/nvidia-network-operator/sriov-dp\n  Caused by: conflict updating DaemonSet sriov-dp"
        );
    }

    #[test]
    fn single_error_has_no_cause_lines() {
        let formatted = format_error_chain(&SyncError::NothingRendered);
        assert_eq!(formatted, "no rendered objects found");
    }
}
