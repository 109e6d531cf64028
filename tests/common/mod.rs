#![allow(dead_code, clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::{DynamicObject, ObjectMeta};
use log::{Level, Log, Metadata, Record};

use network_state_sync::cluster::{ClusterClient, ObjectKey};
use network_state_sync::consts::{NODE_LABEL_CPU_ARCH, NODE_LABEL_MLNX_NIC, NODE_LABEL_OS_NAME};
use network_state_sync::error::ClusterError;
use network_state_sync::nodeinfo::NodeSnapshotProvider;
use network_state_sync::state::InfoCatalog;
use network_state_sync::telemetry::SyncLog;

/// In-memory API server holding objects by key
#[derive(Default)]
pub struct FakeCluster {
    objects: Mutex<BTreeMap<ObjectKey, DynamicObject>>,
    next_version: AtomicUsize,
    pub gets: AtomicUsize,
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
    fail_writes: Mutex<Option<ClusterError>>,
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
            + self.creates.load(Ordering::SeqCst)
            + self.updates.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Every create and update fails with a conflict until cleared
    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail.then(|| ClusterError::Conflict {
            kind: "any".to_string(),
            name: "any".to_string(),
        });
    }

    pub fn objects(&self) -> Vec<DynamicObject> {
        self.objects.lock().unwrap().values().cloned().collect()
    }

    pub fn objects_of_kind(&self, kind: &str) -> Vec<DynamicObject> {
        self.objects()
            .into_iter()
            .filter(|o| o.types.as_ref().is_some_and(|t| t.kind == kind))
            .collect()
    }

    /// Store an object as if someone else had created it
    pub fn insert(&self, mut obj: DynamicObject) {
        let key = ObjectKey::from_object(&obj).unwrap();
        obj.metadata.uid = Some(format!("uid-{}", key.name));
        self.bump_version(&mut obj);
        self.objects.lock().unwrap().insert(key, obj);
    }

    /// Change a stored object in place, the way the API server or another client would
    pub fn edit(&self, kind: &str, name: &str, f: impl FnOnce(&mut DynamicObject)) {
        let mut objects = self.objects.lock().unwrap();
        let obj = objects
            .iter_mut()
            .find(|(key, _)| key.kind == kind && key.name == name)
            .map(|(_, obj)| obj)
            .unwrap();
        f(obj);
    }

    /// Play the part of the workload controller and report a status
    pub fn set_status(&self, kind: &str, name: &str, status: serde_json::Value) {
        self.edit(kind, name, |obj| obj.data["status"] = status);
    }

    fn bump_version(&self, obj: &mut DynamicObject) {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        obj.metadata.resource_version = Some(version.to_string());
    }

    fn write_failure(&self) -> Result<(), ClusterError> {
        match self.fail_writes.lock().unwrap().as_ref() {
            Some(ClusterError::Conflict { kind, name }) => Err(ClusterError::Conflict {
                kind: kind.clone(),
                name: name.clone(),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>, ClusterError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.objects.lock().unwrap().get(key).cloned())
    }

    async fn create(&self, obj: &DynamicObject) -> Result<DynamicObject, ClusterError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.write_failure()?;

        let key = ObjectKey::from_object(obj)?;
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&key) {
            return Err(ClusterError::AlreadyExists {
                kind: key.kind,
                name: key.name,
            });
        }

        let mut created = obj.clone();
        created.metadata.uid = Some(format!("uid-{}", key.name));
        self.bump_version(&mut created);
        objects.insert(key, created.clone());
        Ok(created)
    }

    async fn update(&self, obj: &DynamicObject) -> Result<DynamicObject, ClusterError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.write_failure()?;

        let key = ObjectKey::from_object(obj)?;
        let mut objects = self.objects.lock().unwrap();
        let Some(live) = objects.get(&key) else {
            return Err(ClusterError::NotFound {
                kind: key.kind,
                name: key.name,
            });
        };
        if live.metadata.resource_version != obj.metadata.resource_version {
            return Err(ClusterError::Conflict {
                kind: key.kind,
                name: key.name,
            });
        }

        let mut updated = obj.clone();
        self.bump_version(&mut updated);
        objects.insert(key, updated.clone());
        Ok(updated)
    }
}

/// Logger keeping every line for assertions
#[derive(Default)]
pub struct Recorder {
    lines: Mutex<Vec<(Level, String)>>,
}

impl Recorder {
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .any(|(l, line)| *l == level && line.contains(needle))
    }
}

impl Log for Recorder {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.lines
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

pub fn recording_log() -> (Arc<Recorder>, SyncLog) {
    let recorder = Arc::new(Recorder::default());
    let log = SyncLog::new(recorder.clone(), "test");
    (recorder, log)
}

pub fn manifests_dir(state: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("manifests")
        .join(state)
}

pub fn nic_node(name: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(
                [
                    (NODE_LABEL_MLNX_NIC, "true"),
                    (NODE_LABEL_OS_NAME, "ubuntu"),
                    (NODE_LABEL_CPU_ARCH, "amd64"),
                ]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn catalog_with_nodes(nodes: Vec<Node>) -> InfoCatalog {
    InfoCatalog::new().with_node_info_provider(Arc::new(NodeSnapshotProvider::new(nodes)))
}
