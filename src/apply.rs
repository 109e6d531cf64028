//! Create-or-update of rendered objects and controller reference stamping.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::DynamicObject;
use kube::{Resource, ResourceExt};
use serde_json::Value;

use crate::cluster::{describe, ClusterClient, ObjectKey};
use crate::error::{ClusterError, OwnershipError, SyncError, SyncResult};
use crate::telemetry::SyncLog;

fn api_group(api_version: &str) -> &str {
    api_version
        .split_once('/')
        .map(|(group, _)| group)
        .unwrap_or("")
}

fn same_owner(a: &OwnerReference, b: &OwnerReference) -> bool {
    a.kind == b.kind && a.name == b.name && api_group(&a.api_version) == api_group(&b.api_version)
}

/// Make `owner` the managing controller of `obj`
///
/// A namespaced owner may only control objects in its own namespace. An object
/// that already has a different controller is left untouched and an error is
/// returned. Re-stamping the same owner is a no-op.
pub fn set_controller_reference<K>(
    owner: &K,
    obj: &mut DynamicObject,
) -> Result<(), OwnershipError>
where
    K: Resource<DynamicType = ()>,
{
    let owner_ref = owner
        .controller_owner_ref(&())
        .ok_or_else(|| OwnershipError::OwnerWithoutUid(owner.name_any()))?;

    if let Some(owner_ns) = owner.namespace() {
        match obj.namespace() {
            None => return Err(OwnershipError::NamespacedOwnerOfClusterObject(owner_ns)),
            Some(obj_ns) if obj_ns != owner_ns => {
                return Err(OwnershipError::CrossNamespace {
                    owner_namespace: owner_ns,
                    object_namespace: obj_ns,
                })
            }
            Some(_) => {}
        }
    }

    let object = describe(obj);
    let refs = obj.metadata.owner_references.get_or_insert_with(Vec::new);

    if let Some(existing) = refs
        .iter()
        .find(|r| r.controller == Some(true) && !same_owner(r, &owner_ref))
    {
        return Err(OwnershipError::AlreadyOwned {
            object,
            kind: existing.kind.clone(),
            name: existing.name.clone(),
        });
    }

    match refs.iter_mut().find(|r| same_owner(r, &owner_ref)) {
        Some(existing) => *existing = owner_ref,
        None => refs.push(owner_ref),
    }
    Ok(())
}

/// Recursively overlay `desired` onto `target`
///
/// Maps merge key by key. Lists of the same length merge element by element so
/// server defaults inside list items survive; a list of a different length is
/// replaced. Everything else takes the rendered value.
fn merge_value(target: &mut Value, desired: &Value) {
    match (target, desired) {
        (Value::Object(target), Value::Object(desired)) => {
            for (key, value) in desired {
                match target.get_mut(key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(desired)) if target.len() == desired.len() => {
            for (existing, value) in target.iter_mut().zip(desired) {
                merge_value(existing, value);
            }
        }
        (target, desired) => *target = desired.clone(),
    }
}

/// The object to write back when `desired` is applied over `live`
///
/// Fields the renderer does not produce (status, server defaults, foreign labels)
/// survive and rendered fields win. Owner references already on the live object
/// are kept, so the ownership hook run afterwards sees any existing controller.
pub fn merge_objects(live: &DynamicObject, desired: &DynamicObject) -> DynamicObject {
    let mut merged = live.clone();
    merged.types = desired.types.clone().or_else(|| live.types.clone());

    merge_value(&mut merged.data, &desired.data);

    if let Some(labels) = &desired.metadata.labels {
        merged
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .extend(labels.clone());
    }
    if let Some(annotations) = &desired.metadata.annotations {
        merged
            .metadata
            .annotations
            .get_or_insert_with(Default::default)
            .extend(annotations.clone());
    }
    if let Some(desired_refs) = &desired.metadata.owner_references {
        let refs = merged.metadata.owner_references.get_or_insert_with(Vec::new);
        for desired_ref in desired_refs {
            match refs.iter_mut().find(|r| r.uid == desired_ref.uid) {
                Some(existing) => *existing = desired_ref.clone(),
                None => refs.push(desired_ref.clone()),
            }
        }
    }

    merged
}

fn same_object(a: &DynamicObject, b: &DynamicObject) -> bool {
    match (serde_json::to_value(a), serde_json::to_value(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn apply_error(obj: &DynamicObject, source: ClusterError) -> SyncError {
    SyncError::Apply {
        object: describe(obj),
        source,
    }
}

async fn update_from_live<F>(
    client: &dyn ClusterClient,
    log: &SyncLog,
    mutate: &mut F,
    key: &ObjectKey,
    live: &DynamicObject,
    obj: &DynamicObject,
) -> SyncResult<()>
where
    F: FnMut(&mut DynamicObject) -> SyncResult<()>,
{
    let mut merged = merge_objects(live, obj);
    mutate(&mut merged)?;
    if same_object(&merged, live) {
        log.debug(format_args!("Object {} unchanged", key));
        return Ok(());
    }
    client
        .update(&merged)
        .await
        .map_err(|e| apply_error(obj, e))?;
    log.info(format_args!("Object updated {}", key));
    Ok(())
}

async fn create_or_update_obj<F>(
    client: &dyn ClusterClient,
    log: &SyncLog,
    mutate: &mut F,
    obj: &DynamicObject,
) -> SyncResult<()>
where
    F: FnMut(&mut DynamicObject) -> SyncResult<()>,
{
    let key = ObjectKey::from_object(obj).map_err(|e| apply_error(obj, e))?;

    if let Some(live) = client.get(&key).await.map_err(|e| apply_error(obj, e))? {
        return update_from_live(client, log, mutate, &key, &live, obj).await;
    }

    let mut created = obj.clone();
    mutate(&mut created)?;
    match client.create(&created).await {
        Ok(_) => {
            log.info(format_args!("Object created {}", key));
            Ok(())
        }
        Err(ClusterError::AlreadyExists { .. }) => {
            // lost a race with another writer, fall back to updating what it created
            let live = client
                .get(&key)
                .await
                .map_err(|e| apply_error(obj, e))?
                .ok_or_else(|| {
                    apply_error(
                        obj,
                        ClusterError::NotFound {
                            kind: key.kind.clone(),
                            name: key.name.clone(),
                        },
                    )
                })?;
            update_from_live(client, log, mutate, &key, &live, obj).await
        }
        Err(e) => Err(apply_error(obj, e)),
    }
}

/// Apply `objs` in order, running `mutate` on each one just before it is written
///
/// For an object that already exists, `mutate` runs on the merge of the live and
/// the rendered object, so it sees the live owner references. Stops at the
/// first failure. Every step is idempotent, so a retry simply re-applies the
/// full rendered set.
pub async fn create_or_update_objs<F>(
    client: &dyn ClusterClient,
    log: &SyncLog,
    mut mutate: F,
    objs: &[DynamicObject],
) -> SyncResult<()>
where
    F: FnMut(&mut DynamicObject) -> SyncResult<()>,
{
    for obj in objs {
        create_or_update_obj(client, log, &mut mutate, obj).await?;
    }
    Ok(())
}
