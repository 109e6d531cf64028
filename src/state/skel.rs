//! The sync skeleton shared by every manifest-driven state.
//!
//! A concrete state only supplies a [`RenderDataBuilder`]; rendering, applying,
//! ownership and readiness are handled here once.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use kube::api::DynamicObject;
use kube::{Resource, ResourceExt};
use serde::Serialize;

use super::{InfoCatalog, State, SyncFailure, SyncState, WatchSources};
use crate::apply::{create_or_update_objs, set_controller_reference};
use crate::cluster::{describe, ClusterClient, ObjectKey};
use crate::error::{SyncError, SyncResult};
use crate::render::{Renderer, TemplatingData, MANIFEST_FILE_SUFFIX};
use crate::status::{get_sync_state, ReadinessRegistry};
use crate::telemetry::SyncLog;
use crate::utils::get_files_with_suffix;

/// What a builder decided for this sync
#[derive(Debug)]
pub enum BuildOutcome<D> {
    Render(D),
    /// The resource does not request this state
    NotApplicable,
    /// Preconditions are not met yet; nothing is rendered
    NothingToRender,
}

/// Per-state customization of the sync skeleton
///
/// `build` must be a pure function of the resource and the catalog.
pub trait RenderDataBuilder: Send + Sync {
    type Resource: Resource<DynamicType = ()> + Send + Sync;
    type Data: Serialize + fmt::Debug + Send + Sync;

    fn build(
        &self,
        cr: &Self::Resource,
        catalog: &InfoCatalog,
        log: &SyncLog,
    ) -> SyncResult<BuildOutcome<Self::Data>>;

    /// Verdict when the templates render to no objects at all
    fn empty_render_verdict(&self) -> SyncState {
        SyncState::NotReady
    }

    /// Kind that must come first in the rendered set, if any
    fn primary_kind(&self) -> Option<&'static str> {
        None
    }

    fn watch_sources(&self) -> WatchSources;
}

pub struct ManifestState<B: RenderDataBuilder> {
    name: String,
    description: String,
    client: Arc<dyn ClusterClient>,
    renderer: Renderer,
    readiness: ReadinessRegistry,
    watch_sources: WatchSources,
    builder: B,
    log: SyncLog,
}

impl<B: RenderDataBuilder> ManifestState<B> {
    /// Create a state rendering the templates found in `manifest_dir`
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        client: Arc<dyn ClusterClient>,
        manifest_dir: &Path,
        builder: B,
        log: &SyncLog,
    ) -> SyncResult<Self> {
        let files = get_files_with_suffix(manifest_dir, MANIFEST_FILE_SUFFIX)
            .map_err(SyncError::ManifestDir)?;
        let name = name.into();
        let watch_sources = builder.watch_sources();
        let renderer = Renderer::new(files);
        log.debug(format_args!(
            "State {} loaded {} manifest files from {}",
            name,
            renderer.files().len(),
            manifest_dir.display()
        ));

        Ok(Self {
            log: log.scoped(name.clone()),
            name,
            description: description.into(),
            client,
            renderer,
            readiness: ReadinessRegistry::default(),
            watch_sources,
            builder,
        })
    }

    pub fn with_readiness(mut self, readiness: ReadinessRegistry) -> Self {
        self.readiness = readiness;
        self
    }

    fn render(&self, data: &B::Data) -> SyncResult<Vec<DynamicObject>> {
        self.log
            .debug(format_args!("Rendering objects data: {:?}", data));
        let objs = self.renderer.render_objects(&TemplatingData::new(data))?;
        self.log.debug(format_args!(
            "Rendered objects: {}",
            itertools::join(objs.iter().map(describe), ", ")
        ));
        Ok(objs)
    }

    async fn read_back(&self, obj: &DynamicObject) -> SyncResult<DynamicObject> {
        let key = ObjectKey::from_object(obj).map_err(|source| SyncError::Observe {
            object: describe(obj),
            source,
        })?;
        self.client
            .get(&key)
            .await
            .map_err(|source| SyncError::Observe {
                object: key.to_string(),
                source,
            })?
            .ok_or_else(|| SyncError::Vanished(key.to_string()))
    }
}

#[async_trait]
impl<B: RenderDataBuilder> State<B::Resource> for ManifestState<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn sync(
        &self,
        cr: &B::Resource,
        catalog: &InfoCatalog,
    ) -> Result<SyncState, SyncFailure> {
        self.log.info(format_args!(
            "Sync Custom resource State: {} Name: {} Namespace: {}",
            self.name,
            cr.name_any(),
            cr.namespace().unwrap_or_default()
        ));

        let data = match self
            .builder
            .build(cr, catalog, &self.log)
            .map_err(SyncFailure::error)?
        {
            BuildOutcome::Render(data) => data,
            BuildOutcome::NotApplicable => return Ok(SyncState::Ignore),
            BuildOutcome::NothingToRender => return Ok(SyncState::NotReady),
        };

        let objs = self.render(&data).map_err(SyncFailure::error)?;
        if objs.is_empty() {
            return match self.builder.empty_render_verdict() {
                SyncState::Error => Err(SyncFailure::error(SyncError::NothingRendered)),
                verdict => Ok(verdict),
            };
        }

        if let Some(kind) = self.builder.primary_kind() {
            let first_kind = objs[0].types.as_ref().map(|t| t.kind.as_str());
            if first_kind != Some(kind) {
                return Err(SyncFailure::error(SyncError::MissingPrimary(kind)));
            }
        }

        // Create objects if they dont exist, Update objects if they do exist
        create_or_update_objs(
            self.client.as_ref(),
            &self.log,
            |obj| {
                set_controller_reference(cr, obj).map_err(|source| SyncError::Ownership {
                    object: describe(obj),
                    source,
                })
            },
            &objs,
        )
        .await
        .map_err(SyncFailure::not_ready)?;

        let state = get_sync_state(self.client.as_ref(), &self.readiness, &self.log, &objs)
            .await
            .map_err(SyncFailure::error)?;

        if self.builder.primary_kind().is_some() {
            let primary = self.read_back(&objs[0]).await.map_err(SyncFailure::error)?;
            self.log.debug(format_args!(
                "Primary object {} has uid {}",
                describe(&primary),
                primary.uid().unwrap_or_default()
            ));
        }

        Ok(state)
    }

    fn watch_sources(&self) -> &WatchSources {
        &self.watch_sources
    }
}
