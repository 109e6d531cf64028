//! Manifest renderer
//!
//! Turns a render-data value plus a fixed set of template files into the ordered
//! list of objects they describe. Templates use minijinja syntax and are
//! evaluated with the render data as the root context, so a template refers to
//! `{{ RuntimeSpec.Namespace }}` directly. A single file may hold several YAML
//! documents; files are processed in the order given.

use std::path::PathBuf;

use kube::api::DynamicObject;
use minijinja::{Environment, UndefinedBehavior};
use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// File extensions picked up from a manifest directory
pub const MANIFEST_FILE_SUFFIX: &[&str] = &["yaml", "yml", "json"];

/// Wrapper handed to the renderer
#[derive(Debug)]
pub struct TemplatingData<'a, T: Serialize> {
    pub data: &'a T,
}

impl<'a, T: Serialize> TemplatingData<'a, T> {
    pub fn new(data: &'a T) -> Self {
        Self { data }
    }
}

pub struct Renderer {
    files: Vec<PathBuf>,
    env: Environment<'static>,
}

impl Renderer {
    pub fn new(files: Vec<PathBuf>) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self { files, env }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Render every template file and parse the result into objects
    pub fn render_objects<T: Serialize>(
        &self,
        data: &TemplatingData<'_, T>,
    ) -> Result<Vec<DynamicObject>, RenderError> {
        let ctx = minijinja::Value::from_serialize(data.data);
        let mut objs = Vec::new();

        for file in &self.files {
            let path = file.display().to_string();
            let source = std::fs::read_to_string(file).map_err(|source| RenderError::Io {
                path: path.clone(),
                source,
            })?;
            let rendered = self
                .env
                .render_str(&source, &ctx)
                .map_err(|source| RenderError::Template {
                    path: path.clone(),
                    source,
                })?;
            objs.extend(parse_objects(&path, &rendered)?);
        }

        Ok(objs)
    }
}

/// Split a rendered manifest into its documents and convert each into an object.
/// Documents that render to nothing (e.g. a fully conditional template) are skipped.
fn parse_objects(path: &str, rendered: &str) -> Result<Vec<DynamicObject>, RenderError> {
    let mut objs = Vec::new();

    for document in serde_yaml::Deserializer::from_str(rendered) {
        let value =
            serde_json::Value::deserialize(document).map_err(|source| RenderError::Yaml {
                path: path.to_string(),
                source,
            })?;
        if value.is_null() {
            continue;
        }

        let not_an_object = |reason: &str| RenderError::NotAnObject {
            path: path.to_string(),
            reason: reason.to_string(),
        };
        if !value.is_object() {
            return Err(not_an_object("document is not a mapping"));
        }
        for field in ["apiVersion", "kind"] {
            if !value.get(field).is_some_and(|v| v.is_string()) {
                return Err(not_an_object(&format!("missing {}", field)));
            }
        }
        if !value
            .pointer("/metadata/name")
            .is_some_and(|v| v.as_str().is_some_and(|s| !s.is_empty()))
        {
            return Err(not_an_object("missing metadata.name"));
        }

        let obj: DynamicObject = serde_json::from_value(value)
            .map_err(|e| not_an_object(&format!("unexpected shape: {}", e)))?;
        objs.push(obj);
    }

    Ok(objs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use indoc::indoc;
    use kube::ResourceExt;

    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct Data {
        name: String,
        namespace: String,
        with_config: bool,
    }

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn data(with_config: bool) -> Data {
        Data {
            name: "net1".to_string(),
            namespace: "nvidia-network-operator".to_string(),
            with_config,
        }
    }

    #[test]
    fn renders_documents_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = write(
            &dir,
            "0010-sa.yaml",
            indoc! {"
                apiVersion: v1
                kind: ServiceAccount
                metadata:
                  name: {{ Name }}
                  namespace: {{ Namespace }}
                ---
                {% if WithConfig %}
                apiVersion: v1
                kind: ConfigMap
                metadata:
                  name: {{ Name }}-config
                  namespace: {{ Namespace }}
                {% endif %}
            "},
        );
        let second = write(
            &dir,
            "0020-ds.yaml",
            indoc! {"
                apiVersion: apps/v1
                kind: DaemonSet
                metadata:
                  name: {{ Name }}-ds
                  namespace: {{ Namespace }}
                spec:
                  template: {}
            "},
        );
        let renderer = Renderer::new(vec![first, second]);

        let objs = renderer.render_objects(&TemplatingData::new(&data(true))).unwrap();
        let kinds: Vec<_> = objs
            .iter()
            .map(|o| o.types.as_ref().unwrap().kind.clone())
            .collect();
        assert_eq!(kinds, vec!["ServiceAccount", "ConfigMap", "DaemonSet"]);
        assert_eq!(objs[2].name_any(), "net1-ds");
        assert_eq!(objs[2].namespace().as_deref(), Some("nvidia-network-operator"));
        assert_eq!(objs[2].data["spec"]["template"], serde_json::json!({}));

        let objs = renderer.render_objects(&TemplatingData::new(&data(false))).unwrap();
        assert_eq!(objs.len(), 2);
    }

    #[test]
    fn no_files_render_nothing() {
        let renderer = Renderer::new(vec![]);
        let objs = renderer.render_objects(&TemplatingData::new(&data(true))).unwrap();
        assert!(objs.is_empty());
    }

    #[test]
    fn undefined_variables_fail() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(&dir, "bad.yaml", "kind: {{ Missing.Field }}\n");
        let renderer = Renderer::new(vec![file]);

        let err = renderer
            .render_objects(&TemplatingData::new(&data(true)))
            .unwrap_err();
        assert!(matches!(err, RenderError::Template { .. }));
    }

    #[test]
    fn documents_without_kind_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(
            &dir,
            "nokind.yaml",
            "apiVersion: v1\nmetadata:\n  name: {{ Name }}\n",
        );
        let renderer = Renderer::new(vec![file]);

        let err = renderer
            .render_objects(&TemplatingData::new(&data(true)))
            .unwrap_err();
        assert!(matches!(err, RenderError::NotAnObject { .. }));
    }

    #[test]
    fn json_manifests_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(
            &dir,
            "cm.json",
            r#"{"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "{{ Name }}"}}"#,
        );
        let renderer = Renderer::new(vec![file]);

        let objs = renderer.render_objects(&TemplatingData::new(&data(true))).unwrap();
        assert_eq!(objs.len(), 1);
        assert_eq!(objs[0].name_any(), "net1");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let renderer = Renderer::new(vec![PathBuf::from("/nonexistent/manifest.yaml")]);
        let err = renderer
            .render_objects(&TemplatingData::new(&data(true)))
            .unwrap_err();
        assert!(matches!(err, RenderError::Io { .. }));
    }
}
