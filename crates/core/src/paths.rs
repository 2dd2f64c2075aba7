//! Destination layout for exported objects.

use std::path::PathBuf;

use serde_json::Value;

use crate::TypeRef;

/// Label that groups namespaced objects under a per-application directory.
pub const APP_LABEL: &str = "app";

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("{kind} object has no metadata.name")]
    MissingName { kind: String },
}

/// Relative destination of one exported object, under the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPath {
    pub dir: PathBuf,
    pub file_stem: String,
}

/// Map an object to its destination directory and file stem.
///
/// Cluster-scoped objects and namespaced objects without an `app` label go
/// in a flat `<plural>/` directory; objects labelled with an application
/// are grouped under `projects/<app>/<plural>/`. Ownership-based skipping
/// is the pipeline's job, never this function's.
pub fn resolve(type_ref: &TypeRef, doc: &Value) -> Result<ExportPath, PathError> {
    let meta = doc.get("metadata");
    let name = meta
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| PathError::MissingName {
            kind: type_ref.kind.clone(),
        })?;
    let namespace = meta
        .and_then(|m| m.get("namespace"))
        .and_then(Value::as_str)
        .unwrap_or("");
    let app = meta
        .and_then(|m| m.get("labels"))
        .and_then(|l| l.get(APP_LABEL))
        .and_then(Value::as_str)
        .unwrap_or("");

    let dir = if namespace.is_empty() || app.is_empty() {
        PathBuf::from(&type_ref.plural)
    } else {
        ["projects", app, type_ref.plural.as_str()].iter().collect()
    };
    Ok(ExportPath {
        dir,
        file_stem: name.to_string(),
    })
}
