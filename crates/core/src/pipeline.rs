//! The sanitize pipeline: an ordered, fixed set of steps that strip
//! cluster-assigned state from a fetched object, or veto its export.

use serde_json::{Map, Value};

/// Annotations injected by kubectl/controllers that must not survive export.
const VOLATILE_ANNOTATIONS: [&str; 3] = [
    "kubectl.kubernetes.io/last-applied-configuration",
    "deployment.kubernetes.io/revision",
    "kubernetes.io/change-cause",
];

/// Metadata fields assigned by the cluster, meaningless on re-apply.
const ASSIGNED_METADATA: [&str; 6] = [
    "generation",
    "resourceVersion",
    "selfLink",
    "uid",
    "creationTimestamp",
    "managedFields",
];

/// Label the job controller pins to a runtime-generated value; a fresh Job
/// created from an exported manifest must not carry it.
const JOB_CONTROLLER_LABEL: &str = "controller-uid";

#[derive(Debug, thiserror::Error)]
pub enum SanitizeError {
    #[error("malformed object: {path} is not a mapping")]
    NotAMapping { path: &'static str },
}

/// Result of one step (or a whole pipeline run) over a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Keep(Value),
    /// The object must not be exported; later steps are not run and no file
    /// is ever written for it.
    Veto,
}

/// The closed set of sanitize steps, in their required order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Drop controller-owned objects before anything else touches them.
    SkipOwned,
    /// Strip cluster-assigned metadata, volatile annotations and status.
    Common,
    /// Job-only: unpin the controller-injected selector label.
    Job,
}

pub const DEFAULT_STEPS: &[Step] = &[Step::SkipOwned, Step::Common, Step::Job];

impl Step {
    pub fn process(self, doc: Value) -> Result<Outcome, SanitizeError> {
        match self {
            Step::SkipOwned => skip_owned(doc),
            Step::Common => sanitize_common(doc),
            Step::Job => sanitize_job(doc),
        }
    }
}

/// Run `steps` in order. The first veto or error wins.
pub fn run(steps: &[Step], doc: Value) -> Result<Outcome, SanitizeError> {
    let mut doc = doc;
    for step in steps {
        match step.process(doc)? {
            Outcome::Keep(next) => doc = next,
            Outcome::Veto => return Ok(Outcome::Veto),
        }
    }
    Ok(Outcome::Keep(doc))
}

/// Objects with owner references are lifecycle-managed by a controller;
/// exporting them standalone would conflict on re-apply.
fn skip_owned(doc: Value) -> Result<Outcome, SanitizeError> {
    let owned = doc
        .get("metadata")
        .and_then(|m| m.get("ownerReferences"))
        .and_then(Value::as_array)
        .is_some_and(|refs| !refs.is_empty());
    if owned {
        Ok(Outcome::Veto)
    } else {
        Ok(Outcome::Keep(doc))
    }
}

fn sanitize_common(mut doc: Value) -> Result<Outcome, SanitizeError> {
    strip_assigned_state(&mut doc)?;
    Ok(Outcome::Keep(doc))
}

fn strip_assigned_state(doc: &mut Value) -> Result<(), SanitizeError> {
    let root = doc
        .as_object_mut()
        .ok_or(SanitizeError::NotAMapping { path: "." })?;
    if let Some(meta) = root.get_mut("metadata") {
        let meta = meta
            .as_object_mut()
            .ok_or(SanitizeError::NotAMapping { path: "metadata" })?;
        for key in ASSIGNED_METADATA {
            meta.remove(key);
        }
        if let Some(annotations) = meta.get_mut("annotations").and_then(Value::as_object_mut) {
            for key in VOLATILE_ANNOTATIONS {
                annotations.remove(key);
            }
        }
        // An empty mapping would serialize as `annotations: {}` and churn
        // every re-export; render it as absent instead.
        if meta
            .get("annotations")
            .and_then(Value::as_object)
            .is_some_and(Map::is_empty)
        {
            meta.remove("annotations");
        }
    }
    root.remove("status");
    Ok(())
}

fn sanitize_job(mut doc: Value) -> Result<Outcome, SanitizeError> {
    if !is_batch_job(&doc) {
        return Ok(Outcome::Keep(doc));
    }
    strip_job_internals(&mut doc)?;
    Ok(Outcome::Keep(doc))
}

fn is_batch_job(doc: &Value) -> bool {
    let kind = doc.get("kind").and_then(Value::as_str);
    let group = doc
        .get("apiVersion")
        .and_then(Value::as_str)
        .and_then(|av| av.split_once('/'))
        .map(|(group, _)| group);
    kind == Some("Job") && group == Some("batch")
}

fn strip_job_internals(doc: &mut Value) -> Result<(), SanitizeError> {
    let root = doc
        .as_object_mut()
        .ok_or(SanitizeError::NotAMapping { path: "." })?;
    if let Some(spec) = root.get_mut("spec") {
        let spec = spec
            .as_object_mut()
            .ok_or(SanitizeError::NotAMapping { path: "spec" })?;
        if let Some(selector) = spec.get_mut("selector") {
            if !selector.is_object() {
                return Err(SanitizeError::NotAMapping { path: "spec.selector" });
            }
            remove_key(
                selector,
                "matchLabels",
                "spec.selector.matchLabels",
                JOB_CONTROLLER_LABEL,
            )?;
        }
        if let Some(meta) = spec.get_mut("template").and_then(|t| t.get_mut("metadata")) {
            remove_key(
                meta,
                "labels",
                "spec.template.metadata.labels",
                JOB_CONTROLLER_LABEL,
            )?;
        }
    }
    root.remove("status");
    Ok(())
}

/// Remove `key` from the string map at `parent[field]`, dropping the map
/// entirely when it ends up empty (the API's omitempty rendering).
fn remove_key(
    parent: &mut Value,
    field: &str,
    path: &'static str,
    key: &str,
) -> Result<(), SanitizeError> {
    let Some(parent_map) = parent.as_object_mut() else {
        return Ok(());
    };
    let Some(map) = parent_map.get_mut(field) else {
        return Ok(());
    };
    let entries = map
        .as_object_mut()
        .ok_or(SanitizeError::NotAMapping { path })?;
    entries.remove(key);
    if entries.is_empty() {
        parent_map.remove(field);
    }
    Ok(())
}
