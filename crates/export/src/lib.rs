//! kubesnap export engine: drives discovery, listing, the sanitize
//! pipeline and the output writer for one full snapshot run.

#![forbid(unsafe_code)]

mod writer;

pub use writer::OutputRoot;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use metrics::counter;
use serde_json::Value;
use tracing::{debug, info, warn};

use kubesnap_core::{paths, pipeline, TypeRef};
use kubesnap_kubehub as kubehub;

/// Serialization format for exported documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Yaml => "yaml",
            OutputFormat::Json => "json",
        }
    }

    pub fn serialize(self, doc: &Value) -> Result<Vec<u8>> {
        match self {
            OutputFormat::Yaml => Ok(serde_yaml::to_string(doc)
                .context("rendering YAML")?
                .into_bytes()),
            OutputFormat::Json => {
                let mut buf = serde_json::to_vec_pretty(doc).context("rendering JSON")?;
                buf.push(b'\n');
                Ok(buf)
            }
        }
    }
}

/// One run's complete configuration; threaded through immutably.
#[derive(Debug, Clone, Default)]
pub struct ExportConfig {
    pub context: Option<String>,
    pub cluster: Option<String>,
    pub namespace: Option<String>,
    pub output_dir: PathBuf,
    pub force: bool,
    pub format: OutputFormat,
    /// Plural names never exported when discovery picks the type set.
    pub exclude: Vec<String>,
    /// Explicit resource types; empty means discover.
    pub resource_types: Vec<String>,
    /// Keep going past failed resource types and unprocessable objects
    /// instead of aborting; everything skipped ends up in the summary.
    pub keep_going: bool,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub exported: usize,
    pub vetoed: usize,
    pub failed_types: Vec<String>,
    pub skipped_objects: Vec<String>,
}

impl RunSummary {
    pub fn clean(&self) -> bool {
        self.failed_types.is_empty() && self.skipped_objects.is_empty()
    }
}

/// Execute one full export run.
///
/// Fail-fast by default: the first error aborts, and files already written
/// stay on disk. With `keep_going`, listing and sanitize failures are
/// recorded and the run continues; path resolution and I/O failures stay
/// fatal either way.
pub async fn run(cfg: &ExportConfig) -> Result<RunSummary> {
    // Output-root precondition comes before any cluster traffic.
    let root = OutputRoot::prepare(&cfg.output_dir, cfg.force)?;

    let session = kubehub::Session::connect(
        cfg.context.as_deref(),
        cfg.cluster.as_deref(),
        cfg.namespace.as_deref(),
    )
    .await?;

    let catalog = kubehub::discover_catalog(session.client()).await?;
    let types = if cfg.resource_types.is_empty() {
        kubehub::select_exportable(&catalog, &cfg.exclude)
    } else {
        kubehub::resolve_names(&catalog, &cfg.resource_types)?
    };
    if types.is_empty() {
        bail!("no exportable resource types resolved");
    }

    info!(
        context = %session.context,
        cluster = %session.cluster,
        namespace = ?session.namespace,
        types = types.len(),
        dir = %root.path().display(),
        "starting export"
    );

    let mut summary = RunSummary::default();
    for type_ref in &types {
        let objects = match kubehub::list_objects(
            session.client(),
            type_ref,
            session.namespace.as_deref(),
        )
        .await
        {
            Ok(objects) => objects,
            Err(e) if cfg.keep_going => {
                warn!(resource = %type_ref.plural, error = ?e, "listing failed; continuing");
                counter!("export_types_failed_total", 1u64);
                summary.failed_types.push(type_ref.plural.clone());
                continue;
            }
            Err(e) => return Err(e),
        };
        info!(resource = %type_ref.plural, objects = objects.len(), "visiting objects");
        for doc in objects {
            export_object(&root, cfg, type_ref, doc, &mut summary)?;
        }
    }

    info!(
        exported = summary.exported,
        vetoed = summary.vetoed,
        failed_types = summary.failed_types.len(),
        skipped = summary.skipped_objects.len(),
        "export complete"
    );
    Ok(summary)
}

fn export_object(
    root: &OutputRoot,
    cfg: &ExportConfig,
    type_ref: &TypeRef,
    doc: Value,
    summary: &mut RunSummary,
) -> Result<()> {
    let name = object_name(&doc);
    let kept = match pipeline::run(pipeline::DEFAULT_STEPS, doc) {
        Ok(pipeline::Outcome::Keep(doc)) => doc,
        Ok(pipeline::Outcome::Veto) => {
            debug!(resource = %type_ref.plural, name = %name, "controller-owned; not exported");
            counter!("export_vetoed_total", 1u64);
            summary.vetoed += 1;
            return Ok(());
        }
        Err(e) if cfg.keep_going => {
            warn!(
                resource = %type_ref.plural,
                name = %name,
                error = %e,
                "sanitize failed; object skipped"
            );
            summary
                .skipped_objects
                .push(format!("{}/{}", type_ref.plural, name));
            return Ok(());
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("sanitizing {} {:?}", type_ref.plural, name))
        }
    };
    let dest = paths::resolve(type_ref, &kept)
        .with_context(|| format!("resolving path for {} {:?}", type_ref.plural, name))?;
    let bytes = cfg.format.serialize(&kept)?;
    let file = root.write(&dest, cfg.format.extension(), &bytes)?;
    debug!(file = %file.display(), "exported");
    counter!("export_objects_total", 1u64);
    summary.exported += 1;
    Ok(())
}

fn object_name(doc: &Value) -> String {
    doc.get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
        .to_string()
}
