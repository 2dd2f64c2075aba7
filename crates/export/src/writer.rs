//! Output-root handling: the run-start cleanliness precondition and
//! per-object file writes.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use kubesnap_core::paths::ExportPath;

/// The prepared destination tree. Constructing one enforces the run-start
/// precondition: the root must not exist yet, be an empty directory, or be
/// force-cleared.
#[derive(Debug, Clone)]
pub struct OutputRoot {
    root: PathBuf,
}

impl OutputRoot {
    pub fn prepare(root: impl Into<PathBuf>, force: bool) -> Result<Self> {
        let root = root.into();
        match fs::metadata(&root) {
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("inspecting output dir {}", root.display()))
            }
            Ok(meta) if force => {
                let removed = if meta.is_dir() {
                    fs::remove_dir_all(&root)
                } else {
                    fs::remove_file(&root)
                };
                removed.with_context(|| format!("clearing output path {}", root.display()))?;
            }
            Ok(meta) if !meta.is_dir() => {
                bail!("output path {} is not a directory", root.display())
            }
            Ok(_) => {
                let mut entries = fs::read_dir(&root)
                    .with_context(|| format!("reading output dir {}", root.display()))?;
                if entries.next().is_some() {
                    bail!(
                        "output dir {} is not empty (pass --force to clear it)",
                        root.display()
                    );
                }
            }
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Write one serialized document, creating missing directories on the
    /// way. Overwrites unconditionally; the file handle is scope-bound and
    /// closed on every exit path before this returns.
    pub fn write(&self, dest: &ExportPath, extension: &str, bytes: &[u8]) -> Result<PathBuf> {
        let dir = self.root.join(&dest.dir);
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        let file = dir.join(format!("{}.{}", dest.file_stem, extension));
        fs::write(&file, bytes).with_context(|| format!("writing {}", file.display()))?;
        Ok(file)
    }
}
