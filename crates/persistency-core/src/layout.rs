//! Snapshot of an existing layer directory against the canonical domains.
//!
//! Extra directories are classified as referenced when their name occurs
//! anywhere in the bootstrap document. This is plain substring containment:
//! a directory called `a` matches almost any prose. The result only feeds the
//! migration brief, which a human or agent reviews.

use crate::error::{PersistencyError, Result};
use crate::paths;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LayoutAnalysis {
    /// Whether the layer directory existed when analysed.
    pub exists: bool,
    /// Every visible top-level directory, sorted.
    pub directories: Vec<String>,
    /// Canonical domains present on disk, in canonical order.
    pub canonical: Vec<String>,
    /// Canonical domains absent from disk, in canonical order.
    pub missing_canonical: Vec<String>,
    /// Non-canonical directories, sorted.
    pub extras: Vec<String>,
    pub referenced_extras: Vec<String>,
    pub unreferenced_extras: Vec<String>,
    /// Whether a bootstrap document was found and read.
    pub bootstrap_found: bool,
}

impl LayoutAnalysis {
    /// Analysis of a layer that does not exist yet.
    pub fn absent() -> Self {
        Self {
            missing_canonical: paths::CANONICAL_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            ..Default::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.missing_canonical.is_empty() && self.extras.is_empty()
    }
}

fn is_ignored(name: &str) -> bool {
    name.starts_with('.') || paths::IGNORED_DIRS.contains(&name)
}

/// Classify the immediate subdirectories of `layer`.
pub fn analyze(layer: &Path) -> Result<LayoutAnalysis> {
    if !layer.is_dir() {
        return Ok(LayoutAnalysis::absent());
    }

    let mut directories = Vec::new();
    let entries = std::fs::read_dir(layer).map_err(|e| PersistencyError::at(layer, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| PersistencyError::at(layer, e))?;
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_ignored(&name) {
            directories.push(name);
        }
    }
    directories.sort();

    let bootstrap_path = paths::bootstrap_path(layer);
    let bootstrap = match std::fs::read_to_string(&bootstrap_path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(PersistencyError::at(bootstrap_path, e)),
    };

    let (canonical, missing_canonical): (Vec<String>, Vec<String>) = paths::CANONICAL_DOMAINS
        .iter()
        .map(|d| d.to_string())
        .partition(|d| directories.contains(d));

    let extras: Vec<String> = directories
        .iter()
        .filter(|d| !paths::CANONICAL_DOMAINS.contains(&d.as_str()))
        .cloned()
        .collect();

    let text = bootstrap.as_deref().unwrap_or("");
    let (referenced_extras, unreferenced_extras): (Vec<String>, Vec<String>) = extras
        .iter()
        .cloned()
        .partition(|d| text.contains(d.as_str()));

    Ok(LayoutAnalysis {
        exists: true,
        directories,
        canonical,
        missing_canonical,
        extras,
        referenced_extras,
        unreferenced_extras,
        bootstrap_found: bootstrap.is_some(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
