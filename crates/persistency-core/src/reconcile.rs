//! File materialisation primitives used by the run engine.
//!
//! Every write follows one [`Discipline`]. Best-effort operations (legacy
//! import, asset copy) return a [`Warning`] instead of an error so the run
//! continues.

use crate::error::{PersistencyError, Result};
use crate::io;
use crate::paths;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Write disciplines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    /// Create if absent; overwrite only when `force` is set.
    Conditional { force: bool },
    /// Create if absent; never overwrite.
    CreateOnce,
    /// Always overwrite.
    Unconditional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    Created,
    Skipped,
    Updated,
}

impl fmt::Display for WriteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Skipped => "exists",
            Self::Updated => "updated",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    /// Path relative to the project root, forward slashes.
    pub path: String,
    pub status: WriteStatus,
}

/// Materialise `content` at `root/rel` under `discipline`.
pub fn write_artifact(
    root: &Path,
    rel: &str,
    content: &str,
    discipline: Discipline,
) -> Result<WriteOutcome> {
    let path = root.join(rel);
    let existed = path.exists();
    let status = match (existed, discipline) {
        (false, _) => WriteStatus::Created,
        (true, Discipline::Conditional { force: false }) | (true, Discipline::CreateOnce) => {
            WriteStatus::Skipped
        }
        (true, Discipline::Conditional { force: true }) | (true, Discipline::Unconditional) => {
            WriteStatus::Updated
        }
    };
    if status != WriteStatus::Skipped {
        io::atomic_write(&path, content.as_bytes())?;
    }
    tracing::debug!(path = %rel, status = %status, "artifact");
    Ok(WriteOutcome {
        path: rel.to_string(),
        status,
    })
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    AssetMissing,
    AssetCopyFailed,
    LegacyMissing,
    LegacyCopyFailed,
    VcsUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    /// The path or parameter the warning is about.
    pub subject: String,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        let warning = Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        };
        tracing::warn!(kind = ?warning.kind, subject = %warning.subject, "{}", warning.message);
        warning
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}

/// Outcome of a best-effort step.
pub type Degradable<T> = std::result::Result<T, Warning>;

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

pub fn stamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

static STAMP_RE: OnceLock<Regex> = OnceLock::new();

fn stamp_re() -> &'static Regex {
    STAMP_RE.get_or_init(|| Regex::new(r"^\d{8}T\d{6}Z(-\d+)?$").unwrap())
}

/// Timestamp-named directories already staged under `<layer>/ai-meta/legacy/`,
/// as project-relative paths in chronological order.
pub fn staged_imports(root: &Path, layer: &Path) -> Result<Vec<String>> {
    let dir = paths::legacy_dir(layer);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in std::fs::read_dir(&dir).map_err(|e| PersistencyError::at(&dir, e))? {
        let entry = entry.map_err(|e| PersistencyError::at(&dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.path().is_dir() && stamp_re().is_match(&name) {
            found.push(paths::display_rel(root, &entry.path()));
        }
    }
    found.sort();
    Ok(found)
}

// ---------------------------------------------------------------------------
// Backup
// ---------------------------------------------------------------------------

/// Copy the whole layer to a timestamped sibling `<layer>.backup-<stamp>`.
/// Returns `None` when there is no layer to back up.
pub fn backup_layer(layer: &Path, now: DateTime<Utc>) -> Result<Option<PathBuf>> {
    if !layer.is_dir() {
        return Ok(None);
    }
    let name = layer
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| paths::DEFAULT_LAYER_DIR.to_string());
    let parent = layer.parent().unwrap_or(Path::new("."));
    let target = io::unique_dir(parent, &format!("{name}.backup-{}", stamp(now)));
    io::copy_tree(layer, &target).map_err(|source| PersistencyError::BackupFailed {
        path: layer.to_path_buf(),
        source: Box::new(source),
    })?;
    tracing::info!(from = %layer.display(), to = %target.display(), "layer backed up");
    Ok(Some(target))
}

// ---------------------------------------------------------------------------
// Legacy import
// ---------------------------------------------------------------------------

/// Stage `source` under `<layer>/ai-meta/legacy/<stamp>/`. Returns the staged
/// directory relative to `root`.
pub fn stage_legacy(
    root: &Path,
    layer: &Path,
    source: &Path,
    now: DateTime<Utc>,
) -> Degradable<String> {
    let subject = paths::display_rel(root, source);
    if !source.exists() {
        return Err(Warning::new(
            WarningKind::LegacyMissing,
            subject,
            "previous layer not found; nothing staged",
        ));
    }

    let legacy_root = paths::legacy_dir(layer);
    let target = io::unique_dir(&legacy_root, &stamp(now));
    let copied = if source.is_dir() {
        io::copy_tree_excluding(source, &target, Some(&legacy_root))
    } else {
        copy_file_into(source, &target)
    };

    match copied {
        Ok(files) => {
            tracing::info!(source = %source.display(), files, "legacy layer staged");
            Ok(paths::display_rel(root, &target))
        }
        Err(e) => {
            let _ = std::fs::remove_dir_all(&target);
            Err(Warning::new(
                WarningKind::LegacyCopyFailed,
                subject,
                format!("staging failed: {e}"),
            ))
        }
    }
}

fn copy_file_into(file: &Path, dir: &Path) -> Result<usize> {
    io::ensure_dir(dir)?;
    let name = file.file_name().unwrap_or(file.as_os_str());
    std::fs::copy(file, dir.join(name)).map_err(|e| PersistencyError::at(file, e))?;
    Ok(1)
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// Copy one caller-supplied file or directory into the layer root under its
/// own name. Returns the installed path relative to `root`.
pub fn install_asset(root: &Path, layer: &Path, source: &Path) -> Degradable<String> {
    let subject = paths::display_rel(root, source);
    if !source.exists() {
        return Err(Warning::new(
            WarningKind::AssetMissing,
            subject,
            "asset not found; skipped",
        ));
    }
    let Some(name) = source.file_name() else {
        return Err(Warning::new(
            WarningKind::AssetCopyFailed,
            subject,
            "asset path has no file name; skipped",
        ));
    };
    let target = layer.join(name);
    let copied = if source.is_dir() {
        // A source that contains the layer must not be copied into itself.
        io::copy_tree_excluding(source, &target, Some(layer)).map(|_| ())
    } else {
        std::fs::copy(source, &target)
            .map(|_| ())
            .map_err(|e| PersistencyError::at(source, e))
    };
    match copied {
        Ok(()) => Ok(paths::display_rel(root, &target)),
        Err(e) => Err(Warning::new(
            WarningKind::AssetCopyFailed,
            subject,
            format!("copy failed: {e}"),
        )),
    }
}

/// Install every asset, collecting successes and warnings separately.
pub fn install_assets(root: &Path, layer: &Path, sources: &[PathBuf]) -> (Vec<String>, Vec<Warning>) {
    let mut installed = Vec::new();
    let mut warnings = Vec::new();
    for source in sources {
        match install_asset(root, layer, &root.join(source)) {
            Ok(path) => installed.push(path),
            Err(w) => warnings.push(w),
        }
    }
    (installed, warnings)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
