use crate::error::{PersistencyError, Result};
use std::path::{Component, Path, PathBuf};

// ---------------------------------------------------------------------------
// Project-root files
// ---------------------------------------------------------------------------

pub const DEFAULT_LAYER_DIR: &str = "ai";
pub const POINTER_FILE: &str = ".persistency-path";
pub const PROJECT_CONFIG_FILE: &str = "persistency.yaml";
pub const UPSERT_PROMPT_FILE: &str = "persistency.upsert.prompt.md";
pub const START_SCRIPT_FILE: &str = "persistency.start.sh";
pub const UPSERT_SCRIPT_FILE: &str = "persistency.upsert.sh";

// ---------------------------------------------------------------------------
// Layer-relative files
// ---------------------------------------------------------------------------

pub const FUNCTIONAL_DIR: &str = "functional";
pub const TECHNICAL_DIR: &str = "technical";
pub const AI_META_DIR: &str = "ai-meta";

/// The canonical domains, in the order they are created and reported.
pub const CANONICAL_DOMAINS: [&str; 3] = [FUNCTIONAL_DIR, TECHNICAL_DIR, AI_META_DIR];

pub const FOUNDATION_DOC: &str = "foundation.md";
pub const INDEX_DOC: &str = "index.md";
pub const BOOTSTRAP_DOC: &str = "ai-bootstrap.md";
pub const MIGRATION_BRIEF_DOC: &str = "ai-meta/migration-brief.md";
pub const LEGACY_DIR: &str = "ai-meta/legacy";
pub const META_FILE: &str = ".persistency-meta.json";

/// Directories never treated as knowledge domains, besides hidden ones.
pub const IGNORED_DIRS: [&str; 4] = [
    "node_modules",
    "bower_components",
    "__pycache__",
    "site-packages",
];

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn pointer_path(root: &Path) -> PathBuf {
    root.join(POINTER_FILE)
}

pub fn project_config_path(root: &Path) -> PathBuf {
    root.join(PROJECT_CONFIG_FILE)
}

pub fn layer_path(root: &Path, layer_dir: &str) -> PathBuf {
    root.join(layer_dir)
}

pub fn meta_path(layer: &Path) -> PathBuf {
    layer.join(META_FILE)
}

pub fn bootstrap_path(layer: &Path) -> PathBuf {
    layer.join(BOOTSTRAP_DOC)
}

pub fn legacy_dir(layer: &Path) -> PathBuf {
    layer.join(LEGACY_DIR)
}

/// `<layer_dir>/<domain>/<doc>` as a forward-slash relative string.
pub fn domain_doc(layer_dir: &str, domain: &str, doc: &str) -> String {
    format!("{}/{domain}/{doc}", trim_dir(layer_dir))
}

/// Join a layer-relative path onto the layer directory string.
pub fn layer_rel(layer_dir: &str, rel: &str) -> String {
    format!("{}/{rel}", trim_dir(layer_dir))
}

fn trim_dir(dir: &str) -> &str {
    dir.trim_end_matches('/')
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Reject layer directories that are empty, absolute, escape the project,
/// or name the project root itself.
pub fn validate_layer_dir(dir: &str) -> Result<()> {
    let trimmed = dir.trim();
    let path = Path::new(trimmed);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    let names_subdir = path.components().any(|c| matches!(c, Component::Normal(_)));
    if trimmed.contains('\0') || escapes || !names_subdir {
        return Err(PersistencyError::InvalidLayerDir(dir.to_string()));
    }
    Ok(())
}

/// Render `path` relative to `root` with forward slashes; falls back to the
/// full display form when `path` is outside `root`.
pub fn display_rel(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.display().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_layer_dirs() {
        for dir in ["ai", "custom-ai", "docs/ai", "./ai"] {
            validate_layer_dir(dir).unwrap_or_else(|_| panic!("expected valid: {dir}"));
        }
    }

    #[test]
    fn invalid_layer_dirs() {
        for dir in ["", "  ", "/abs/ai", "../outside", "ai/../../x", ".", "./", "./."] {
            assert!(validate_layer_dir(dir).is_err(), "expected invalid: {dir}");
        }
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            pointer_path(root),
            PathBuf::from("/tmp/proj/.persistency-path")
        );
        assert_eq!(
            meta_path(&layer_path(root, "ai")),
            PathBuf::from("/tmp/proj/ai/.persistency-meta.json")
        );
        assert_eq!(domain_doc("ai/", "technical", INDEX_DOC), "ai/technical/index.md");
        assert_eq!(layer_rel("ai", MIGRATION_BRIEF_DOC), "ai/ai-meta/migration-brief.md");
    }

    #[test]
    fn display_rel_inside_and_outside() {
        let root = Path::new("/tmp/proj");
        assert_eq!(display_rel(root, Path::new("/tmp/proj/ai/x")), "ai/x");
        assert_eq!(display_rel(root, Path::new("/elsewhere")), "/elsewhere");
    }
}
