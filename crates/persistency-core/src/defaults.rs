//! Persisted defaults: the pointer file and the metadata record.
//!
//! The engine reaches them only through [`DefaultsProvider`], so tests can
//! swap the filesystem for [`MemoryDefaults`].

use crate::error::{PersistencyError, Result};
use crate::metadata::Metadata;
use crate::paths;
use std::cell::RefCell;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Defaults {
    /// Layer directory recorded in the pointer file, relative to the project root.
    pub layer_dir: Option<String>,
    /// The previous run's metadata record.
    pub metadata: Option<Metadata>,
}

pub trait DefaultsProvider {
    /// Never fails; unreadable state is reported as absent.
    fn load(&self) -> Defaults;

    /// Persist whichever parts of `defaults` are present.
    fn save(&self, defaults: &Defaults) -> Result<()>;
}

// ---------------------------------------------------------------------------
// FsDefaults
// ---------------------------------------------------------------------------

pub struct FsDefaults {
    root: PathBuf,
    fallback_dir: String,
}

impl FsDefaults {
    /// `fallback_dir` is where the metadata record is looked for when no
    /// pointer file exists.
    pub fn new(root: impl Into<PathBuf>, fallback_dir: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            fallback_dir: fallback_dir.into(),
        }
    }

    fn read_pointer(&self) -> Option<String> {
        let path = paths::pointer_path(&self.root);
        match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let value = raw.lines().next().unwrap_or("").trim().to_string();
                (!value.is_empty()).then_some(value)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "pointer file unreadable");
                None
            }
        }
    }
}

impl DefaultsProvider for FsDefaults {
    fn load(&self) -> Defaults {
        let layer_dir = self.read_pointer();
        let lookup = layer_dir.as_deref().unwrap_or(&self.fallback_dir);
        let metadata = Metadata::read(&paths::meta_path(&paths::layer_path(&self.root, lookup)));
        Defaults {
            layer_dir,
            metadata,
        }
    }

    fn save(&self, defaults: &Defaults) -> Result<()> {
        if let Some(dir) = &defaults.layer_dir {
            let path = paths::pointer_path(&self.root);
            crate::io::atomic_write(&path, dir.as_bytes())?;
        }
        if let Some(meta) = &defaults.metadata {
            let layer = paths::layer_path(&self.root, &meta.persistency_dir);
            if !layer.is_dir() {
                return Err(PersistencyError::at(
                    &layer,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "layer directory missing"),
                ));
            }
            meta.write(&paths::meta_path(&layer))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryDefaults
// ---------------------------------------------------------------------------

/// In-memory provider; `save` merges present parts over the stored value.
#[derive(Debug, Default)]
pub struct MemoryDefaults {
    state: RefCell<Defaults>,
    saves: RefCell<usize>,
}

impl MemoryDefaults {
    pub fn new(initial: Defaults) -> Self {
        Self {
            state: RefCell::new(initial),
            saves: RefCell::new(0),
        }
    }

    pub fn snapshot(&self) -> Defaults {
        self.state.borrow().clone()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.borrow()
    }
}

impl DefaultsProvider for MemoryDefaults {
    fn load(&self) -> Defaults {
        self.snapshot()
    }

    fn save(&self, defaults: &Defaults) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if defaults.layer_dir.is_some() {
            state.layer_dir = defaults.layer_dir.clone();
        }
        if defaults.metadata.is_some() {
            state.metadata = defaults.metadata.clone();
        }
        *self.saves.borrow_mut() += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn fs_pointer_written_exactly() {
        let dir = TempDir::new().unwrap();
        let fs = FsDefaults::new(dir.path(), paths::DEFAULT_LAYER_DIR);
        fs.save(&Defaults {
            layer_dir: Some("custom-ai".to_string()),
            metadata: None,
        })
        .unwrap();
        let raw = std::fs::read_to_string(dir.path().join(".persistency-path")).unwrap();
        assert_eq!(raw, "custom-ai");
        assert_eq!(fs.load().layer_dir.as_deref(), Some("custom-ai"));
    }

    #[test]
    fn fs_blank_pointer_is_absent() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".persistency-path"), "  \n").unwrap();
        let fs = FsDefaults::new(dir.path(), paths::DEFAULT_LAYER_DIR);
        assert!(fs.load().layer_dir.is_none());
    }

    #[test]
    fn fs_metadata_found_in_fallback_dir_without_pointer() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("ai")).unwrap();
        std::fs::write(
            dir.path().join("ai/.persistency-meta.json"),
            r#"{"projectName":"p","projectPath":"/p","agent":"codex","command":"codex",
               "persistencyDir":"ai","truthBranch":"main","updatedAt":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        let fs = FsDefaults::new(dir.path(), "ai");
        let loaded = fs.load();
        assert!(loaded.layer_dir.is_none());
        assert_eq!(loaded.metadata.unwrap().agent, "codex");
    }

    #[test]
    fn memory_save_merges_present_parts() {
        let mem = MemoryDefaults::default();
        mem.save(&Defaults {
            layer_dir: Some("kb".to_string()),
            metadata: None,
        })
        .unwrap();
        mem.save(&Defaults::default()).unwrap();
        assert_eq!(mem.load().layer_dir.as_deref(), Some("kb"));
        assert_eq!(mem.save_count(), 2);
    }
}
