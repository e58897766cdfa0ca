use crate::error::{PersistencyError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Prevents partial writes from corrupting generated documents.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| PersistencyError::at(dir, e))?;
    tmp.write_all(data).map_err(|e| PersistencyError::at(path, e))?;
    tmp.persist(path)
        .map_err(|e| PersistencyError::at(path, e.error))?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| PersistencyError::at(path, e))
}

/// Recursively copy the tree at `src` into `dst`, creating `dst`.
/// Symlinks are not followed. Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    copy_tree_excluding(src, dst, None)
}

/// Like [`copy_tree`], but skips the subtree rooted at `exclude` when it lies
/// inside `src` (copying a layer into one of its own subdirectories).
pub fn copy_tree_excluding(src: &Path, dst: &Path, exclude: Option<&Path>) -> Result<usize> {
    ensure_dir(dst)?;
    let mut copied = 0;
    let walker = WalkDir::new(src)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| exclude.map_or(true, |ex| !e.path().starts_with(ex)));
    for entry in walker {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .unwrap_or_else(|_| entry.path());
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                ensure_dir(parent)?;
            }
            std::fs::copy(entry.path(), &target)
                .map_err(|e| PersistencyError::at(entry.path(), e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Return `parent/<stem>`, or `parent/<stem>-N` for the first free N, so
/// repeated timestamped directories never collide.
pub fn unique_dir(parent: &Path, stem: &str) -> PathBuf {
    let first = parent.join(stem);
    if !first.exists() {
        return first;
    }
    let mut n = 1u32;
    loop {
        let candidate = parent.join(format!("{stem}-{n}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Mark a generated script executable. No-op off unix.
pub fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)
            .map_err(|e| PersistencyError::at(path, e))?
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).map_err(|e| PersistencyError::at(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
