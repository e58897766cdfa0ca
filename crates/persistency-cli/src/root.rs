use persistency_core::paths;
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `PERSISTENCY_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for a `.persistency-path` pointer
/// 3. Walk upward from `cwd` looking for `.git`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd, |dir| dir.join(paths::POINTER_FILE).is_file())
        .or_else(|| find_upward(&cwd, |dir| dir.join(".git").exists()))
        .unwrap_or(cwd)
}

fn find_upward(start: &Path, is_root: impl Fn(&Path) -> bool) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| is_root(dir))
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        let result = resolve_root(Some(dir.path()));
        assert_eq!(result, dir.path());
    }

    #[test]
    fn pointer_found_from_nested_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".persistency-path"), "ai").unwrap();
        let nested = dir.path().join("src/deep");
        std::fs::create_dir_all(&nested).unwrap();
        let found = find_upward(&nested, |d| d.join(paths::POINTER_FILE).is_file());
        assert_eq!(found.as_deref(), Some(dir.path()));
    }

    #[test]
    fn git_worktree_file_counts_as_root() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".git"), "gitdir: ../main/.git/worktrees/x").unwrap();
        let nested = dir.path().join("a");
        std::fs::create_dir_all(&nested).unwrap();
        let found = find_upward(&nested, |d| d.join(".git").exists());
        assert_eq!(found.as_deref(), Some(dir.path()));
    }
}
