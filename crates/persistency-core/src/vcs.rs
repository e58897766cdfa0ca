use crate::error::{PersistencyError, Result};
use std::path::PathBuf;
use std::process::Command;

/// Read-only view of the project's version control.
pub trait Vcs {
    fn is_repository(&self) -> bool;
    fn current_branch(&self) -> Result<String>;
    fn branch_exists(&self, branch: &str) -> bool;
    /// Number of commits reachable from `to` but not from `from`.
    fn commit_distance(&self, from: &str, to: &str) -> Result<u64>;
    fn commit_hash(&self, rev: &str) -> Result<String>;
}

/// `Vcs` backed by the `git` binary, run with `-C <root>`.
pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .output()
            .map_err(|e| PersistencyError::Git {
                command: args.join(" "),
                message: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(PersistencyError::Git {
                command: args.join(" "),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// `rev` itself when it names a commit, else `origin/<rev>` when only the
    /// remote-tracking branch exists (fresh CI clones, feature-branch checkouts).
    fn resolve_rev(&self, rev: &str) -> String {
        let verify = |r: &str| {
            let spec = format!("{r}^{{commit}}");
            self.git(&["rev-parse", "--verify", "--quiet", spec.as_str()])
                .is_ok()
        };
        if verify(rev) {
            return rev.to_string();
        }
        let remote = format!("origin/{rev}");
        if verify(&remote) {
            tracing::debug!(rev, remote = %remote, "using remote-tracking branch");
            return remote;
        }
        rev.to_string()
    }
}

impl Vcs for GitCli {
    fn is_repository(&self) -> bool {
        self.git(&["rev-parse", "--is-inside-work-tree"])
            .map(|out| out == "true")
            .unwrap_or(false)
    }

    fn current_branch(&self) -> Result<String> {
        // Works on unborn branches too, unlike rev-parse --abbrev-ref.
        self.git(&["symbolic-ref", "--short", "HEAD"])
    }

    fn branch_exists(&self, branch: &str) -> bool {
        let local = format!("refs/heads/{branch}");
        let remote = format!("refs/remotes/origin/{branch}");
        [local, remote]
            .iter()
            .any(|r| self.git(&["show-ref", "--verify", "--quiet", r.as_str()]).is_ok())
    }

    fn commit_distance(&self, from: &str, to: &str) -> Result<u64> {
        let range = format!("{}..{}", self.resolve_rev(from), self.resolve_rev(to));
        let out = self.git(&["rev-list", "--count", range.as_str()])?;
        out.parse::<u64>().map_err(|e| PersistencyError::Git {
            command: format!("rev-list --count {range}"),
            message: format!("unexpected output '{out}': {e}"),
        })
    }

    fn commit_hash(&self, rev: &str) -> Result<String> {
        let spec = format!("{}^{{commit}}", self.resolve_rev(rev));
        self.git(&["rev-parse", "--verify", spec.as_str()])
    }
}

/// Truth branch: the first configured candidate, else `main`, `master`, or
/// the current branch. `None` when nothing can be determined.
pub fn resolve_truth_branch(vcs: &dyn Vcs, configured: &[Option<&str>]) -> Option<String> {
    if let Some(branch) = configured
        .iter()
        .flatten()
        .map(|b| b.trim())
        .find(|b| !b.is_empty())
    {
        return Some(branch.to_string());
    }
    ["main", "master"]
        .into_iter()
        .find(|b| vcs.branch_exists(b))
        .map(str::to_string)
        .or_else(|| vcs.current_branch().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Branches(Vec<&'static str>, &'static str);

    impl Vcs for Branches {
        fn is_repository(&self) -> bool {
            true
        }
        fn current_branch(&self) -> Result<String> {
            Ok(self.1.to_string())
        }
        fn branch_exists(&self, branch: &str) -> bool {
            self.0.contains(&branch)
        }
        fn commit_distance(&self, _from: &str, _to: &str) -> Result<u64> {
            Ok(0)
        }
        fn commit_hash(&self, _rev: &str) -> Result<String> {
            Ok("0".repeat(40))
        }
    }

    #[test]
    fn truth_branch_prefers_configured() {
        let vcs = Branches(vec!["main"], "feature");
        assert_eq!(
            resolve_truth_branch(&vcs, &[None, Some("release"), Some("other")]).as_deref(),
            Some("release")
        );
    }

    #[test]
    fn truth_branch_falls_back_through_main_master_current() {
        assert_eq!(
            resolve_truth_branch(&Branches(vec!["master"], "feature"), &[]).as_deref(),
            Some("master")
        );
        assert_eq!(
            resolve_truth_branch(&Branches(vec![], "feature"), &[Some("  ")]).as_deref(),
            Some("feature")
        );
    }

    fn git_in(dir: &std::path::Path, args: &[&str]) {
        let status = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
            .args(args)
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    #[test]
    fn remote_only_truth_branch_still_resolves() {
        if !Command::new("git")
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
        {
            return;
        }
        let dir = TempDir::new().unwrap();
        let upstream = dir.path().join("upstream");
        let clone = dir.path().join("clone");
        std::fs::create_dir_all(&upstream).unwrap();
        git_in(&upstream, &["-c", "init.defaultBranch=main", "init", "-q"]);
        git_in(&upstream, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git_in(&upstream, &["commit", "-q", "--allow-empty", "-m", "initial"]);
        git_in(
            dir.path(),
            &["clone", "-q", upstream.to_str().unwrap(), clone.to_str().unwrap()],
        );
        git_in(&clone, &["checkout", "-q", "-b", "feature"]);
        git_in(&clone, &["branch", "-q", "-D", "main"]);
        git_in(&clone, &["commit", "-q", "--allow-empty", "-m", "work"]);

        let git = GitCli::new(&clone);
        assert_eq!(resolve_truth_branch(&git, &[]).as_deref(), Some("main"));
        assert_eq!(git.commit_hash("main").unwrap().len(), 40);
        assert_eq!(git.commit_distance("main", "HEAD").unwrap(), 1);
    }

    #[test]
    fn plain_directory_is_not_a_repository() {
        let dir = TempDir::new().unwrap();
        // A bare temp dir may still sit inside a repository on some hosts;
        // only assert when git itself is usable and reports no work tree.
        let git = GitCli::new(dir.path());
        if Command::new("git").arg("--version").output().is_ok() {
            let inside = Command::new("git")
                .arg("-C")
                .arg(dir.path())
                .args(["rev-parse", "--is-inside-work-tree"])
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false);
            assert_eq!(git.is_repository(), inside);
        }
    }
}
