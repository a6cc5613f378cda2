//! Git repository access: git2 for reads, the system `git` binary for
//! anything that touches the network or runs hooks.
//!
//! Shelling out for fetch/pull/commit inherits the user's git config,
//! SSH agent, credential store and commit hooks.

use std::path::{Path, PathBuf};
use std::process::Command;

use git2::Repository;
use tracing::{debug, warn};

use crate::error::{ConfigError, GitError};

use super::VersionControl;
use super::diff::{Diff, DiffScope, capture_staged};

/// Reported in place of the commit id when HEAD cannot be read back.
pub const UNKNOWN_COMMIT_ID: &str = "unknown";

/// Check that the `git` executable is available.
pub fn check_git_installed() -> Result<(), ConfigError> {
    which::which("git")
        .map(|_| ())
        .map_err(|_| ConfigError::GitNotInstalled)
}

/// A working-tree repository on disk.
///
/// Holds only the workdir path; each operation opens what it needs so the
/// handle stays `Send + Sync` and always sees on-disk state written by the
/// `git` subprocesses.
#[derive(Debug, Clone)]
pub struct GitRepository {
    workdir: PathBuf,
    remote: String,
}

impl GitRepository {
    /// Discover the repository containing `path`.
    pub fn discover(path: impl AsRef<Path>, remote: impl Into<String>) -> Result<Self, GitError> {
        let repo = Repository::discover(path.as_ref()).map_err(GitError::NotARepository)?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| GitError::CommandFailed {
                operation: "open repository".into(),
                code: None,
                stderr: "bare repositories are not supported".into(),
            })?
            .to_path_buf();

        Ok(Self {
            workdir,
            remote: remote.into(),
        })
    }

    fn open(&self) -> Result<Repository, GitError> {
        Repository::open(&self.workdir).map_err(GitError::NotARepository)
    }

    /// Abbreviated id of the commit at HEAD.
    fn head_short_id(&self) -> Result<String, GitError> {
        let repo = self.open()?;
        let head = repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(GitError::repository("resolve new commit"))?;
        let id = head.id().to_string();
        Ok(id.chars().take(7).collect())
    }

    /// Run a git command in the workdir and return its stdout.
    fn run_git(&self, args: &[&str], operation: &str) -> Result<String, GitError> {
        debug!("git {}", args.join(" "));

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .map_err(|source| GitError::SpawnFailed {
                operation: operation.to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::CommandFailed {
                operation: operation.to_string(),
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl VersionControl for GitRepository {
    fn fetch(&self) -> Result<(), GitError> {
        self.run_git(&["fetch", &self.remote], "fetch").map(|_| ())
    }

    fn unmerged_paths(&self) -> Result<Vec<String>, GitError> {
        let repo = self.open()?;
        let mut index = repo.index().map_err(GitError::repository("read index"))?;
        index
            .read(false)
            .map_err(GitError::repository("read index"))?;

        if !index.has_conflicts() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for conflict in index
            .conflicts()
            .map_err(GitError::repository("list conflicts"))?
        {
            let conflict = conflict.map_err(GitError::repository("list conflicts"))?;
            let entry = conflict.our.or(conflict.their).or(conflict.ancestor);
            if let Some(entry) = entry {
                let path = String::from_utf8_lossy(&entry.path).to_string();
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }

        Ok(paths)
    }

    fn integrate(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.run_git(&["pull", remote, branch], "pull").map(|_| ())
    }

    fn staged_diff(&self, scope: DiffScope) -> Result<Diff, GitError> {
        let repo = self.open()?;
        capture_staged(&repo, scope)
    }

    fn commit(&self, message: &str) -> Result<String, GitError> {
        self.run_git(&["commit", "-q", "-m", message], "commit")?;

        // The commit exists from here on; an unreadable HEAD only costs the id.
        match self.head_short_id() {
            Ok(id) => Ok(id),
            Err(e) => {
                warn!("Committed, but could not read the new commit id: {}", e);
                Ok(UNKNOWN_COMMIT_ID.to_string())
            }
        }
    }

    fn last_commit_message(&self) -> Result<String, GitError> {
        let repo = self.open()?;
        let head = repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(GitError::repository("read last commit"))?;
        Ok(head.message().unwrap_or("").trim().to_string())
    }

    fn user_name(&self) -> Result<String, GitError> {
        let repo = self.open()?;
        let config = repo.config().map_err(GitError::repository("read git config"))?;
        config
            .get_string("user.name")
            .map(|name| name.trim().to_string())
            .map_err(GitError::repository("read user.name"))
    }

    fn remote_url(&self, remote: &str) -> Result<Option<String>, GitError> {
        let repo = self.open()?;
        match repo.find_remote(remote) {
            Ok(r) => Ok(r.url().map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::repository("find remote")(e)),
        }
    }

    fn range_diff(&self, range: &str, name_status: bool) -> Result<String, GitError> {
        let mut args = vec!["diff", range, "--no-color"];
        if name_status {
            args.push("--name-status");
        }
        let out = self.run_git(&args, "diff")?;
        Ok(out.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@test.com").unwrap();
        config.set_bool("commit.gpgsign", false).unwrap();
        repo
    }

    #[test]
    fn test_check_git_installed() {
        assert!(check_git_installed().is_ok());
    }

    #[test]
    fn test_discover_outside_repo_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = GitRepository::discover(dir.path(), "origin");
        assert!(matches!(result, Err(GitError::NotARepository(_))));
    }

    #[test]
    fn test_run_git_invalid_command_fails() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let repo = GitRepository::discover(dir.path(), "origin").unwrap();

        let result = repo.run_git(&["not-a-real-command"], "invalid");
        assert!(matches!(result, Err(GitError::CommandFailed { .. })));
    }

    #[test]
    fn test_fetch_without_remote_fails() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let repo = GitRepository::discover(dir.path(), "origin").unwrap();

        assert!(repo.fetch().is_err());
    }

    #[test]
    fn test_clean_repo_has_no_unmerged_paths() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let repo = GitRepository::discover(dir.path(), "origin").unwrap();

        assert!(repo.unmerged_paths().unwrap().is_empty());
    }

    #[test]
    fn test_user_name_reads_repo_config() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let repo = GitRepository::discover(dir.path(), "origin").unwrap();

        assert_eq!(repo.user_name().unwrap(), "Test User");
    }

    #[test]
    fn test_remote_url_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let repo = GitRepository::discover(dir.path(), "origin").unwrap();

        assert_eq!(repo.remote_url("origin").unwrap(), None);
    }

    #[test]
    fn test_commit_applies_message_and_returns_short_id() {
        let dir = tempfile::tempdir().unwrap();
        let raw = init_repo(dir.path());
        std::fs::write(dir.path().join("file.txt"), "hello\n").unwrap();
        let mut index = raw.index().unwrap();
        index.add_path(Path::new("file.txt")).unwrap();
        index.write().unwrap();

        let repo = GitRepository::discover(dir.path(), "origin").unwrap();
        let id = repo.commit("feat: add file").unwrap();

        assert_eq!(id.len(), 7);
        assert_eq!(repo.last_commit_message().unwrap(), "feat: add file");
    }

    #[test]
    #[cfg(unix)]
    fn test_commit_succeeds_when_new_head_is_unreadable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let raw = init_repo(dir.path());
        std::fs::write(dir.path().join("file.txt"), "hello\n").unwrap();
        let mut index = raw.index().unwrap();
        index.add_path(Path::new("file.txt")).unwrap();
        index.write().unwrap();

        // The hook runs after the commit is recorded and breaks HEAD.
        let hook = dir.path().join(".git/hooks/post-commit");
        std::fs::create_dir_all(hook.parent().unwrap()).unwrap();
        std::fs::write(&hook, "#!/bin/sh\nprintf 'ref: refs/heads/bad..name\\n' > .git/HEAD\n")
            .unwrap();
        std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();

        let repo = GitRepository::discover(dir.path(), "origin").unwrap();
        assert_eq!(repo.commit("feat: add file").unwrap(), UNKNOWN_COMMIT_ID);
    }

    #[test]
    fn test_commit_with_nothing_staged_fails() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let repo = GitRepository::discover(dir.path(), "origin").unwrap();

        let result = repo.commit("chore: nothing");
        assert!(matches!(result, Err(GitError::CommandFailed { .. })));
    }
}
