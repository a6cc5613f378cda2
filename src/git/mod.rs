//! Version-control collaborator: the git operations a commit run needs.

pub mod diff;
pub mod repo;

pub use diff::{ChangedFile, Diff, DiffScope, FileStatus, capture_staged};
pub use repo::{GitRepository, check_git_installed};

use crate::error::GitError;

/// The git operations the commit workflow and report pipeline depend on.
///
/// Every method is a single external call. Failures come back as
/// [`GitError`] and are never retried here.
#[cfg_attr(test, mockall::automock)]
pub trait VersionControl: Send + Sync {
    /// Synchronize with the remote (`git fetch`).
    fn fetch(&self) -> Result<(), GitError>;

    /// Paths currently in a conflicted (unmerged) state.
    fn unmerged_paths(&self) -> Result<Vec<String>, GitError>;

    /// Integrate `remote/branch` into the current branch (`git pull`).
    fn integrate(&self, remote: &str, branch: &str) -> Result<(), GitError>;

    /// Staged changes; empty when nothing is staged.
    fn staged_diff(&self, scope: DiffScope) -> Result<Diff, GitError>;

    /// Create a commit from the index. Returns the short id of the new commit.
    fn commit(&self, message: &str) -> Result<String, GitError>;

    /// Full message of the last commit on HEAD.
    fn last_commit_message(&self) -> Result<String, GitError>;

    /// Configured `user.name`.
    fn user_name(&self) -> Result<String, GitError>;

    /// URL of the named remote, if configured.
    fn remote_url(&self, remote: &str) -> Result<Option<String>, GitError>;

    /// `git diff <range>`, optionally as a `--name-status` listing.
    fn range_diff(&self, range: &str, name_status: bool) -> Result<String, GitError>;
}
