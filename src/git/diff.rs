//! Staged diff capture using git2.

use std::fmt;

use git2::{Delta, DiffFormat, DiffOptions, ErrorCode, Repository, Tree};

use crate::error::GitError;

/// How the staged diff is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffScope {
    /// One patch covering every staged change.
    #[default]
    WholeTree,
    /// Staged paths are enumerated first, then each path's patch is appended
    /// in enumeration order.
    PerFile,
}

impl std::str::FromStr for DiffScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "whole" | "whole-tree" => Ok(DiffScope::WholeTree),
            "per-file" | "perfile" | "file" => Ok(DiffScope::PerFile),
            other => Err(format!("expected 'whole' or 'per-file', got '{other}'")),
        }
    }
}

/// Status of a staged file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Unmerged,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Added => write!(f, "Added"),
            FileStatus::Modified => write!(f, "Modified"),
            FileStatus::Deleted => write!(f, "Deleted"),
            FileStatus::Renamed => write!(f, "Renamed"),
            FileStatus::Unmerged => write!(f, "Unmerged"),
        }
    }
}

/// A file with staged changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub path: String,
    pub status: FileStatus,
    /// Old path for renamed files (None for non-rename changes).
    pub old_path: Option<String>,
}

/// Staged changes captured for one run.
///
/// Immutable once built; an empty diff means nothing is staged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    text: String,
    files: Vec<ChangedFile>,
    additions: usize,
    deletions: usize,
}

impl Diff {
    pub fn new(text: impl Into<String>, files: Vec<ChangedFile>) -> Self {
        let text = text.into();
        let (additions, deletions) = count_lines(&text);
        Self {
            text,
            files,
            additions,
            deletions,
        }
    }

    fn from_patch(patch: Patch, files: Vec<ChangedFile>) -> Self {
        Self {
            text: patch.text,
            files,
            additions: patch.additions,
            deletions: patch.deletions,
        }
    }

    /// A diff with no staged changes.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn files(&self) -> &[ChangedFile] {
        &self.files
    }

    pub fn additions(&self) -> usize {
        self.additions
    }

    pub fn deletions(&self) -> usize {
        self.deletions
    }

    /// One-line summary such as `3 files changed (+10/-2)`.
    pub fn summary(&self) -> String {
        let n = self.files.len();
        format!(
            "{} file{} changed (+{}/-{})",
            n,
            if n == 1 { "" } else { "s" },
            self.additions,
            self.deletions
        )
    }
}

/// Resolve the HEAD tree, distinguishing empty-repo errors from real failures.
///
/// Returns `Ok(None)` for repos with no commits (unborn branch / not found).
fn resolve_head_tree(repo: &Repository) -> Result<Option<Tree<'_>>, GitError> {
    let head_ref = match repo.head() {
        Ok(r) => r,
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            return Ok(None);
        }
        Err(e) => return Err(GitError::repository("resolve HEAD")(e)),
    };

    let tree = head_ref
        .peel_to_tree()
        .map_err(GitError::repository("resolve HEAD tree"))?;
    Ok(Some(tree))
}

/// Capture the staged diff (HEAD tree to index).
///
/// Returns an empty [`Diff`] when nothing is staged.
pub fn capture_staged(repo: &Repository, scope: DiffScope) -> Result<Diff, GitError> {
    match scope {
        DiffScope::WholeTree => capture_whole_tree(repo),
        DiffScope::PerFile => capture_per_file(repo),
    }
}

fn capture_whole_tree(repo: &Repository) -> Result<Diff, GitError> {
    let head_tree = resolve_head_tree(repo)?;
    let diff = repo
        .diff_tree_to_index(head_tree.as_ref(), None, None)
        .map_err(GitError::repository("collect staged diff"))?;

    let files = collect_files(&diff);
    let mut patch = Patch::default();
    patch.render(&diff)?;
    Ok(Diff::from_patch(patch, files))
}

fn capture_per_file(repo: &Repository) -> Result<Diff, GitError> {
    let head_tree = resolve_head_tree(repo)?;

    let listing = repo
        .diff_tree_to_index(head_tree.as_ref(), None, None)
        .map_err(GitError::repository("list staged files"))?;
    let files = collect_files(&listing);

    let mut patch = Patch::default();
    for file in &files {
        let mut opts = DiffOptions::new();
        opts.pathspec(file.path.as_str()).disable_pathspec_match(true);
        if let Some(old) = &file.old_path {
            opts.pathspec(old.as_str());
        }
        let single = repo
            .diff_tree_to_index(head_tree.as_ref(), None, Some(&mut opts))
            .map_err(GitError::repository("collect staged diff"))?;
        patch.render(&single)?;
    }

    Ok(Diff::from_patch(patch, files))
}

/// Collect changed file entries from a diff, in delta order.
fn collect_files(diff: &git2::Diff<'_>) -> Vec<ChangedFile> {
    let mut files = Vec::new();

    for delta in diff.deltas() {
        let status = match delta.status() {
            Delta::Added | Delta::Untracked | Delta::Copied => FileStatus::Added,
            Delta::Deleted => FileStatus::Deleted,
            Delta::Renamed => FileStatus::Renamed,
            Delta::Conflicted => FileStatus::Unmerged,
            _ => FileStatus::Modified,
        };

        let new_path = delta
            .new_file()
            .path()
            .map(|p| p.to_string_lossy().to_string());
        let old_path = delta
            .old_file()
            .path()
            .map(|p| p.to_string_lossy().to_string());

        let (path, old_path) = match status {
            FileStatus::Renamed => (
                new_path.or_else(|| old_path.clone()).unwrap_or_default(),
                old_path,
            ),
            _ => (new_path.or(old_path).unwrap_or_default(), None),
        };

        if !path.is_empty() && !files.iter().any(|f: &ChangedFile| f.path == path) {
            files.push(ChangedFile {
                path,
                status,
                old_path,
            });
        }
    }

    files
}

/// Unified patch text with line counts taken from each line's origin.
#[derive(Debug, Default)]
struct Patch {
    text: String,
    additions: usize,
    deletions: usize,
}

impl Patch {
    /// Append `diff` as unified patch text.
    ///
    /// Non-UTF-8 content is kept with replacement characters.
    fn render(&mut self, diff: &git2::Diff<'_>) -> Result<(), GitError> {
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            let origin = line.origin();
            match origin {
                '+' => self.additions += 1,
                '-' => self.deletions += 1,
                _ => {}
            }
            if matches!(origin, '+' | '-' | ' ') {
                self.text.push(origin);
            }
            self.text.push_str(&String::from_utf8_lossy(line.content()));
            true
        })
        .map_err(GitError::repository("render staged diff"))
    }
}

/// Count added and removed lines in patch text.
///
/// File headers run from a `diff ` line to the first `@@`; text with no
/// `diff ` line is treated as hunk content throughout.
fn count_lines(text: &str) -> (usize, usize) {
    let mut additions = 0;
    let mut deletions = 0;
    let mut in_hunk = true;
    for line in text.lines() {
        if line.starts_with("diff ") {
            in_hunk = false;
        } else if line.starts_with("@@") {
            in_hunk = true;
        } else if in_hunk && line.starts_with('+') {
            additions += 1;
        } else if in_hunk && line.starts_with('-') {
            deletions += 1;
        }
    }
    (additions, deletions)
}
