//! Merge-conflict detection with a single automated remediation pass.

use tracing::{debug, info, warn};

use crate::console::Console;
use crate::git::VersionControl;

/// Conflict status computed once at the start of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictState {
    NoConflict,
    /// Conflicts were found and cleared by integrating the base branch.
    Resolved { paths: Vec<String> },
    /// Conflicts remain; the run must not commit.
    Unresolved { paths: Vec<String>, reason: String },
}

impl ConflictState {
    pub fn is_unresolved(&self) -> bool {
        matches!(self, ConflictState::Unresolved { .. })
    }
}

pub struct ConflictGuard<'a> {
    vcs: &'a dyn VersionControl,
    remote: &'a str,
    base_branch: &'a str,
}

impl<'a> ConflictGuard<'a> {
    pub fn new(vcs: &'a dyn VersionControl, remote: &'a str, base_branch: &'a str) -> Self {
        Self {
            vcs,
            remote,
            base_branch,
        }
    }

    /// Fetch, list unmerged paths, and try one `pull` from the base branch.
    ///
    /// Failures before any conflicted path is known fall back to
    /// `NoConflict` (logged). Once paths are known, every failure is
    /// `Unresolved`.
    pub fn check(&self, console: &mut dyn Console) -> ConflictState {
        console.say("Checking for merge conflicts...");

        if let Err(e) = self.vcs.fetch() {
            warn!("Fetch from '{}' failed, skipping conflict check: {}", self.remote, e);
            return ConflictState::NoConflict;
        }

        let paths = match self.vcs.unmerged_paths() {
            Ok(paths) => paths,
            Err(e) => {
                warn!("Could not list unmerged paths, skipping conflict check: {}", e);
                return ConflictState::NoConflict;
            }
        };

        if paths.is_empty() {
            debug!("No unmerged paths");
            console.say("No merge conflicts detected.");
            return ConflictState::NoConflict;
        }

        console.say("Merge conflicts detected in the following files:");
        for path in &paths {
            console.say(&format!("  {path}"));
        }
        console.say(&format!(
            "Attempting to resolve by pulling {}/{}...",
            self.remote, self.base_branch
        ));

        if let Err(e) = self.vcs.integrate(self.remote, self.base_branch) {
            return ConflictState::Unresolved {
                paths,
                reason: format!("automatic pull failed: {e}"),
            };
        }

        match self.vcs.unmerged_paths() {
            Ok(remaining) if remaining.is_empty() => {
                info!("Resolved {} conflicted path(s) via pull", paths.len());
                console.say("Merge conflicts resolved.");
                ConflictState::Resolved { paths }
            }
            Ok(remaining) => ConflictState::Unresolved {
                paths: remaining,
                reason: "conflicts remain after pull".to_string(),
            },
            Err(e) => ConflictState::Unresolved {
                paths,
                reason: format!("could not verify resolution: {e}"),
            },
        }
    }
}
