//! The commit workflow state machine.
//!
//! ```text
//! START -> CONFLICT_CHECK -> DIFF_CAPTURE -> GENERATE -> SELECT -> COMMIT -> REPORT -> DONE
//! ```
//!
//! Every non-terminal stage may move to ABORTED instead. Stages run one at a
//! time and none is retried. A commit is only applied after a clean (or
//! resolved) conflict check, a non-empty diff, and an explicit confirmation.

use std::fmt;

use tracing::{debug, info};

use crate::commit::message::{CandidateSet, MessageGenerator};
use crate::commit::select::{Selection, SelectionAbort, select};
use crate::config::Config;
use crate::conflict::{ConflictGuard, ConflictState};
use crate::console::Console;
use crate::error::{CommitError, GitError, ServiceError};
use crate::git::{Diff, DiffScope, VersionControl};
use crate::llm::client::CompletionBackend;
use crate::report::{ReportSummary, ReportTrigger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    ConflictCheck,
    DiffCapture,
    Generate,
    Select,
    Commit,
    Report,
    Done,
    Aborted,
}

/// Why a run stopped before committing.
#[derive(Debug)]
pub enum AbortReason {
    ConflictUnresolved { paths: Vec<String>, reason: String },
    NoStagedChanges,
    VersionControl(GitError),
    Generation(ServiceError),
    Selection(SelectionAbort),
    Commit(CommitError),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::ConflictUnresolved { paths, reason } => write!(
                f,
                "Merge conflicts could not be resolved automatically ({reason}) in: {}. \
                 Please resolve them manually, stage the result, and run again.",
                paths.join(", ")
            ),
            AbortReason::NoStagedChanges => write!(
                f,
                "No staged changes found. Stage your changes with 'git add' and try again."
            ),
            AbortReason::VersionControl(e) => write!(f, "Failed to read staged changes: {e}"),
            AbortReason::Generation(e) => write!(f, "Failed to generate commit messages: {e}"),
            AbortReason::Selection(reason) => write!(f, "No commit message selected ({reason})."),
            AbortReason::Commit(e) => write!(f, "{e}"),
        }
    }
}

/// Terminal disposition of a run.
#[derive(Debug)]
pub enum Outcome {
    Committed { message: String, commit_id: String },
    /// A candidate was shown and the user did not confirm it.
    Declined,
    Aborted(AbortReason),
}

impl Outcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed { .. })
    }
}

/// Everything one invocation produced. Dropped at exit.
#[derive(Debug)]
pub struct WorkflowRun {
    pub conflict: Option<ConflictState>,
    pub diff: Option<Diff>,
    pub candidates: Option<CandidateSet>,
    pub selection: Option<Selection>,
    /// Stages visited, in order, starting with [`Stage::Start`].
    pub stages: Vec<Stage>,
    pub outcome: Outcome,
    /// Present only when the report stage ran.
    pub reports: Option<ReportSummary>,
}

impl WorkflowRun {
    fn new() -> Self {
        Self {
            conflict: None,
            diff: None,
            candidates: None,
            selection: None,
            stages: vec![Stage::Start],
            outcome: Outcome::Declined,
            reports: None,
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug!("Entering stage {:?}", stage);
        self.stages.push(stage);
    }

    pub fn last_stage(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Start)
    }
}

/// Per-run settings taken from [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowOptions {
    pub language: String,
    pub candidates: usize,
    pub remote: String,
    pub base_branch: String,
    pub diff_scope: DiffScope,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            candidates: 5,
            remote: "origin".to_string(),
            base_branch: "master".to_string(),
            diff_scope: DiffScope::WholeTree,
        }
    }
}

impl From<&Config> for WorkflowOptions {
    fn from(config: &Config) -> Self {
        Self {
            language: config.language.clone(),
            candidates: config.candidates,
            remote: config.remote.clone(),
            base_branch: config.base_branch.clone(),
            diff_scope: config.diff_scope,
        }
    }
}

pub struct CommitWorkflow<'a> {
    vcs: &'a dyn VersionControl,
    backend: &'a dyn CompletionBackend,
    reports: Option<&'a dyn ReportTrigger>,
    options: WorkflowOptions,
}

impl<'a> CommitWorkflow<'a> {
    pub fn new(
        vcs: &'a dyn VersionControl,
        backend: &'a dyn CompletionBackend,
        options: WorkflowOptions,
    ) -> Self {
        Self {
            vcs,
            backend,
            reports: None,
            options,
        }
    }

    /// Fire `trigger` after a successful commit.
    pub fn with_reports(mut self, trigger: &'a dyn ReportTrigger) -> Self {
        self.reports = Some(trigger);
        self
    }

    pub async fn run(&self, console: &mut dyn Console) -> WorkflowRun {
        let mut run = WorkflowRun::new();

        run.enter(Stage::ConflictCheck);
        let conflict =
            ConflictGuard::new(self.vcs, &self.options.remote, &self.options.base_branch)
                .check(console);
        if let ConflictState::Unresolved { paths, reason } = &conflict {
            let reason = AbortReason::ConflictUnresolved {
                paths: paths.clone(),
                reason: reason.clone(),
            };
            run.conflict = Some(conflict);
            return abort(run, reason, console);
        }
        run.conflict = Some(conflict);

        run.enter(Stage::DiffCapture);
        let diff = match self.vcs.staged_diff(self.options.diff_scope) {
            Ok(diff) => diff,
            Err(e) => return abort(run, AbortReason::VersionControl(e), console),
        };
        if diff.is_empty() {
            run.diff = Some(diff);
            return abort(run, AbortReason::NoStagedChanges, console);
        }
        console.say(&format!("Staged: {}", diff.summary()));

        run.enter(Stage::Generate);
        console.say("Generating commit messages...");
        let generated = MessageGenerator::new(self.backend)
            .generate(&diff, &self.options.language, self.options.candidates)
            .await;
        run.diff = Some(diff);
        let candidates = match generated {
            Ok(candidates) => candidates,
            Err(e) => return abort(run, AbortReason::Generation(e), console),
        };

        run.enter(Stage::Select);
        let selection = select(&candidates, console);
        run.selection = Some(selection.clone());
        let message = match selection {
            Selection::Chosen {
                index,
                confirmed: true,
            } => candidates.get(index).map(str::to_string),
            Selection::Chosen {
                confirmed: false, ..
            } => {
                run.candidates = Some(candidates);
                run.enter(Stage::Aborted);
                run.outcome = Outcome::Declined;
                console.say("Commit message was not used.");
                return run;
            }
            Selection::Aborted(reason) => {
                run.candidates = Some(candidates);
                return abort(run, AbortReason::Selection(reason), console);
            }
        };
        run.candidates = Some(candidates);
        let Some(message) = message else {
            return abort(
                run,
                AbortReason::Selection(SelectionAbort::OutOfRange),
                console,
            );
        };

        run.enter(Stage::Commit);
        let commit_id = match self.apply(&message) {
            Ok(id) => id,
            Err(e) => return abort(run, AbortReason::Commit(e), console),
        };
        info!("Committed {} with message '{}'", commit_id, message);
        console.say("Changes committed!");
        run.outcome = Outcome::Committed { message, commit_id };

        if let Some(trigger) = self.reports {
            run.enter(Stage::Report);
            console.say("Generating reports...");
            let summary = trigger.fire().await;
            for target in &summary.written {
                console.say(&format!("Report written: {target}"));
            }
            for skipped in &summary.skipped {
                console.say(&format!("Report skipped: {skipped}"));
            }
            for failure in &summary.failures {
                console.say(&format!("Report failed: {failure}"));
            }
            run.reports = Some(summary);
        }

        run.enter(Stage::Done);
        run
    }

    fn apply(&self, message: &str) -> Result<String, CommitError> {
        if message.trim().is_empty() {
            return Err(CommitError::EmptyMessage);
        }
        self.vcs.commit(message).map_err(CommitError::ApplyFailed)
    }
}

fn abort(mut run: WorkflowRun, reason: AbortReason, console: &mut dyn Console) -> WorkflowRun {
    debug!("Aborting after {:?}: {}", run.last_stage(), reason);
    console.say(&reason.to_string());
    run.enter(Stage::Aborted);
    run.outcome = Outcome::Aborted(reason);
    run
}
