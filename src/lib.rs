//! aicommit - A CLI tool that writes commit messages from staged changes.
//!
//! # Overview
//!
//! aicommit checks for merge conflicts, captures the staged diff, asks an
//! OpenAI-compatible chat-completions backend for several candidate
//! messages, lets the user pick one, and commits with it. After a
//! successful commit it writes a pull-request description and a
//! change-impact report.

pub mod commit;
pub mod config;
pub mod conflict;
pub mod console;
pub mod error;
pub mod git;
pub mod llm;
pub mod report;
pub mod workflow;

// Re-export commonly used types
pub use commit::{CandidateSet, MessageGenerator, Selection, SelectionAbort};
pub use config::Config;
pub use conflict::{ConflictGuard, ConflictState};
pub use console::{Console, ScriptedConsole, TerminalConsole};
pub use error::{CommitError, ConfigError, GitError, PromptError, ReportError, ServiceError};
pub use git::{Diff, DiffScope, GitRepository, VersionControl};
pub use workflow::{AbortReason, CommitWorkflow, Outcome, Stage, WorkflowOptions, WorkflowRun};
