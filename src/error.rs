//! Error types for aicommit modules using thiserror.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building the run configuration.
///
/// All of these are fatal and are raised before any git or network side effect.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Missing credential: set {0} (or add it to a .env file) to authenticate with the text-generation backend"
    )]
    MissingCredential(&'static str),

    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("git executable not found on PATH. Install git and try again.")]
    GitNotInstalled,
}

/// Errors from version-control operations.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Not a git repository (or any parent directory): {0}")]
    NotARepository(#[source] git2::Error),

    #[error("Failed to run git {operation}: {source}")]
    SpawnFailed {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {operation} failed{}: {stderr}", code.map(|c| format!(" (exit code {c})")).unwrap_or_default())]
    CommandFailed {
        operation: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to {operation}: {source}")]
    Repository {
        operation: &'static str,
        #[source]
        source: git2::Error,
    },
}

impl GitError {
    pub(crate) fn repository(operation: &'static str) -> impl FnOnce(git2::Error) -> GitError {
        move |source| GitError::Repository { operation, source }
    }
}

/// Errors from the text-generation backend.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Text-generation backend unreachable: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Text-generation backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Text-generation backend returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Text-generation backend returned no choices")]
    NoChoices,

    #[error("Requested {0} candidates; at least one is required")]
    InvalidCount(usize),
}

/// Errors from applying the selected commit.
#[derive(Error, Debug)]
pub enum CommitError {
    #[error("Refusing to commit with an empty message")]
    EmptyMessage,

    #[error("Failed to create commit: {0}")]
    ApplyFailed(#[source] GitError),
}

/// Errors from interactive prompting.
#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Failed to read input: {0}")]
    Terminal(#[source] dialoguer::Error),

    #[error("Failed to read input: {0}")]
    Read(#[source] std::io::Error),

    #[error("No answer available for '{0}'")]
    Exhausted(String),
}

/// Errors from post-commit report generation and persistence.
///
/// These are logged and never fail a run whose commit succeeded.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to read changes for report: {0}")]
    Git(#[from] GitError),

    #[error("Failed to generate report: {0}")]
    Service(#[from] ServiceError),

    #[error("Generated report was empty")]
    EmptyReport,

    #[error("Failed to write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "GitHub authentication failed: no valid auth found. Run 'gh auth login' or set GITHUB_TOKEN environment variable"
    )]
    GitHubAuth,

    #[error("Failed to parse repository URL '{0}'")]
    InvalidRepositoryUrl(String),

    #[error("Failed to update pull request #{number}: {source}")]
    GitHub {
        number: u64,
        #[source]
        source: Box<octocrab::Error>,
    },
}
