//! Post-commit report generation.
//!
//! After a successful commit the workflow fires a [`ReportTrigger`]. The
//! production trigger, [`ReportPipeline`], generates a pull-request
//! description and a change-impact report and hands each to its sinks.
//! Every failure here is logged and summarized; none of it can undo the commit.

pub mod github;
pub mod sink;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::config::{Config, LedgerKind};
use crate::error::{ReportError, ServiceError};
use crate::git::VersionControl;
use crate::llm::client::{CompletionBackend, CompletionRequest};
use crate::llm::prompt::{
    IMPACT_SYSTEM_PROMPT, PR_DESCRIPTION_SYSTEM_PROMPT, build_impact_prompt,
    build_pr_description_prompt,
};

pub use github::{GitHubPrSink, get_github_token, parse_github_remote, parse_repository_slug};
pub use sink::{CsvLedgerSink, MarkdownSink, ReportSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    PrDescription,
    Impact,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::PrDescription => write!(f, "PR description"),
            ReportKind::Impact => write!(f, "impact report"),
        }
    }
}

/// A generated report plus the commit context sinks may record.
#[derive(Debug, Clone)]
pub struct Report {
    pub kind: ReportKind,
    pub body: String,
    pub author: Option<String>,
    pub commit_message: Option<String>,
    pub created_at: DateTime<Local>,
}

/// What one trigger invocation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    /// Sink names that were written.
    pub written: Vec<String>,
    /// Reports skipped, with the reason.
    pub skipped: Vec<String>,
    /// Human-readable failures.
    pub failures: Vec<String>,
}

impl ReportSummary {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Best-effort follow-on work after a commit lands.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportTrigger: Send + Sync {
    async fn fire(&self) -> ReportSummary;
}

/// Generation parameters for one report kind.
#[derive(Debug, Clone, Copy)]
struct ReportParams {
    kind: ReportKind,
    max_tokens: u32,
    temperature: f32,
}

const PR_DESCRIPTION: ReportParams = ReportParams {
    kind: ReportKind::PrDescription,
    max_tokens: 500,
    temperature: 0.7,
};

const IMPACT: ReportParams = ReportParams {
    kind: ReportKind::Impact,
    max_tokens: 800,
    temperature: 0.5,
};

/// Generates both reports from the committed branch and persists them.
pub struct ReportPipeline<'a> {
    vcs: &'a dyn VersionControl,
    backend: &'a dyn CompletionBackend,
    remote: String,
    base_branch: String,
    pr_sinks: Vec<Box<dyn ReportSink + 'a>>,
    impact_sinks: Vec<Box<dyn ReportSink + 'a>>,
}

impl<'a> ReportPipeline<'a> {
    pub fn new(
        vcs: &'a dyn VersionControl,
        backend: &'a dyn CompletionBackend,
        remote: impl Into<String>,
        base_branch: impl Into<String>,
    ) -> Self {
        Self {
            vcs,
            backend,
            remote: remote.into(),
            base_branch: base_branch.into(),
            pr_sinks: Vec::new(),
            impact_sinks: Vec::new(),
        }
    }

    /// Build the pipeline and its sink set from configuration.
    ///
    /// The GitHub sink is added only when a target is configured and a
    /// token is supplied; an unresolvable repository is logged and skipped.
    pub fn from_config(
        config: &Config,
        vcs: &'a dyn VersionControl,
        backend: &'a dyn CompletionBackend,
        github_token: Option<&str>,
    ) -> Self {
        let reports = &config.reports;
        let mut pipeline = Self::new(vcs, backend, &config.remote, &config.base_branch)
            .with_pr_sink(MarkdownSink::new(reports.pr_description_path()))
            .with_impact_sink(MarkdownSink::new(reports.impact_report_path()));

        if reports.ledger == LedgerKind::Csv {
            pipeline = pipeline.with_impact_sink(CsvLedgerSink::new(reports.ledger_path()));
        }

        if let (Some(target), Some(token)) = (&reports.github, github_token) {
            let repository = match &target.repository {
                Some(slug) => parse_repository_slug(slug),
                None => match vcs.remote_url(&config.remote) {
                    Ok(Some(url)) => parse_github_remote(&url),
                    Ok(None) => Err(ReportError::InvalidRepositoryUrl(format!(
                        "<no url for remote '{}'>",
                        config.remote
                    ))),
                    Err(e) => Err(ReportError::Git(e)),
                },
            };

            match repository
                .and_then(|(owner, repo)| GitHubPrSink::new(token, &owner, &repo, target.number))
            {
                Ok(sink) => pipeline = pipeline.with_pr_sink(sink),
                Err(e) => warn!("GitHub PR sink disabled: {}", e),
            }
        }

        pipeline
    }

    pub fn with_pr_sink(mut self, sink: impl ReportSink + 'a) -> Self {
        self.pr_sinks.push(Box::new(sink));
        self
    }

    pub fn with_impact_sink(mut self, sink: impl ReportSink + 'a) -> Self {
        self.impact_sinks.push(Box::new(sink));
        self
    }

    /// `<remote>/<base>...HEAD` as a name-status listing.
    fn pr_range(&self) -> String {
        format!("{}/{}...HEAD", self.remote, self.base_branch)
    }

    /// `<base>..HEAD` as a full patch.
    fn impact_range(&self) -> String {
        format!("{}..HEAD", self.base_branch)
    }

    async fn generate(&self, params: ReportParams, diff: &str) -> Result<String, ReportError> {
        let (system_prompt, user_prompt) = match params.kind {
            ReportKind::PrDescription => (
                PR_DESCRIPTION_SYSTEM_PROMPT,
                build_pr_description_prompt(&self.base_branch, diff),
            ),
            ReportKind::Impact => (IMPACT_SYSTEM_PROMPT, build_impact_prompt(diff)),
        };

        let request = CompletionRequest {
            system_prompt: system_prompt.to_string(),
            user_prompt,
            count: 1,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        let choices = self.backend.complete(&request).await?;
        let first = choices.into_iter().next().ok_or(ServiceError::NoChoices)?;
        let body = first.trim();
        if body.is_empty() {
            return Err(ReportError::EmptyReport);
        }
        Ok(body.to_string())
    }

    async fn run_one(
        &self,
        params: ReportParams,
        range: &str,
        name_status: bool,
        sinks: &[Box<dyn ReportSink + 'a>],
        summary: &mut ReportSummary,
    ) {
        let diff = match self.vcs.range_diff(range, name_status) {
            Ok(diff) => diff,
            Err(e) => {
                warn!("Skipping {}: {}", params.kind, e);
                summary.failures.push(format!("{}: {}", params.kind, e));
                return;
            }
        };

        if diff.trim().is_empty() {
            info!("No changes in {}; skipping {}", range, params.kind);
            summary
                .skipped
                .push(format!("{}: no changes in {}", params.kind, range));
            return;
        }

        let body = match self.generate(params, &diff).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to generate {}: {}", params.kind, e);
                summary.failures.push(format!("{}: {}", params.kind, e));
                return;
            }
        };

        let report = Report {
            kind: params.kind,
            body,
            author: self.vcs.user_name().ok(),
            commit_message: self.vcs.last_commit_message().ok(),
            created_at: Local::now(),
        };

        for sink in sinks {
            match sink.persist(&report).await {
                Ok(()) => {
                    debug!("{} written to {}", params.kind, sink.name());
                    summary.written.push(sink.name());
                }
                Err(e) => {
                    warn!("Failed to persist {} to {}: {}", params.kind, sink.name(), e);
                    summary
                        .failures
                        .push(format!("{} -> {}: {}", params.kind, sink.name(), e));
                }
            }
        }
    }
}

#[async_trait]
impl ReportTrigger for ReportPipeline<'_> {
    async fn fire(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();

        let pr_range = self.pr_range();
        self.run_one(PR_DESCRIPTION, &pr_range, true, &self.pr_sinks, &mut summary)
            .await;

        let impact_range = self.impact_range();
        self.run_one(IMPACT, &impact_range, false, &self.impact_sinks, &mut summary)
            .await;

        summary
    }
}
