//! aicommit - CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use aicommit::config::{Config, Overrides};
use aicommit::console::TerminalConsole;
use aicommit::git::{GitRepository, check_git_installed};
use aicommit::llm::ChatCompletionsClient;
use aicommit::report::{ReportPipeline, get_github_token};
use aicommit::workflow::{CommitWorkflow, Outcome, WorkflowOptions};

/// Generate a commit message for the staged changes, commit, and write PR/impact reports.
#[derive(Parser, Debug)]
#[command(name = "aicommit")]
#[command(about = "Generate commit messages from staged changes with an AI backend")]
#[command(version)]
struct Cli {
    /// Language for the generated commit messages (e.g. en, de, ja)
    #[arg(short, long)]
    language: Option<String>,

    /// Number of candidate messages to request
    #[arg(short = 'n', long)]
    count: Option<usize>,

    /// Remote to fetch from and pull conflicts against
    #[arg(long)]
    remote: Option<String>,

    /// Base branch used for conflict remediation and reports
    #[arg(long)]
    base_branch: Option<String>,

    /// Build the diff file by file instead of as one patch
    #[arg(long)]
    per_file: bool,

    /// Skip PR description and impact report generation
    #[arg(long)]
    no_reports: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            language: self.language.clone(),
            candidates: self.count,
            remote: self.remote.clone(),
            base_branch: self.base_branch.clone(),
            per_file: self.per_file,
            no_reports: self.no_reports,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env file is fine; variables may come from the shell.
    dotenv::dotenv().ok();
    init_tracing(cli.verbose);

    // Step 1: Preconditions. Everything here is fatal.
    check_git_installed().context("git is required")?;

    let config = Config::from_env()
        .and_then(|config| config.with_overrides(cli.overrides()))
        .context("Invalid configuration")?;

    let repo = GitRepository::discover(".", config.remote.clone())
        .context("Not a git repository. Run aicommit from within a git repository.")?;

    let client = ChatCompletionsClient::new(&config.service)
        .context("Failed to build the text-generation client")?;

    // Step 2: Report wiring (best-effort; never blocks the commit)
    let github_token = if config.reports.enabled && config.reports.github.is_some() {
        match get_github_token(config.reports.github_token.as_deref()) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("Skipping pull request update: {}", e);
                None
            }
        }
    } else {
        None
    };
    let pipeline = ReportPipeline::from_config(&config, &repo, &client, github_token.as_deref());

    // Step 3: Run the workflow
    let mut workflow = CommitWorkflow::new(&repo, &client, WorkflowOptions::from(&config));
    if config.reports.enabled {
        workflow = workflow.with_reports(&pipeline);
    }

    let mut console = TerminalConsole;
    let run = workflow.run(&mut console).await;

    if let Outcome::Committed { commit_id, .. } = &run.outcome {
        println!("Commit {commit_id} created.");
    }

    // Declines and aborts are normal endings, not process failures.
    Ok(())
}
