//! Run configuration, built once at startup and passed by reference.
//!
//! Values come from the process environment (after `.env` is loaded) and
//! can be overridden by CLI flags. Nothing else in the crate reads the
//! environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::git::DiffScope;

/// Credential variables, in lookup order.
pub const API_KEY_VARS: [&str; 2] = ["OPENAI_API_KEY", "AZURE_OPENAI_API_KEY"];

/// GitHub token variables, in lookup order.
pub const GITHUB_TOKEN_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_AZURE_API_VERSION: &str = "2025-01-01-preview";
const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_CANDIDATES: usize = 5;
const DEFAULT_REMOTE: &str = "origin";
const DEFAULT_BASE_BRANCH: &str = "master";
const DEFAULT_REPORT_DIR: &str = ".github";

/// Where chat-completion requests are sent and how they authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Azure OpenAI deployment; authenticates with an `api-key` header.
    Azure {
        resource_url: String,
        deployment: String,
        api_version: String,
    },
    /// OpenAI-compatible API; authenticates with a bearer token.
    OpenAi { base_url: String, model: String },
}

impl Endpoint {
    /// Full chat-completions URL.
    pub fn url(&self) -> String {
        match self {
            Endpoint::Azure {
                resource_url,
                deployment,
                api_version,
            } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                resource_url.trim_end_matches('/'),
                deployment,
                api_version
            ),
            Endpoint::OpenAi { base_url, .. } => {
                format!("{}/chat/completions", base_url.trim_end_matches('/'))
            }
        }
    }
}

/// Text-generation backend settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub api_key: String,
    pub endpoint: Endpoint,
    /// Optional HTTP timeout. Unset means the request may block indefinitely.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Which ledger back-end receives impact-report rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerKind {
    Csv,
    None,
}

impl FromStr for LedgerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(LedgerKind::Csv),
            "none" | "off" => Ok(LedgerKind::None),
            other => Err(format!("expected 'csv' or 'none', got '{other}'")),
        }
    }
}

/// Pull request whose body receives the generated description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubTarget {
    pub number: u64,
    /// `owner/repo`; derived from the remote URL when unset.
    pub repository: Option<String>,
}

/// Post-commit report settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub enabled: bool,
    pub output_dir: PathBuf,
    pub ledger: LedgerKind,
    pub github: Option<GitHubTarget>,
    /// Token from the environment; the gh CLI is still asked first.
    pub github_token: Option<String>,
}

impl std::fmt::Debug for ReportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportConfig")
            .field("enabled", &self.enabled)
            .field("output_dir", &self.output_dir)
            .field("ledger", &self.ledger)
            .field("github", &self.github)
            .field(
                "github_token",
                &self.github_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl ReportConfig {
    pub fn pr_description_path(&self) -> PathBuf {
        self.output_dir.join("PR_description.md")
    }

    pub fn impact_report_path(&self) -> PathBuf {
        self.output_dir.join("IMPACT_REPORT.md")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.output_dir.join("PR_Report.csv")
    }
}

/// Complete configuration for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub service: ServiceConfig,
    pub language: String,
    pub candidates: usize,
    pub remote: String,
    pub base_branch: String,
    pub diff_scope: DiffScope,
    pub reports: ReportConfig,
}

/// CLI flags that take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub language: Option<String>,
    pub candidates: Option<usize>,
    pub remote: Option<String>,
    pub base_branch: Option<String>,
    pub per_file: bool,
    pub no_reports: bool,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration through `lookup`, treating empty values as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = API_KEY_VARS
            .iter()
            .find_map(|&key| get(key))
            .ok_or(ConfigError::MissingCredential(API_KEY_VARS[0]))?;

        let endpoint = match get("AICOMMIT_AZURE_ENDPOINT") {
            Some(resource_url) => Endpoint::Azure {
                resource_url,
                deployment: get("AICOMMIT_AZURE_DEPLOYMENT")
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                api_version: get("AICOMMIT_AZURE_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
            },
            None => Endpoint::OpenAi {
                base_url: get("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                model: get("AICOMMIT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            },
        };

        let timeout = match get("AICOMMIT_TIMEOUT_SECS") {
            Some(v) => Some(Duration::from_secs(parse_value(
                "AICOMMIT_TIMEOUT_SECS",
                &v,
            )?)),
            None => None,
        };

        let candidates = match get("AICOMMIT_CANDIDATES") {
            Some(v) => parse_value("AICOMMIT_CANDIDATES", &v)?,
            None => DEFAULT_CANDIDATES,
        };

        let diff_scope = match get("AICOMMIT_DIFF_SCOPE") {
            Some(v) => parse_value("AICOMMIT_DIFF_SCOPE", &v)?,
            None => DiffScope::WholeTree,
        };

        let enabled = match get("AICOMMIT_REPORTS") {
            Some(v) => parse_bool("AICOMMIT_REPORTS", &v)?,
            None => true,
        };

        let ledger = match get("AICOMMIT_LEDGER") {
            Some(v) => parse_value("AICOMMIT_LEDGER", &v)?,
            None => LedgerKind::Csv,
        };

        let github = match get("PR_NUMBER") {
            Some(v) => Some(GitHubTarget {
                number: parse_value("PR_NUMBER", &v)?,
                repository: get("GITHUB_REPOSITORY"),
            }),
            None => None,
        };

        let config = Config {
            service: ServiceConfig {
                api_key,
                endpoint,
                timeout,
            },
            language: get("AICOMMIT_LANGUAGE").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            candidates,
            remote: get("AICOMMIT_REMOTE").unwrap_or_else(|| DEFAULT_REMOTE.to_string()),
            base_branch: get("AICOMMIT_BASE_BRANCH")
                .unwrap_or_else(|| DEFAULT_BASE_BRANCH.to_string()),
            diff_scope,
            reports: ReportConfig {
                enabled,
                output_dir: get("AICOMMIT_REPORT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_DIR)),
                ledger,
                github,
                github_token: GITHUB_TOKEN_VARS.iter().find_map(|&key| get(key)),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI flags on top of the environment values.
    pub fn with_overrides(mut self, overrides: Overrides) -> Result<Self, ConfigError> {
        if let Some(language) = overrides.language {
            self.language = language;
        }
        if let Some(candidates) = overrides.candidates {
            self.candidates = candidates;
        }
        if let Some(remote) = overrides.remote {
            self.remote = remote;
        }
        if let Some(base_branch) = overrides.base_branch {
            self.base_branch = base_branch;
        }
        if overrides.per_file {
            self.diff_scope = DiffScope::PerFile;
        }
        if overrides.no_reports {
            self.reports.enabled = false;
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.candidates == 0 {
            return Err(ConfigError::InvalidValue {
                key: "AICOMMIT_CANDIDATES",
                value: "0".to_string(),
                reason: "at least one candidate is required".to_string(),
            });
        }
        if self.language.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "AICOMMIT_LANGUAGE",
                value: self.language.clone(),
                reason: "language must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_value<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}
