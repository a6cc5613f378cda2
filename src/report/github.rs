//! Pull-request body sink backed by the GitHub REST API.
//!
//! Auth order:
//! 1. `gh auth token` (gh CLI)
//! 2. the token resolved from configuration (GITHUB_TOKEN, then GH_TOKEN)

use std::process::Command;

use async_trait::async_trait;
use octocrab::Octocrab;
use serde_json::json;
use tracing::debug;

use crate::error::ReportError;
use crate::report::Report;
use crate::report::sink::ReportSink;

/// Get a GitHub token from the gh CLI, falling back to `configured`.
pub fn get_github_token(configured: Option<&str>) -> Result<String, ReportError> {
    if let Some(token) = get_token_from_gh_cli() {
        return Ok(token);
    }

    configured
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(String::from)
        .ok_or(ReportError::GitHubAuth)
}

fn get_token_from_gh_cli() -> Option<String> {
    let status = Command::new("gh").args(["auth", "status"]).output().ok()?;
    if !status.status.success() {
        return None;
    }

    let output = Command::new("gh").args(["auth", "token"]).output().ok()?;
    if output.status.success() {
        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !token.is_empty() {
            return Some(token);
        }
    }

    None
}

/// Extract owner and repo from a git remote URL.
pub fn parse_github_remote(url: &str) -> Result<(String, String), ReportError> {
    let invalid = || ReportError::InvalidRepositoryUrl(url.to_string());

    if let Some(path) = url.strip_prefix("git@github.com:") {
        return parse_owner_repo_path(path).ok_or_else(invalid);
    }

    if let Some(path) = url.split("github.com/").nth(1) {
        return parse_owner_repo_path(path).ok_or_else(invalid);
    }

    Err(invalid())
}

/// Parse an `owner/repo` slug, as found in `GITHUB_REPOSITORY`.
pub fn parse_repository_slug(slug: &str) -> Result<(String, String), ReportError> {
    parse_owner_repo_path(slug).ok_or_else(|| ReportError::InvalidRepositoryUrl(slug.to_string()))
}

fn parse_owner_repo_path(path: &str) -> Option<(String, String)> {
    let path = path.trim().trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let mut parts = path.split('/');

    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
            Some((owner.to_string(), repo.to_string()))
        }
        _ => None,
    }
}

/// Replaces the body of one pull request with the report text.
pub struct GitHubPrSink {
    client: Octocrab,
    owner: String,
    repo: String,
    number: u64,
}

impl GitHubPrSink {
    pub fn new(token: &str, owner: &str, repo: &str, number: u64) -> Result<Self, ReportError> {
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .map_err(|e| ReportError::GitHub {
                number,
                source: Box::new(e),
            })?;
        Ok(Self::with_client(client, owner, repo, number))
    }

    /// Use a pre-configured octocrab client (e.g. pointed at a mock server).
    pub fn with_client(client: Octocrab, owner: &str, repo: &str, number: u64) -> Self {
        Self {
            client,
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
        }
    }
}

#[async_trait]
impl ReportSink for GitHubPrSink {
    fn name(&self) -> String {
        format!("{}/{}#{}", self.owner, self.repo, self.number)
    }

    async fn persist(&self, report: &Report) -> Result<(), ReportError> {
        let route = format!("/repos/{}/{}/pulls/{}", self.owner, self.repo, self.number);
        debug!("PATCH {} ({} chars)", route, report.body.len());

        let _: serde_json::Value = self
            .client
            .patch(route, Some(&json!({ "body": report.body })))
            .await
            .map_err(|e| ReportError::GitHub {
                number: self.number,
                source: Box::new(e),
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ssh_url() {
        let (owner, repo) = parse_github_remote("git@github.com:owner/repo.git").unwrap();
        assert_eq!(owner, "owner");
        assert_eq!(repo, "repo");
    }

    #[test]
    fn test_parse_https_url() {
        let (owner, repo) = parse_github_remote("https://github.com/owner/repo.git").unwrap();
        assert_eq!(owner, "owner");
        assert_eq!(repo, "repo");
    }

    #[test]
    fn test_parse_https_url_no_git_suffix() {
        let (owner, repo) = parse_github_remote("https://github.com/owner/repo/").unwrap();
        assert_eq!((owner.as_str(), repo.as_str()), ("owner", "repo"));
    }

    #[test]
    fn test_parse_invalid_url() {
        assert!(parse_github_remote("https://gitlab.com/owner/repo").is_err());
        assert!(parse_github_remote("git@github.com:owner").is_err());
    }

    #[test]
    fn test_parse_repository_slug() {
        let (owner, repo) = parse_repository_slug("octo/widgets").unwrap();
        assert_eq!((owner.as_str(), repo.as_str()), ("octo", "widgets"));
        assert!(matches!(
            parse_repository_slug("widgets"),
            Err(ReportError::InvalidRepositoryUrl(_))
        ));
    }

    #[test]
    fn test_configured_token_fallback() {
        // Only meaningful when gh is not authenticated on the machine.
        if get_token_from_gh_cli().is_some() {
            return;
        }
        assert_eq!(get_github_token(Some(" gh-token ")).unwrap(), "gh-token");
        assert!(matches!(get_github_token(Some("")), Err(ReportError::GitHubAuth)));
        assert!(matches!(get_github_token(None), Err(ReportError::GitHubAuth)));
    }
}
