//! Report persistence targets.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::ReportError;
use crate::report::Report;

/// Header row for the CSV ledger.
pub const LEDGER_HEADER: &str = "Date,GitHub Username,Commit Message,Impacted Modules Summary";

/// Maximum characters of report text kept in a ledger row.
pub const LEDGER_SUMMARY_LIMIT: usize = 1000;

const NOT_AVAILABLE: &str = "N/A";

/// A place a generated report is persisted to.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Human-readable target, used in progress output.
    fn name(&self) -> String;

    async fn persist(&self, report: &Report) -> Result<(), ReportError>;
}

/// Writes the report body to a markdown file, replacing it atomically.
#[derive(Debug, Clone)]
pub struct MarkdownSink {
    path: PathBuf,
}

impl MarkdownSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ReportSink for MarkdownSink {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    async fn persist(&self, report: &Report) -> Result<(), ReportError> {
        let mut body = report.body.trim_end().to_string();
        body.push('\n');
        write_atomic(&self.path, body.as_bytes())
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ReportError> {
    let write_failed = |source| ReportError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(write_failed)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(write_failed)?;
    tmp.write_all(contents).map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;

    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

/// Appends one row per report to a CSV ledger.
#[derive(Debug, Clone)]
pub struct CsvLedgerSink {
    path: PathBuf,
}

impl CsvLedgerSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ReportSink for CsvLedgerSink {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    async fn persist(&self, report: &Report) -> Result<(), ReportError> {
        let write_failed = |source| ReportError::WriteFailed {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(write_failed)?;

        let mut out = String::new();
        if needs_header {
            out.push_str(LEDGER_HEADER);
            out.push('\n');
        }
        out.push_str(&ledger_row(report));
        out.push('\n');

        file.write_all(out.as_bytes()).map_err(write_failed)?;
        Ok(())
    }
}

/// Format one ledger row for `report`.
pub fn ledger_row(report: &Report) -> String {
    let date = report.created_at.format("%Y-%m-%d %H:%M").to_string();
    let author = non_empty_or_na(report.author.as_deref());
    let message = non_empty_or_na(report.commit_message.as_deref());
    let summary = summarize(&report.body, LEDGER_SUMMARY_LIMIT);

    [date.as_str(), author, message, summary.as_str()]
        .iter()
        .map(|field| csv_field(field))
        .collect::<Vec<_>>()
        .join(",")
}

fn non_empty_or_na(value: Option<&str>) -> &str {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_AVAILABLE)
}

/// Truncate to `limit` chars, appending `...` when anything was cut.
fn summarize(text: &str, limit: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit).collect();
    out.push_str("...");
    out
}

/// Quote a field when it contains a delimiter, quote, or line break.
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportKind;
    use chrono::{Local, TimeZone};

    fn report(body: &str) -> Report {
        Report {
            kind: ReportKind::Impact,
            body: body.to_string(),
            author: Some("Ada Lovelace".to_string()),
            commit_message: Some("fix bug".to_string()),
            created_at: Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap(),
        }
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn test_ledger_row_format() {
        let row = ledger_row(&report("APIs Affected: none"));
        assert_eq!(
            row,
            "2024-03-09 14:05,Ada Lovelace,fix bug,APIs Affected: none"
        );
    }

    #[test]
    fn test_ledger_row_falls_back_to_na() {
        let mut r = report("x");
        r.author = None;
        r.commit_message = Some("   ".to_string());
        let row = ledger_row(&r);
        assert!(row.starts_with("2024-03-09 14:05,N/A,N/A,"));
    }

    #[test]
    fn test_summarize_truncates_with_ellipsis() {
        let long = "é".repeat(LEDGER_SUMMARY_LIMIT + 5);
        let summary = summarize(&long, LEDGER_SUMMARY_LIMIT);
        assert!(summary.ends_with("..."));
        assert_eq!(summary.chars().count(), LEDGER_SUMMARY_LIMIT + 3);

        assert_eq!(summarize("short", LEDGER_SUMMARY_LIMIT), "short");
    }

    #[tokio::test]
    async fn test_markdown_sink_creates_directory_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".github").join("IMPACT_REPORT.md");
        let sink = MarkdownSink::new(&path);

        sink.persist(&report("first")).await.unwrap();
        sink.persist(&report("second\n\n")).await.unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second\n");
    }

    #[tokio::test]
    async fn test_csv_ledger_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("PR_Report.csv");
        let sink = CsvLedgerSink::new(&path);

        sink.persist(&report("one")).await.unwrap();
        sink.persist(&report("two, with comma")).await.unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], LEDGER_HEADER);
        assert!(lines[1].ends_with(",one"));
        assert!(lines[2].ends_with(",\"two, with comma\""));
    }
}
