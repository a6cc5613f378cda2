//! Prompt construction for commit messages and post-commit reports.

/// Maximum length for sanitized diff text.
pub const MAX_DIFF_SANITIZED_LENGTH: usize = 30_000;

pub const COMMIT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that generates git commit messages.";

pub const PR_DESCRIPTION_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that writes GitHub pull request descriptions.";

pub const IMPACT_SYSTEM_PROMPT: &str = "You are a senior developer reviewing code changes.";

/// Build the user prompt asking for one commit message.
pub fn build_commit_prompt(diff_text: &str, language: &str) -> String {
    let sanitized = sanitize_diff(diff_text, MAX_DIFF_SANITIZED_LENGTH);
    format!(
        "What follows '-------' is a git diff for a potential commit. \
         Reply with an appropriate git commit message: concise, but describing the important changes. \
         Reply with the message only, on a single line, with no other text.\n\
         Write the message in this language: {language}\n\
         -------\n\
         {sanitized}"
    )
}

/// Build the prompt for a pull-request description from a `--name-status` listing.
pub fn build_pr_description_prompt(base_branch: &str, diff_text: &str) -> String {
    let sanitized = sanitize_diff(diff_text, MAX_DIFF_SANITIZED_LENGTH);
    format!(
        r#"You write professional, structured GitHub pull request descriptions.

The current branch is compared against `{base_branch}`. From the git diff output below, write a PR description that:
- explains what changed and why
- mentions the files changed
- highlights impacted areas or modules
- groups changes by purpose (bug fix, refactor, optimization, ...)
- uses markdown formatting

Use this structure:

### Description
In this PR, I [main issue addressed or feature added]. The following areas were impacted:

### Files Changed
The major files or modules changed, with a short reason for each.

### Impact Areas
Which functionality, APIs or modules were affected and why.

### Summary of Changes
- [a fix, rename, or optimization]
- [a refactor, logic update, or cleanup]
- [any performance or readability improvement]

Git diff to analyze:

{sanitized}
"#
    )
}

/// Build the prompt for a change-impact report.
pub fn build_impact_prompt(diff_text: &str) -> String {
    let sanitized = sanitize_diff(diff_text, MAX_DIFF_SANITIZED_LENGTH);
    format!(
        r#"You are an expert code reviewer and software architect.

Given the following git diff from a project that may include both backend and frontend code, write an Impact Area Analysis Report with these sections:

- **APIs Affected**
- **Modules Changed (Backend)**
- **Frontend Changes**
- **Reasoning**

Git diff:
{sanitized}
"#
    )
}

/// Sanitize diff text for inclusion in a prompt.
///
/// Removes control characters (except newlines and tabs) and ANSI escape
/// sequences, then truncates to `max_len` bytes on a char boundary.
pub fn sanitize_diff(text: &str, max_len: usize) -> String {
    let mut result = remove_ansi_escapes(text);
    result = remove_control_chars(&result);

    if result.len() > max_len {
        let mut end = max_len;
        while end > 0 && !result.is_char_boundary(end) {
            end -= 1;
        }
        result.truncate(end);
    }

    result
}

fn remove_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Strip CSI sequences (`ESC [ ... final-byte`) and lone escapes.
fn remove_ansi_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'[') {
            chars.next();
            for next in chars.by_ref() {
                if ('@'..='~').contains(&next) {
                    break;
                }
            }
        }
    }

    out
}
