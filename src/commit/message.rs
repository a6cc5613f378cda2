//! Candidate commit message generation.

use tracing::debug;

use crate::error::ServiceError;
use crate::git::Diff;
use crate::llm::client::{CompletionBackend, CompletionRequest};
use crate::llm::prompt::{COMMIT_SYSTEM_PROMPT, build_commit_prompt};

/// Default completion budget for a single commit message.
pub const DEFAULT_MAX_TOKENS: u32 = 200;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Ordered candidate commit messages, never empty.
///
/// Order is the backend's order and duplicates are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSet {
    messages: Vec<String>,
}

impl CandidateSet {
    /// Returns `None` when `messages` is empty.
    pub fn new(messages: Vec<String>) -> Option<Self> {
        if messages.is_empty() {
            None
        } else {
            Some(Self { messages })
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Zero-based lookup.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.messages.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(String::as_str)
    }
}

/// Produces candidate messages from a staged diff.
pub struct MessageGenerator<'a> {
    backend: &'a dyn CompletionBackend,
}

impl<'a> MessageGenerator<'a> {
    pub fn new(backend: &'a dyn CompletionBackend) -> Self {
        Self { backend }
    }

    /// Request `count` candidates in one backend call.
    pub async fn generate(
        &self,
        diff: &Diff,
        language: &str,
        count: usize,
    ) -> Result<CandidateSet, ServiceError> {
        if count == 0 {
            return Err(ServiceError::InvalidCount(count));
        }

        let request = CompletionRequest {
            system_prompt: COMMIT_SYSTEM_PROMPT.to_string(),
            user_prompt: build_commit_prompt(diff.text(), language),
            count,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        };

        debug!(
            "Requesting {} candidate(s) for {}",
            count,
            diff.summary()
        );

        let raw = self.backend.complete(&request).await?;
        let received = raw.len();

        let messages: Vec<String> = raw
            .iter()
            .map(|choice| normalize_message(choice))
            .filter(|message| !message.is_empty())
            .collect();

        if messages.len() < received {
            debug!(
                "Dropped {} empty choice(s) out of {}",
                received - messages.len(),
                received
            );
        }

        CandidateSet::new(messages).ok_or(ServiceError::NoChoices)
    }
}

/// Trim a raw choice and fold line breaks into single spaces.
pub fn normalize_message(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
