//! Text-generation backend and prompt construction.

pub mod client;
pub mod prompt;

pub use client::{ChatCompletionsClient, CompletionBackend, CompletionRequest};
pub use prompt::{build_commit_prompt, build_impact_prompt, build_pr_description_prompt};
