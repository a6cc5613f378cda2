//! AI-generated commit messages and interactive selection.

pub mod message;
pub mod select;

pub use message::{CandidateSet, MessageGenerator, normalize_message};
pub use select::{Selection, SelectionAbort, select};
