//! Interactive candidate selection.

use std::fmt;

use tracing::debug;

use crate::commit::message::CandidateSet;
use crate::console::Console;

/// Why a selection ended without a choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionAbort {
    /// The answer was not an integer.
    InvalidInput,
    /// The integer was outside `1..=len`.
    OutOfRange,
    /// The console could not read an answer.
    InputUnavailable,
}

impl fmt::Display for SelectionAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionAbort::InvalidInput => write!(f, "invalid input"),
            SelectionAbort::OutOfRange => write!(f, "selection out of range"),
            SelectionAbort::InputUnavailable => write!(f, "input unavailable"),
        }
    }
}

/// Result of one selection prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// `index` is zero-based into the candidate set.
    Chosen { index: usize, confirmed: bool },
    Aborted(SelectionAbort),
}

impl Selection {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Selection::Chosen { confirmed: true, .. })
    }
}

/// Present `candidates` as a numbered list and resolve one choice.
///
/// There is no retry: a bad answer aborts immediately.
pub fn select(candidates: &CandidateSet, console: &mut dyn Console) -> Selection {
    console.say("Please choose one of the following commit messages:");
    for (i, message) in candidates.iter().enumerate() {
        console.say(&format!("{}. {}", i + 1, message));
    }

    let answer = match console.prompt("Enter the number of your choice") {
        Ok(answer) => answer,
        Err(e) => {
            debug!("Selection prompt failed: {}", e);
            console.say("No input available; aborting.");
            return Selection::Aborted(SelectionAbort::InputUnavailable);
        }
    };

    let number: i64 = match answer.trim().parse() {
        Ok(n) => n,
        Err(_) => {
            console.say("Invalid input. Please enter a number.");
            return Selection::Aborted(SelectionAbort::InvalidInput);
        }
    };

    let len = candidates.len();
    let index = match usize::try_from(number) {
        Ok(n) if (1..=len).contains(&n) => n - 1,
        _ => {
            console.say(&format!(
                "Invalid choice. Please enter a number between 1 and {len}."
            ));
            return Selection::Aborted(SelectionAbort::OutOfRange);
        }
    };

    let Some(message) = candidates.get(index) else {
        return Selection::Aborted(SelectionAbort::OutOfRange);
    };
    console.say(&format!("You selected: {message}"));

    let confirmed = match console.prompt("Do you want to use this commit message? (y/n)") {
        Ok(answer) => answer.trim().eq_ignore_ascii_case("y"),
        Err(e) => {
            debug!("Confirmation prompt failed: {}", e);
            false
        }
    };

    Selection::Chosen { index, confirmed }
}
