//! User interaction behind a small capability trait.
//!
//! The workflow never touches stdin/stdout directly; it talks to a
//! [`Console`]. The terminal implementation uses dialoguer when a user is
//! attached and plain line reads from stdin otherwise, and
//! [`ScriptedConsole`] replays canned answers for tests.

use std::collections::VecDeque;
use std::io::{self, BufRead, IsTerminal, Write};

use dialoguer::Input;
use dialoguer::console::user_attended_stderr;

use crate::error::PromptError;

/// Notify the user and ask free-form questions.
pub trait Console: Send {
    /// Print one line of progress or status.
    fn say(&mut self, line: &str);

    /// Ask a question and return the raw answer line.
    fn prompt(&mut self, question: &str) -> Result<String, PromptError>;
}

/// Process console: stdout for output, stdin for answers.
///
/// dialoguer only drives the prompt when both stdin and stderr are
/// terminals; piped input is read line by line.
#[derive(Debug, Default)]
pub struct TerminalConsole;

impl Console for TerminalConsole {
    fn say(&mut self, line: &str) {
        println!("{line}");
    }

    fn prompt(&mut self, question: &str) -> Result<String, PromptError> {
        if io::stdin().is_terminal() && user_attended_stderr() {
            return Input::<String>::new()
                .with_prompt(question)
                .allow_empty(true)
                .interact_text()
                .map_err(PromptError::Terminal);
        }

        print!("{question}: ");
        io::stdout().flush().map_err(PromptError::Read)?;
        read_answer(&mut io::stdin().lock(), question)
    }
}

/// Read one answer line, without its line terminator.
///
/// End of input is [`PromptError::Exhausted`].
fn read_answer(reader: &mut impl BufRead, question: &str) -> Result<String, PromptError> {
    let mut line = String::new();
    let read = reader.read_line(&mut line).map_err(PromptError::Read)?;
    if read == 0 {
        return Err(PromptError::Exhausted(question.to_string()));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Console that answers from a fixed script and records everything shown.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    answers: VecDeque<String>,
    transcript: Vec<String>,
    questions: Vec<String>,
}

impl ScriptedConsole {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            transcript: Vec::new(),
            questions: Vec::new(),
        }
    }

    /// Lines passed to [`Console::say`], in order.
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    /// Questions passed to [`Console::prompt`], in order.
    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    /// Whether any said line contains `needle`.
    pub fn saw(&self, needle: &str) -> bool {
        self.transcript.iter().any(|line| line.contains(needle))
    }

    pub fn remaining_answers(&self) -> usize {
        self.answers.len()
    }
}

impl Console for ScriptedConsole {
    fn say(&mut self, line: &str) {
        self.transcript.push(line.to_string());
    }

    fn prompt(&mut self, question: &str) -> Result<String, PromptError> {
        self.questions.push(question.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| PromptError::Exhausted(question.to_string()))
    }
}
