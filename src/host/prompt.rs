// src/host/prompt.rs

//! Operator prompts
//!
//! Only the semantics of a prompt live here: a question goes out, one line
//! comes back. Rendering is left to the terminal.

use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// Source of operator answers
pub trait Prompter {
    /// Ask a question and return the answer without its trailing newline
    fn ask(&mut self, question: &str) -> Result<String>;

    /// Ask a yes/no question; only `y` (any case) counts as yes
    fn confirm(&mut self, question: &str) -> Result<bool> {
        let answer = self.ask(question)?;
        Ok(answer.trim().eq_ignore_ascii_case("y"))
    }
}

/// Reads answers from the controlling terminal
#[derive(Debug, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask(&mut self, question: &str) -> Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{}", question).map_err(|e| Error::io("<stdout>", e))?;
        stdout.flush().map_err(|e| Error::io("<stdout>", e))?;

        // EOF reads as an empty answer
        let mut input = String::new();
        io::stdin()
            .lock()
            .read_line(&mut input)
            .map_err(|e| Error::io("<stdin>", e))?;

        Ok(input.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Replays canned answers, for unattended runs and tests
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }

    /// Questions asked so far
    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &str) -> Result<String> {
        self.asked.push(question.to_string());
        Ok(self.answers.pop_front().unwrap_or_default())
    }
}
