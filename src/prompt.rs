//! Line-oriented prompting for interactive edits.
//!
//! Properties never touch the terminal directly; they ask a [`Prompter`]
//! for candidate strings and re-ask when validation fails. The terminal
//! implementation reads stdin line by line, a trailing tab requests
//! completions for the partial answer.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use crate::error::{Error, Result};

/// Source of candidate values for interactive edits.
pub trait Prompter {
    /// Ask for one line of input.
    ///
    /// Returns [`Error::Cancelled`] when the input source is closed or
    /// interrupted; callers must abandon the record being edited.
    fn read_line(&mut self, prompt: &str, completion: &[String]) -> Result<String>;

    /// Show an informational line (validation failures, headings).
    fn notify(&mut self, message: &str);
}

/// Completion vocabulary entries containing `text`, case-insensitively.
///
/// Empty `text` matches everything. Results are sorted.
pub fn complete(text: &str, options: &[String]) -> Vec<String> {
    let needle = text.to_lowercase();
    let mut matches: Vec<String> = options
        .iter()
        .filter(|option| !option.is_empty())
        .filter(|option| needle.is_empty() || option.to_lowercase().contains(&needle))
        .cloned()
        .collect();
    matches.sort();
    matches.dedup();
    matches
}

/// Ask a yes/no question; an empty answer picks `default`.
pub fn confirm(prompter: &mut dyn Prompter, question: &str, default: bool) -> Result<bool> {
    loop {
        let reply = prompter.read_line(question, &[])?;
        let reply = reply.trim().to_lowercase();
        match reply.as_str() {
            "" => return Ok(default),
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => prompter.notify("Please answer '(y)es' or '(n)o'"),
        }
    }
}

/// Prompter over any buffered reader and writer (stdin/stderr by default).
pub struct TerminalPrompter<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompter<io::StdinLock<'static>, io::Stderr> {
    /// Prompts go to stderr so `--json` output on stdout stays clean.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_raw(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut line = String::new();
        let read = match self.input.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => return Err(Error::Cancelled),
            Err(err) => return Err(Error::Io(err)),
        };
        if read == 0 {
            let _ = writeln!(self.output);
            return Err(Error::Cancelled);
        }

        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn read_line(&mut self, prompt: &str, completion: &[String]) -> Result<String> {
        loop {
            let line = self.read_raw(prompt)?;
            let Some(partial) = line.strip_suffix('\t') else {
                return Ok(line);
            };

            let matches = complete(partial, completion);
            match matches.as_slice() {
                [single] => return Ok(single.clone()),
                [] => self.notify(" > no suggestions"),
                many => {
                    for option in many {
                        self.notify(&format!("   {option}"));
                    }
                }
            }
        }
    }

    fn notify(&mut self, message: &str) {
        let _ = writeln!(self.output, "{message}");
    }
}

/// Prompter that replays canned answers; runs out as a cancellation.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    prompts: Vec<String>,
    notices: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
            notices: Vec::new(),
        }
    }

    /// Prompts shown so far, in order.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Notices shown so far, in order.
    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    /// Answers not consumed yet.
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompter for ScriptedPrompter {
    fn read_line(&mut self, prompt: &str, _completion: &[String]) -> Result<String> {
        self.prompts.push(prompt.to_string());
        self.answers.pop_front().ok_or(Error::Cancelled)
    }

    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}
