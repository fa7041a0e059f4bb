//! Line input for the REPL.
//!
//! [`LineSource`] is everything the engine needs from a terminal: read a
//! line, change the prompt, and switch autocompletion off and on around
//! multi-line entry.  [`RustylineTerminal`] implements it with `rustyline`.

use std::borrow::Cow::{self, Borrowed, Owned};

use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Cmd, Context, Editor, Helper, KeyEvent};

use crate::error::Result;
use crate::render::{ANSI_BOLD, ANSI_GREEN, ANSI_RESET};

/// Completions offered at the start of a line.
pub const SLASH_COMPLETIONS: &[&str] = &[
    "/c clear",
    "/c history",
    "/c suppress",
    "/help",
    "/m ",
    "/quit",
];

/// The outcome of reading one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A line of text, without its trailing newline.
    Line(String),
    /// The user pressed Ctrl-C; the partial line was discarded.
    Interrupted,
    /// No more input is available.
    Eof,
}

/// A source of input lines with a prompt and swappable autocompletion.
pub trait LineSource {
    /// Reads the next line.
    ///
    /// Errors other than end-of-input and interruption are returned as
    /// [`Error::Readline`](crate::Error::Readline).
    fn read_line(&mut self) -> Result<Input>;

    /// Sets the prompt shown by the next read.
    fn set_prompt(&mut self, prompt: &str);

    /// Turns autocompletion off, keeping the completer for later.
    fn stash_completer(&mut self);

    /// Turns autocompletion back on.  Does nothing if it is already on.
    fn restore_completer(&mut self);
}

/// Completes slash commands and colors the prompt.
#[derive(Debug, Clone)]
pub struct SlashCompleter {
    use_color: bool,
}

impl SlashCompleter {
    /// Creates a completer; `use_color` controls prompt styling.
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    fn candidates(&self, prefix: &str) -> Vec<Pair> {
        if !prefix.starts_with('/') {
            return Vec::new();
        }
        SLASH_COMPLETIONS
            .iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect()
    }
}

impl Helper for SlashCompleter {}

impl Completer for SlashCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok((0, self.candidates(&line[..pos])))
    }
}

impl Hinter for SlashCompleter {
    type Hint = String;
}

impl Highlighter for SlashCompleter {
    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        _default: bool,
    ) -> Cow<'b, str> {
        if self.use_color && !prompt.is_empty() {
            Owned(format!("{ANSI_BOLD}{ANSI_GREEN}{prompt}{ANSI_RESET}"))
        } else {
            Borrowed(prompt)
        }
    }
}

impl Validator for SlashCompleter {}

/// A [`LineSource`] backed by a `rustyline` editor.
pub struct RustylineTerminal {
    editor: Editor<SlashCompleter, DefaultHistory>,
    completer: SlashCompleter,
    prompt: String,
}

impl RustylineTerminal {
    /// Creates a terminal with autocompletion on and Ctrl-Z disabled.
    pub fn new(use_color: bool) -> Result<Self> {
        let mut editor = Editor::<SlashCompleter, DefaultHistory>::new()?;
        let completer = SlashCompleter::new(use_color);
        editor.set_helper(Some(completer.clone()));
        editor.bind_sequence(KeyEvent::ctrl('Z'), Cmd::Noop);
        Ok(Self {
            editor,
            completer,
            prompt: String::new(),
        })
    }
}

impl LineSource for RustylineTerminal {
    fn read_line(&mut self) -> Result<Input> {
        match self.editor.readline(&self.prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Input::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(Input::Interrupted),
            Err(ReadlineError::Eof) => Ok(Input::Eof),
            Err(err) => Err(err.into()),
        }
    }

    fn set_prompt(&mut self, prompt: &str) {
        self.prompt = prompt.to_string();
    }

    fn stash_completer(&mut self) {
        self.editor.set_helper(None);
    }

    fn restore_completer(&mut self) {
        if self.editor.helper().is_none() {
            self.editor.set_helper(Some(self.completer.clone()));
        }
    }
}
