//! Turning input lines into commands.
//!
//! The parser is a pure function of the line just read and the current
//! [`InputMode`]; it never touches the session.  State changes happen when
//! the returned [`Command`] executes.

use crate::error::{Error, Result};
use crate::repl::command::{Command, MULTI_LINE_PREFIX, SUBMIT_TERMINATOR};
use crate::repl::registry::CommandRegistry;
use crate::repl::session::InputMode;
use crate::repl::terminal::Input;

/// Maps lines of input to commands.
#[derive(Debug, Clone, Default)]
pub struct LineParser {
    registry: CommandRegistry,
}

impl LineParser {
    /// Creates a parser resolving `/c <name>` through `registry`.
    pub fn new(registry: CommandRegistry) -> Self {
        Self { registry }
    }

    /// Returns the command for the result of one read.
    pub fn parse(&self, read: Result<Input>, mode: InputMode) -> Command {
        match read {
            Ok(Input::Eof) => Command::Quit,
            Ok(Input::Interrupted) => match mode {
                InputMode::SingleLine => Command::NoOp,
                InputMode::MultiLine => {
                    Command::PrintError(Error::readline("multi-line input cancelled"))
                }
            },
            Ok(Input::Line(line)) => match mode {
                InputMode::SingleLine => self.parse_first_line(line),
                InputMode::MultiLine => parse_continuation(line),
            },
            Err(err) => Command::PrintError(err),
        }
    }

    fn parse_first_line(&self, line: String) -> Command {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Command::NoOp;
        }
        if let Some(command) = parse_reserved(trimmed) {
            return command;
        }
        if let Some(command) = self.registry.lookup(trimmed) {
            return command;
        }
        if let Some(rest) = line.strip_prefix(MULTI_LINE_PREFIX) {
            return Command::Chain(vec![
                Command::EnterMultiLine,
                Command::Append(rest.to_string()),
            ]);
        }
        Command::Chain(vec![Command::Append(line), Command::Submit])
    }
}

fn parse_continuation(line: String) -> Command {
    if line.trim_end() == SUBMIT_TERMINATOR {
        Command::Submit
    } else {
        Command::Append(line)
    }
}

/// Commands recognized ahead of the `/c` registry.
fn parse_reserved(trimmed: &str) -> Option<Command> {
    match trimmed {
        "/quit" | "/q" => return Some(Command::Quit),
        "/help" | "/h" => return Some(Command::Help),
        "/m" => {
            return Some(Command::PrintError(Error::validation(
                "/m requires a model name",
                Some("model".to_string()),
            )));
        }
        _ => {}
    }
    let model = trimmed.strip_prefix("/m ")?.trim();
    Some(Command::SetModel(model.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str, mode: InputMode) -> Command {
        LineParser::default().parse(Ok(Input::Line(line.to_string())), mode)
    }

    fn single(line: &str) -> Command {
        parse(line, InputMode::SingleLine)
    }

    #[test]
    fn empty_line_is_noop() {
        assert!(matches!(single(""), Command::NoOp));
        assert!(matches!(single("   "), Command::NoOp));
    }

    #[test]
    fn end_of_input_quits_in_any_mode() {
        let parser = LineParser::default();
        assert!(matches!(
            parser.parse(Ok(Input::Eof), InputMode::SingleLine),
            Command::Quit
        ));
        assert!(matches!(
            parser.parse(Ok(Input::Eof), InputMode::MultiLine),
            Command::Quit
        ));
    }

    #[test]
    fn interrupt_discards_line() {
        let parser = LineParser::default();
        assert!(matches!(
            parser.parse(Ok(Input::Interrupted), InputMode::SingleLine),
            Command::NoOp
        ));
    }

    #[test]
    fn interrupt_cancels_multi_line_entry() {
        let parser = LineParser::default();
        assert!(matches!(
            parser.parse(Ok(Input::Interrupted), InputMode::MultiLine),
            Command::PrintError(Error::Readline { .. })
        ));
    }

    #[test]
    fn whitespace_only_line_is_noop_not_a_submission() {
        assert!(matches!(single(" \t "), Command::NoOp));
    }

    #[test]
    fn terminator_tolerates_trailing_whitespace() {
        assert!(matches!(parse(".  ", InputMode::MultiLine), Command::Submit));
        assert!(matches!(parse(".\r", InputMode::MultiLine), Command::Submit));
        assert!(matches!(parse(" .", InputMode::MultiLine), Command::Append(ref t) if t == " ."));
    }

    #[test]
    fn read_error_is_printed() {
        let parser = LineParser::default();
        let command = parser.parse(Err(Error::readline("tty gone")), InputMode::SingleLine);
        assert!(matches!(command, Command::PrintError(Error::Readline { .. })));
    }

    #[test]
    fn reserved_commands() {
        assert!(matches!(single("/quit"), Command::Quit));
        assert!(matches!(single("/q"), Command::Quit));
        assert!(matches!(single("/help"), Command::Help));
        assert!(matches!(single(" /h "), Command::Help));
        assert!(matches!(single("/m gemini-2.0-flash"), Command::SetModel(ref m) if m == "gemini-2.0-flash"));
        assert!(matches!(single("/m"), Command::PrintError(Error::Validation { .. })));
    }

    #[test]
    fn registry_commands() {
        assert!(matches!(single("/c history"), Command::SummarizeHistory));
        assert!(matches!(single("/c clear"), Command::ClearHistory));
        assert!(matches!(single("/c suppress"), Command::Suppress));
    }

    #[test]
    fn unknown_slash_command_falls_through_to_submit() {
        match single("/c bogus") {
            Command::Chain(commands) => {
                assert!(matches!(&commands[0], Command::Append(text) if text == "/c bogus"));
                assert!(matches!(commands[1], Command::Submit));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn plain_line_appends_and_submits() {
        match single("Hi") {
            Command::Chain(commands) => {
                assert_eq!(commands.len(), 2);
                assert!(matches!(&commands[0], Command::Append(text) if text == "Hi"));
                assert!(matches!(commands[1], Command::Submit));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn multi_line_prefix_enters_multi_line() {
        match single("...first") {
            Command::Chain(commands) => {
                assert!(matches!(commands[0], Command::EnterMultiLine));
                assert!(matches!(&commands[1], Command::Append(text) if text == "first"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn multi_line_terminator_submits() {
        assert!(matches!(parse(".", InputMode::MultiLine), Command::Submit));
        assert!(matches!(parse("second", InputMode::MultiLine), Command::Append(ref t) if t == "second"));
        assert!(matches!(parse("", InputMode::MultiLine), Command::Append(ref t) if t.is_empty()));
        assert!(matches!(parse("/quit", InputMode::MultiLine), Command::Append(_)));
    }

    #[test]
    fn lone_dot_in_single_line_is_text() {
        assert!(matches!(single("."), Command::Chain(_)));
    }
}
