//! REPL commands.
//!
//! Every effect a line of input can have is a [`Command`].  Commands are built
//! fresh for each line by the parser and consumed by [`Command::execute`].

use crate::error::{Error, Result};
use crate::observability::REPL_COMMANDS;
use crate::provider::{ChatEntry, Role, SUPPRESS_GROUNDING};
use crate::repl::engine::Repl;
use crate::repl::registry::SlashCommand;

/// Prefix that starts a multi-line entry.
pub const MULTI_LINE_PREFIX: &str = "...";

/// Line that submits a multi-line entry.
pub const SUBMIT_TERMINATOR: &str = ".";

/// Width of the role column in conversation summaries.
const SUMMARY_LABEL_WIDTH: usize = 15;

/// Maximum characters of text per summary line.
const SUMMARY_MAX_CHARS: usize = 80;

const SUMMARY_ELLIPSIS: &str = "...";

/// A unit of REPL behavior.
#[derive(Debug, Clone)]
pub enum Command {
    /// Do nothing.
    NoOp,
    /// Stop the REPL.
    Quit,
    /// Reset input and show an error.
    PrintError(Error),
    /// Add a line to the input buffer.
    Append(String),
    /// Send the input buffer to the model and stream the reply.
    Submit,
    /// Run commands in order, stopping at the first failure.
    Chain(Vec<Command>),
    /// Start buffering lines until the terminator.
    EnterMultiLine,
    /// Change the active model.
    SetModel(String),
    /// Disable grounding for the next turn.
    Suppress,
    /// Forget the conversation.
    ClearHistory,
    /// Print a summary of the conversation.
    SummarizeHistory,
    /// Print the command reference.
    Help,
}

impl Command {
    /// Runs the command against `repl`.
    pub async fn execute(self, repl: &mut Repl) -> Result<()> {
        if !matches!(self, Command::Chain(_)) {
            REPL_COMMANDS.click();
        }
        match self {
            Command::NoOp => Ok(()),
            Command::Quit => {
                repl.stop();
                Ok(())
            }
            Command::PrintError(err) => {
                repl.reset_input();
                let message = err.to_string();
                repl.renderer().print_error(message.trim_end_matches('\n'));
                Ok(())
            }
            Command::Append(text) => {
                repl.session_mut().append_line(&text);
                Ok(())
            }
            Command::Submit => repl.submit().await,
            Command::Chain(commands) => {
                for command in commands {
                    Box::pin(command.execute(repl)).await?;
                }
                Ok(())
            }
            Command::EnterMultiLine => {
                repl.enter_multi_line();
                Ok(())
            }
            Command::SetModel(model) => {
                tracing::debug!(model = %model, "switching model");
                repl.session_mut().set_active_model(model.as_str());
                repl.reset_input();
                repl.renderer()
                    .print_info(&format!("[Model set to {model}]"));
                Ok(())
            }
            Command::Suppress => {
                repl.session_mut()
                    .turn_flags_mut()
                    .set_bool(SUPPRESS_GROUNDING, true);
                repl.renderer()
                    .print_info("[Grounding suppressed for the next message]");
                Ok(())
            }
            Command::ClearHistory => {
                repl.session_mut().clear_history();
                repl.renderer().print_info("[Current conversation cleared]");
                repl.reset_input();
                Ok(())
            }
            Command::SummarizeHistory => {
                let lines: Vec<String> = repl.session().history().iter().map(summary_line).collect();
                let renderer = repl.renderer();
                renderer.print_summary_line("=== Conversation Summary ===");
                for line in &lines {
                    renderer.print_summary_line(line);
                }
                renderer.print_summary_line("======= End Summary ========");
                Ok(())
            }
            Command::Help => {
                repl.renderer().print_info(&help_text());
                Ok(())
            }
        }
    }
}

/// One line of a conversation summary: a right-aligned role label followed by
/// the entry's text on a single line, cut to a fixed length.
pub fn summary_line(entry: &ChatEntry) -> String {
    let label = match entry.role {
        Role::User => "[User]: ",
        Role::Assistant => "[Assistant]: ",
        Role::System => "[System]: ",
    };
    let text = entry.text.trim().replace('\n', "¶ ");
    let text = if text.chars().count() > SUMMARY_MAX_CHARS {
        let keep = SUMMARY_MAX_CHARS - SUMMARY_ELLIPSIS.len();
        let mut cut: String = text.chars().take(keep).collect();
        cut.push_str(SUMMARY_ELLIPSIS);
        cut
    } else {
        text
    };
    format!("{label:>width$} {text}", width = SUMMARY_LABEL_WIDTH)
}

/// Returns help text describing the available commands.
pub fn help_text() -> String {
    let mut text = String::from(
        "Commands:
  /quit, /q          Exit
  /help, /h          Show this help
  /m <model>         Switch the active model
",
    );
    for cmd in SlashCommand::ALL {
        let usage = format!("/c {}", cmd.name());
        text.push_str(&format!("  {usage:<18} {}\n", cmd.description()));
    }
    text.push_str(&format!(
        "
Input:
  {MULTI_LINE_PREFIX}<text>          Start a multi-line message
  {SUBMIT_TERMINATOR}                  Send a multi-line message (on its own line)
  <text> @ground     Enable search grounding for this message"
    ));
    text
}
