//! The `/c <name>` sub-commands.

use crate::repl::command::Command;

/// Prefix shared by all registered sub-commands.
pub const SLASH_PREFIX: &str = "/c";

/// A sub-command reachable as `/c <name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashCommand {
    /// Print a summary of the conversation.
    History,
    /// Forget the conversation.
    Clear,
    /// Disable grounding for the next turn.
    Suppress,
}

impl SlashCommand {
    /// Every sub-command, in help order.
    pub const ALL: [SlashCommand; 3] = [
        SlashCommand::History,
        SlashCommand::Clear,
        SlashCommand::Suppress,
    ];

    /// The name typed after `/c`.
    pub fn name(self) -> &'static str {
        match self {
            SlashCommand::History => "history",
            SlashCommand::Clear => "clear",
            SlashCommand::Suppress => "suppress",
        }
    }

    /// One-line description for help output.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::History => "Summarize the conversation so far",
            SlashCommand::Clear => "Clear the conversation history",
            SlashCommand::Suppress => "Disable search grounding for the next message",
        }
    }

    /// The command this name runs.
    pub fn command(self) -> Command {
        match self {
            SlashCommand::History => Command::SummarizeHistory,
            SlashCommand::Clear => Command::ClearHistory,
            SlashCommand::Suppress => Command::Suppress,
        }
    }
}

/// Resolves `/c <name>` lines to commands.
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    commands: Vec<SlashCommand>,
}

impl CommandRegistry {
    /// Creates a registry holding every [`SlashCommand`].
    pub fn new() -> Self {
        Self::with_commands(SlashCommand::ALL.to_vec())
    }

    /// Creates a registry holding only `commands`.
    pub fn with_commands(commands: Vec<SlashCommand>) -> Self {
        Self { commands }
    }

    /// The registered sub-commands.
    pub fn commands(&self) -> &[SlashCommand] {
        &self.commands
    }

    /// Returns the command for `line`, or `None` if it is not exactly
    /// `/c <registered name>`.
    pub fn lookup(&self, line: &str) -> Option<Command> {
        let mut words = line.split_whitespace();
        if words.next()? != SLASH_PREFIX {
            return None;
        }
        let name = words.next()?;
        if words.next().is_some() {
            return None;
        }
        self.commands
            .iter()
            .find(|cmd| cmd.name() == name)
            .map(|cmd| cmd.command())
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}
