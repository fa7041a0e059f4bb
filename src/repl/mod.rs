//! Interactive read-eval-print loop.
//!
//! A line read from the [`LineSource`] is turned into a [`Command`] by the
//! [`LineParser`] and executed against the [`Repl`], which owns the
//! [`SessionState`].  Submitting a turn streams the provider's reply through a
//! [`ResponseStreamConsumer`] into the history.

pub mod command;
pub mod engine;
pub mod parser;
pub mod registry;
pub mod session;
pub mod stream;
pub mod terminal;

pub use command::{Command, help_text, summary_line};
pub use engine::Repl;
pub use parser::LineParser;
pub use registry::{CommandRegistry, SlashCommand};
pub use session::{InputMode, SessionState};
pub use stream::{ResponseStreamConsumer, TurnMetrics};
pub use terminal::{Input, LineSource, RustylineTerminal, SlashCompleter};
