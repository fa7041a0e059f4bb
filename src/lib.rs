//! An interactive, line-oriented client for chat-style language models.
//!
//! The crate is organised around a small REPL: lines typed at the terminal
//! are parsed into [`Command`]s, which edit the conversation held in a
//! [`SessionState`] or submit it to a [`Provider`] and stream the reply back
//! to the terminal.
//!
//! Two providers are built in, an OpenAI-compatible chat-completions client
//! and a Gemini client; see [`provider::registry`].

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod mentions;
pub mod observability;
pub mod provider;
pub mod render;
pub mod repl;

pub use config::{Args, Config};
pub use error::{Error, Result};
pub use mentions::mentions_from_end;
pub use observability::register_biometrics;
pub use provider::{
    ChatEntry, GeminiProvider, ModelInfo, OpenAiProvider, Provider, Role, RoleMapper,
    SUPPRESS_GROUNDING, SolicitRequest, StreamToken, TokenStream, TurnFlags,
};
pub use render::{PlainTextRenderer, Renderer};
pub use repl::{
    Command, CommandRegistry, Input, InputMode, LineParser, LineSource, Repl,
    ResponseStreamConsumer, SessionState, SlashCommand, TurnMetrics,
};
