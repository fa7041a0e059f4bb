//! The REPL loop and turn submission.

use std::time::Instant;

use crate::error::Result;
use crate::observability::{REPL_BLANK_TURNS, REPL_TURN_ERRORS, REPL_TURNS, STREAM_ERRORS};
use crate::provider::{ChatEntry, Provider, SolicitRequest};
use crate::render::Renderer;
use crate::repl::command::Command;
use crate::repl::parser::LineParser;
use crate::repl::registry::CommandRegistry;
use crate::repl::session::SessionState;
use crate::repl::stream::ResponseStreamConsumer;
use crate::repl::terminal::LineSource;

/// An interactive session: a provider, a terminal, and the conversation.
pub struct Repl {
    provider: Box<dyn Provider>,
    terminal: Box<dyn LineSource>,
    renderer: Box<dyn Renderer>,
    parser: LineParser,
    session: SessionState,
    stopped: bool,
}

impl Repl {
    /// Creates a REPL talking to `provider` with `model` active.
    pub fn new(
        provider: Box<dyn Provider>,
        terminal: Box<dyn LineSource>,
        renderer: Box<dyn Renderer>,
        model: impl Into<String>,
    ) -> Self {
        Self::with_registry(provider, terminal, renderer, model, CommandRegistry::new())
    }

    /// Creates a REPL whose `/c` commands come from `registry`.
    pub fn with_registry(
        provider: Box<dyn Provider>,
        terminal: Box<dyn LineSource>,
        renderer: Box<dyn Renderer>,
        model: impl Into<String>,
        registry: CommandRegistry,
    ) -> Self {
        let mut repl = Self {
            provider,
            terminal,
            renderer,
            parser: LineParser::new(registry),
            session: SessionState::new(model),
            stopped: false,
        };
        repl.reset_input();
        repl
    }

    /// Returns the session state.
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Returns the session state for mutation.
    pub fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    /// Returns the renderer.
    pub fn renderer(&mut self) -> &mut dyn Renderer {
        self.renderer.as_mut()
    }

    /// Returns the provider.
    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    /// Returns true once a quit command has run.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Asks the loop to stop after the current command.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Reads one line and parses it.
    pub fn read_command(&mut self) -> Command {
        let read = self.terminal.read_line();
        self.parser.parse(read, self.session.mode())
    }

    /// Reads, parses and executes one line.
    ///
    /// A failing command is reported through [`Command::PrintError`], so this
    /// only fails if reporting does.
    pub async fn step(&mut self) -> Result<()> {
        let command = self.read_command();
        if let Err(err) = command.execute(self).await {
            tracing::warn!(error = %err, "command failed");
            Command::PrintError(err).execute(self).await?;
        }
        Ok(())
    }

    /// Runs until end of input or a quit command.
    pub async fn run(&mut self) -> Result<()> {
        tracing::debug!(
            provider = self.provider.name(),
            model = self.session.active_model(),
            "repl started"
        );
        while !self.stopped {
            self.step().await?;
        }
        tracing::debug!(turns = self.session.history().len(), "repl stopped");
        Ok(())
    }

    /// Discards pending input and restores the first-line prompt and completion.
    pub(crate) fn reset_input(&mut self) {
        self.session.reset_input();
        self.terminal.set_prompt(&self.session.prompt());
        self.terminal.restore_completer();
    }

    /// Switches to multi-line entry: empty prompt, no completion.
    pub(crate) fn enter_multi_line(&mut self) {
        self.session.enter_multi_line();
        self.terminal.set_prompt(&self.session.prompt());
        self.terminal.stash_completer();
    }

    /// Sends the pending input and streams the reply into the history.
    pub(crate) async fn submit(&mut self) -> Result<()> {
        let started = Instant::now();
        let flags = self.session.take_turn_flags();
        let text = self.session.take_input();
        self.session.push_entry(ChatEntry::user(text));
        self.reset_input();
        REPL_TURNS.click();

        let model = self.session.active_model().to_string();
        let request = SolicitRequest {
            history: self.session.history(),
            model: &model,
            flags: &flags,
        };
        let stream = match self.provider.solicit_response(request).await {
            Ok(stream) => stream,
            Err(err) if err.is_blank_input() => {
                tracing::debug!("blank input after removing mentions; turn retracted");
                self.session.retract_user_entry();
                REPL_BLANK_TURNS.click();
                return Ok(());
            }
            Err(err) => {
                tracing::error!(error = %err, model = %model, "request failed");
                REPL_TURN_ERRORS.click();
                return Err(err);
            }
        };

        self.renderer.print_header(&model);
        let mut consumer = ResponseStreamConsumer::new(started);
        let drained = consumer.drain(stream, self.renderer.as_mut()).await;
        self.renderer.finish_response();
        if let Err(err) = drained {
            tracing::error!(
                error = %err,
                partial_len = consumer.text().len(),
                "response stream failed; partial reply not kept"
            );
            STREAM_ERRORS.click();
            REPL_TURN_ERRORS.click();
            return Err(err);
        }

        let metrics = consumer.metrics();
        metrics.record();
        self.renderer.print_metrics(&metrics);
        tracing::debug!(
            tokens = metrics.tokens,
            elapsed_secs = metrics.elapsed.as_secs_f64(),
            "turn complete"
        );
        self.session.push_entry(ChatEntry::assistant(consumer.into_text()));
        Ok(())
    }
}
