//! Output rendering for the REPL.
//!
//! The REPL never writes to the terminal directly; everything it shows goes
//! through a [`Renderer`] so tests can capture it and `--no-color` can strip
//! styling in one place.

use std::io::{self, Stdout, Write};

use crate::repl::stream::TurnMetrics;

/// ANSI escape code for bold text.
pub(crate) const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for yellow text (model header and notices).
pub(crate) const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for green text (user prompt).
pub(crate) const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code to reset all styling.
pub(crate) const ANSI_RESET: &str = "\x1b[0m";

/// Trait for rendering REPL output.
pub trait Renderer: Send {
    /// Called before the first token of a response.
    fn print_header(&mut self, model: &str);

    /// Print a chunk of response text.
    ///
    /// This is called incrementally as tokens are streamed and must show the
    /// text immediately.
    fn print_text(&mut self, text: &str);

    /// Called when a response stream ends, successfully or not.
    fn finish_response(&mut self);

    /// Print the throughput line for a finished turn.
    fn print_metrics(&mut self, metrics: &TurnMetrics);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print one line of a conversation summary.
    fn print_summary_line(&mut self, line: &str);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            out: io::stdout(),
            use_color,
        }
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer writing to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self { out, use_color }
    }

    /// Consumes the renderer, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Writes `text` wrapped in `style` when color is enabled, then flushes.
    fn styled(&mut self, style: &str, text: &str) {
        let _ = if self.use_color {
            write!(self.out, "{style}{text}{ANSI_RESET}")
        } else {
            write!(self.out, "{text}")
        };
        self.flush();
    }

    /// Flushes the writer to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.out.flush();
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn print_header(&mut self, model: &str) {
        self.styled(&format!("{ANSI_BOLD}{ANSI_YELLOW}"), &format!("[{model}]: "));
    }

    fn print_text(&mut self, text: &str) {
        let _ = write!(self.out, "{text}");
        self.flush();
    }

    fn finish_response(&mut self) {
        let _ = writeln!(self.out);
        self.flush();
    }

    fn print_metrics(&mut self, metrics: &TurnMetrics) {
        let _ = writeln!(
            self.out,
            "[{:.2} tokens/s, {:.2}s, {} tokens]",
            metrics.tokens_per_second(),
            metrics.elapsed.as_secs_f64(),
            metrics.tokens
        );
        self.flush();
    }

    fn print_info(&mut self, info: &str) {
        self.styled(ANSI_YELLOW, info);
        let _ = writeln!(self.out);
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.styled(ANSI_RED, &format!("<Error>{error}</Error>"));
        let _ = writeln!(self.out);
        self.flush();
    }

    fn print_summary_line(&mut self, line: &str) {
        let _ = writeln!(self.out, "{line}");
        self.flush();
    }
}
