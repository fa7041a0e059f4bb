//! Draining a provider's token stream.

use std::time::{Duration, Instant};

use futures::StreamExt;

use crate::error::Result;
use crate::observability::{STREAM_DURATION, STREAM_TOKENS, STREAM_TOKENS_PER_SECOND};
use crate::provider::TokenStream;
use crate::render::Renderer;

/// Throughput of one turn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnMetrics {
    /// Wall time from submission to the end of the stream.
    pub elapsed: Duration,
    /// Sum of the token counts reported by the stream.
    pub tokens: u64,
}

impl TurnMetrics {
    /// Tokens per second, dividing by at least one second.
    pub fn tokens_per_second(&self) -> f64 {
        self.tokens as f64 / self.elapsed.as_secs_f64().max(1.0)
    }

    pub(crate) fn record(&self) {
        STREAM_DURATION.add(self.elapsed.as_secs_f64());
        STREAM_TOKENS_PER_SECOND.add(self.tokens_per_second());
    }
}

/// Accumulates a streamed response while displaying it.
///
/// Tokens are shown and buffered in arrival order.  The text gathered so far
/// survives a failed [`drain`](ResponseStreamConsumer::drain) so the caller
/// can decide what to do with it.
///
/// ```
/// # use std::time::Instant;
/// # use futures::stream;
/// # use promptline::{PlainTextRenderer, ResponseStreamConsumer, Result, StreamToken};
/// # tokio_test::block_on(async {
/// let tokens: Vec<Result<StreamToken>> = vec![
///     Ok(StreamToken::with_count("Hel", 1)),
///     Ok(StreamToken::with_count("lo", 2)),
/// ];
/// let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
/// let mut consumer = ResponseStreamConsumer::new(Instant::now());
/// consumer
///     .drain(Box::pin(stream::iter(tokens)), &mut renderer)
///     .await
///     .unwrap();
/// assert_eq!(consumer.text(), "Hello");
/// assert_eq!(consumer.tokens(), 3);
/// assert_eq!(renderer.into_inner(), b"Hello");
/// # });
/// ```
#[derive(Debug)]
pub struct ResponseStreamConsumer {
    started: Instant,
    text: String,
    tokens: u64,
}

impl ResponseStreamConsumer {
    /// Creates a consumer for a turn submitted at `started`.
    pub fn new(started: Instant) -> Self {
        Self {
            started,
            text: String::new(),
            tokens: 0,
        }
    }

    /// Reads `stream` to the end, printing each delta as it arrives.
    ///
    /// [`Error::EndOfStream`](crate::Error::EndOfStream) ends the stream
    /// normally; any other error is returned.
    pub async fn drain(&mut self, mut stream: TokenStream, renderer: &mut dyn Renderer) -> Result<()> {
        while let Some(item) = stream.next().await {
            match item {
                Ok(token) => {
                    renderer.print_text(&token.text);
                    self.text.push_str(&token.text);
                    self.tokens += token.token_count;
                    STREAM_TOKENS.count(token.token_count);
                }
                Err(err) if err.is_end_of_stream() => break,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Text received so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Tokens counted so far.
    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    /// Metrics as of now.
    pub fn metrics(&self) -> TurnMetrics {
        TurnMetrics {
            elapsed: self.started.elapsed(),
            tokens: self.tokens,
        }
    }

    /// Consumes the consumer, returning the accumulated text.
    pub fn into_text(self) -> String {
        self.text
    }
}
