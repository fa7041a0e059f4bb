//! End-to-end REPL sessions against a scripted provider.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::stream;

use promptline::{
    ChatEntry, Error, Input, InputMode, LineSource, ModelInfo, Provider, Renderer, Repl,
    ResponseStreamConsumer, Result, Role, RoleMapper, SUPPRESS_GROUNDING, SolicitRequest,
    StreamToken, TokenStream, TurnMetrics, mentions_from_end,
};

/// What the scripted provider saw for one request.
#[derive(Debug, Clone)]
struct Seen {
    model: String,
    last: String,
    suppressed: bool,
}

/// Replies with a fixed list of stream items, whatever is asked.
#[derive(Clone)]
struct Scripted {
    reply: Vec<std::result::Result<(&'static str, u64), &'static str>>,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Scripted {
    fn new(reply: Vec<std::result::Result<(&'static str, u64), &'static str>>) -> Self {
        Self {
            reply,
            seen: Arc::default(),
        }
    }

    fn hello() -> Self {
        Self::new(vec![Ok(("Hel", 1)), Ok(("lo", 2))])
    }
}

impl RoleMapper for Scripted {
    fn to_provider_role(&self, role: Role) -> &'static str {
        match role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    fn to_generic_role(&self, role: &str) -> Role {
        match role {
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => Role::User,
        }
    }
}

#[async_trait::async_trait]
impl Provider for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(Vec::new())
    }

    async fn solicit_response(&self, request: SolicitRequest<'_>) -> Result<TokenStream> {
        let last = request
            .history
            .last()
            .map(|entry| entry.text.clone())
            .unwrap_or_default();
        self.seen.lock().unwrap().push(Seen {
            model: request.model.to_string(),
            last: last.clone(),
            suppressed: request.flags.is_enabled(SUPPRESS_GROUNDING),
        });
        let (rest, _) = mentions_from_end(&last);
        if rest.trim().is_empty() {
            return Err(Error::BlankInput);
        }
        let items: Vec<Result<StreamToken>> = self
            .reply
            .iter()
            .map(|item| match item {
                Ok((text, count)) => Ok(StreamToken::with_count(*text, *count)),
                Err(message) => Err(Error::streaming(*message, None)),
            })
            .collect();
        Ok(Box::pin(stream::iter(items)))
    }
}

struct Script(VecDeque<Input>);

impl Script {
    fn lines(lines: &[&str]) -> Self {
        Self(lines.iter().map(|l| Input::Line(l.to_string())).collect())
    }

    fn inputs(inputs: Vec<Input>) -> Self {
        Self(inputs.into())
    }
}

impl LineSource for Script {
    fn read_line(&mut self) -> Result<Input> {
        Ok(self.0.pop_front().unwrap_or(Input::Eof))
    }

    fn set_prompt(&mut self, _: &str) {}

    fn stash_completer(&mut self) {}

    fn restore_completer(&mut self) {}
}

#[derive(Clone, Default)]
struct Capture {
    text: Arc<Mutex<String>>,
    errors: Arc<Mutex<Vec<String>>>,
    metrics: Arc<Mutex<Vec<TurnMetrics>>>,
}

impl Renderer for Capture {
    fn print_header(&mut self, _: &str) {}

    fn print_text(&mut self, text: &str) {
        self.text.lock().unwrap().push_str(text);
    }

    fn finish_response(&mut self) {}

    fn print_metrics(&mut self, metrics: &TurnMetrics) {
        self.metrics.lock().unwrap().push(*metrics);
    }

    fn print_info(&mut self, _: &str) {}

    fn print_error(&mut self, error: &str) {
        self.errors.lock().unwrap().push(error.to_string());
    }

    fn print_summary_line(&mut self, _: &str) {}
}

async fn session(provider: Scripted, lines: &[&str]) -> (Repl, Capture) {
    run_script(provider, Script::lines(lines)).await
}

async fn run_script(provider: Scripted, script: Script) -> (Repl, Capture) {
    let capture = Capture::default();
    let mut repl = Repl::new(
        Box::new(provider),
        Box::new(script),
        Box::new(capture.clone()),
        "test-model",
    );
    repl.run().await.unwrap();
    (repl, capture)
}

#[tokio::test]
async fn single_line_turn() {
    let (repl, capture) = session(Scripted::hello(), &["Hi"]).await;
    assert_eq!(
        repl.session().history(),
        &[ChatEntry::user("Hi"), ChatEntry::assistant("Hello")]
    );
    assert_eq!(*capture.text.lock().unwrap(), "Hello");
    let metrics = capture.metrics.lock().unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].tokens, 3);
    assert!(repl.is_stopped());
}

#[tokio::test]
async fn multi_line_turn() {
    let provider = Scripted::hello();
    let seen = provider.seen.clone();
    let (repl, _) = session(provider, &["...first", "second", "."]).await;
    assert_eq!(seen.lock().unwrap()[0].last, "first\nsecond\n");
    assert_eq!(repl.session().history().len(), 2);
    assert_eq!(repl.session().history()[0].text, "first\nsecond\n");
    assert_eq!(repl.session().mode(), InputMode::SingleLine);
}

#[tokio::test]
async fn mention_only_turn_is_retracted() {
    let provider = Scripted::hello();
    let seen = provider.seen.clone();
    let (repl, capture) = session(provider, &["/c suppress", "@ground", "Hi"]).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].suppressed);
    assert!(!seen[1].suppressed);
    assert_eq!(
        repl.session().history(),
        &[ChatEntry::user("Hi"), ChatEntry::assistant("Hello")]
    );
    assert!(capture.errors.lock().unwrap().is_empty());
    assert!(repl.session().turn_flags().is_default());
}

#[tokio::test]
async fn stream_failure_keeps_only_the_user_entry() {
    let provider = Scripted::new(vec![Ok(("Par", 1)), Err("connection reset")]);
    let (repl, capture) = session(provider, &["Hi"]).await;

    let history = repl.session().history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(*capture.text.lock().unwrap(), "Par");
    let errors = capture.errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("connection reset"));
    assert!(capture.metrics.lock().unwrap().is_empty());
}

#[tokio::test]
async fn end_of_stream_marker_ends_the_reply() {
    let tokens: Vec<Result<StreamToken>> = vec![
        Ok(StreamToken::with_count("done", 2)),
        Err(Error::EndOfStream),
        Ok(StreamToken::with_count("ignored", 5)),
    ];
    let mut consumer = ResponseStreamConsumer::new(Instant::now());
    let mut capture = Capture::default();
    consumer
        .drain(Box::pin(stream::iter(tokens)), &mut capture)
        .await
        .unwrap();
    assert_eq!(consumer.text(), "done");
    assert_eq!(consumer.tokens(), 2);
}

#[test]
fn short_turns_are_rated_over_one_second() {
    let metrics = TurnMetrics {
        elapsed: Duration::from_millis(100),
        tokens: 50,
    };
    assert!(metrics.tokens_per_second() <= 50.0);
}

#[tokio::test]
async fn end_of_input_quits_without_a_turn() {
    let provider = Scripted::hello();
    let seen = provider.seen.clone();
    let (repl, _) = session(provider, &[]).await;
    assert!(repl.is_stopped());
    assert!(repl.session().history().is_empty());
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_sub_command_is_sent_as_text() {
    let provider = Scripted::hello();
    let seen = provider.seen.clone();
    let (repl, _) = session(provider, &["/c bogus"]).await;
    assert_eq!(seen.lock().unwrap()[0].last, "/c bogus");
    assert_eq!(repl.session().history().len(), 2);
}

#[tokio::test]
async fn model_switch_applies_to_later_turns() {
    let provider = Scripted::hello();
    let seen = provider.seen.clone();
    let (repl, _) = session(provider, &["Hi", "/m other-model", "Again"]).await;
    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].model, "test-model");
    assert_eq!(seen[1].model, "other-model");
    assert_eq!(repl.session().active_model(), "other-model");
    assert_eq!(repl.session().history().len(), 4);
}

#[tokio::test]
async fn clear_forgets_the_conversation() {
    let (repl, _) = session(Scripted::hello(), &["Hi", "/c clear"]).await;
    assert!(repl.session().history().is_empty());
}

#[tokio::test]
async fn interrupt_cancels_a_multi_line_draft() {
    let provider = Scripted::hello();
    let seen = provider.seen.clone();
    let script = Script::inputs(vec![
        Input::Line("...draft".to_string()),
        Input::Interrupted,
        Input::Line("/c clear".to_string()),
        Input::Line("hello".to_string()),
    ]);
    let (repl, capture) = run_script(provider, script).await;

    assert_eq!(repl.session().mode(), InputMode::SingleLine);
    assert!(repl.session().input().is_empty());
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].last, "hello");
    assert_eq!(
        repl.session().history(),
        &[ChatEntry::user("hello"), ChatEntry::assistant("Hello")]
    );
    assert_eq!(capture.errors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn interrupt_at_the_first_line_is_silent() {
    let script = Script::inputs(vec![Input::Interrupted, Input::Line("Hi".to_string())]);
    let (repl, capture) = run_script(Scripted::hello(), script).await;
    assert!(capture.errors.lock().unwrap().is_empty());
    assert_eq!(repl.session().history().len(), 2);
}
