use biometrics::{Collector, Counter, Moments};

pub(crate) static REPL_TURNS: Counter = Counter::new("promptline.repl.turns");
pub(crate) static REPL_TURN_ERRORS: Counter = Counter::new("promptline.repl.turn_errors");
pub(crate) static REPL_BLANK_TURNS: Counter = Counter::new("promptline.repl.blank_turns");
pub(crate) static REPL_COMMANDS: Counter = Counter::new("promptline.repl.commands");

pub(crate) static STREAM_TOKENS: Counter = Counter::new("promptline.stream.tokens");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("promptline.stream.errors");
pub(crate) static STREAM_DURATION: Moments = Moments::new("promptline.stream.duration_seconds");
pub(crate) static STREAM_TOKENS_PER_SECOND: Moments =
    Moments::new("promptline.stream.tokens_per_second");

pub(crate) static PROVIDER_REQUESTS: Counter = Counter::new("promptline.provider.requests");
pub(crate) static PROVIDER_REQUEST_ERRORS: Counter =
    Counter::new("promptline.provider.request_errors");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&REPL_TURNS);
    collector.register_counter(&REPL_TURN_ERRORS);
    collector.register_counter(&REPL_BLANK_TURNS);
    collector.register_counter(&REPL_COMMANDS);

    collector.register_counter(&STREAM_TOKENS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_moments(&STREAM_DURATION);
    collector.register_moments(&STREAM_TOKENS_PER_SECOND);

    collector.register_counter(&PROVIDER_REQUESTS);
    collector.register_counter(&PROVIDER_REQUEST_ERRORS);
}
