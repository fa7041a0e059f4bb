//! Model provider abstraction.
//!
//! The REPL talks to a language-model backend exclusively through the
//! [`Provider`] trait.  A provider turns the conversation history into a
//! [`TokenStream`] of incremental text deltas.  Concrete implementations live
//! in the [`openai`] and [`gemini`] modules and are constructed by name via
//! [`registry`].

use std::collections::BTreeMap;
use std::fmt;
use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mentions::mentions_from_end;

mod http;
pub mod gemini;
pub mod openai;
pub mod registry;
pub(crate) mod sse;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

/// Turn flag that disables search grounding for exactly one submission.
pub const SUPPRESS_GROUNDING: &str = "suppress-grounding";

/// Provider-neutral conversation role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that frame the conversation.
    System,
    /// Text typed by the person at the terminal.
    User,
    /// Text produced by the model.
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    /// Who produced the text.
    pub role: Role,
    /// The text itself.
    pub text: String,
}

impl ChatEntry {
    /// Creates a user entry.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// Creates an assistant entry.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Description of a model offered by a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelInfo {
    /// Human-friendly name.
    pub display_name: String,
    /// Identifier to pass as the active model.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Input token limit, when the provider reports one.
    pub max_tokens: u32,
    /// Model version, when the provider reports one.
    pub version: String,
}

/// Settings that apply to exactly one submitted turn.
///
/// Values are strings; boolean flags are stored as `"true"`/`"false"`.  The
/// default value is an empty map, which means every flag is at its default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnFlags {
    values: BTreeMap<String, String>,
}

impl TurnFlags {
    /// Creates an empty set of flags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Sets a boolean flag.
    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) {
        self.set(key, if value { "true" } else { "false" });
    }

    /// Returns the raw value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns true if `key` is set to `"true"`.
    pub fn is_enabled(&self, key: &str) -> bool {
        self.get(key) == Some("true")
    }

    /// Returns true if no flag has been set.
    pub fn is_default(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over the flags in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Everything a provider needs to answer one turn.
#[derive(Debug, Clone, Copy)]
pub struct SolicitRequest<'a> {
    /// Full conversation history; the last entry is the user's new message.
    pub history: &'a [ChatEntry],
    /// Model identifier to address.
    pub model: &'a str,
    /// Flags scoped to this turn.
    pub flags: &'a TurnFlags,
}

/// One incremental piece of a streamed response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamToken {
    /// Text delta, possibly empty.
    pub text: String,
    /// Tokens accounted to this delta; zero when the provider has not reported usage yet.
    pub token_count: u64,
}

impl StreamToken {
    /// Creates a text delta without usage information.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            token_count: 0,
        }
    }

    /// Creates a text delta carrying a token count.
    pub fn with_count(text: impl Into<String>, token_count: u64) -> Self {
        Self {
            text: text.into(),
            token_count,
        }
    }
}

/// A response stream.
///
/// The stream ends normally when it returns `None` or yields
/// [`Error::EndOfStream`]; any other `Err` item terminates it with failure.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<StreamToken>> + Send>>;

/// Maps between provider-neutral roles and a provider's own vocabulary.
pub trait RoleMapper {
    /// Returns the provider's name for `role`.
    fn to_provider_role(&self, role: Role) -> &'static str;

    /// Returns the neutral role for a provider's role name.
    fn to_generic_role(&self, provider_role: &str) -> Role;
}

/// A language-model backend.
#[async_trait::async_trait]
pub trait Provider: RoleMapper + Send + Sync {
    /// Short provider name, as accepted by the registry.
    fn name(&self) -> &str;

    /// Lists the models this provider can address.
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// Starts a streamed response to the conversation in `request`.
    ///
    /// Returns [`Error::BlankInput`] when the last user message carries no
    /// content once trailing mentions are removed.
    async fn solicit_response(&self, request: SolicitRequest<'_>) -> Result<TokenStream>;
}

/// The conversation as it should be sent upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PreparedConversation {
    /// History with mentions stripped from the final user entry.
    pub entries: Vec<ChatEntry>,
    /// Mentions found at the end of the final user entry.
    pub mentions: Vec<String>,
}

impl PreparedConversation {
    pub(crate) fn has_mention(&self, name: &str) -> bool {
        self.mentions.iter().any(|m| m.eq_ignore_ascii_case(name))
    }
}

/// Strips trailing mentions from the last user entry of `history`.
pub(crate) fn prepare_conversation(history: &[ChatEntry]) -> Result<PreparedConversation> {
    let Some((last, earlier)) = history.split_last() else {
        return Err(Error::validation(
            "cannot solicit a response to an empty conversation",
            Some("history".to_string()),
        ));
    };
    let mut entries = earlier.to_vec();
    let mut mentions = Vec::new();
    if last.role == Role::User {
        let (prefix, found) = mentions_from_end(&last.text);
        if prefix.trim().is_empty() {
            return Err(Error::BlankInput);
        }
        mentions = found.into_iter().map(String::from).collect();
        entries.push(ChatEntry::user(prefix));
    } else {
        entries.push(last.clone());
    }
    Ok(PreparedConversation { entries, mentions })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_flags_default_and_set() {
        let mut flags = TurnFlags::new();
        assert!(flags.is_default());
        assert!(!flags.is_enabled(SUPPRESS_GROUNDING));
        flags.set_bool(SUPPRESS_GROUNDING, true);
        assert!(!flags.is_default());
        assert!(flags.is_enabled(SUPPRESS_GROUNDING));
        flags.set_bool(SUPPRESS_GROUNDING, false);
        assert!(!flags.is_enabled(SUPPRESS_GROUNDING));
        assert_eq!(flags.get(SUPPRESS_GROUNDING), Some("false"));
    }

    #[test]
    fn prepare_strips_mentions_from_last_user_entry() {
        let history = vec![
            ChatEntry::user("first @ground"),
            ChatEntry::assistant("reply"),
            ChatEntry::user("what is new? @ground\n"),
        ];
        let prepared = prepare_conversation(&history).unwrap();
        assert_eq!(prepared.entries[0].text, "first @ground");
        assert_eq!(prepared.entries[2].text, "what is new?");
        assert_eq!(prepared.mentions, vec!["ground".to_string()]);
        assert!(prepared.has_mention("GROUND"));
    }

    #[test]
    fn prepare_rejects_mention_only_input() {
        let history = vec![ChatEntry::user("@ground\n")];
        let err = prepare_conversation(&history).unwrap_err();
        assert!(err.is_blank_input());
    }

    #[test]
    fn prepare_rejects_empty_history() {
        let err = prepare_conversation(&[]).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }
}
