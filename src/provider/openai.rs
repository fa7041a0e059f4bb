//! OpenAI-compatible chat-completions provider.
//!
//! Works against `api.openai.com` as well as any endpoint that speaks the same
//! `/models` and `/chat/completions` protocol (for example Gemini's OpenAI
//! compatibility layer).

use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::provider::http::{self, build_client};
use crate::provider::sse::data_payloads;
use crate::provider::{
    ModelInfo, Provider, Role, RoleMapper, SolicitRequest, StreamToken, TokenStream,
    prepare_conversation,
};

/// Default OpenAI API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const ROLE_USER: &str = "user";
const ROLE_ASSISTANT: &str = "assistant";
const ROLE_DEVELOPER: &str = "developer";

/// Provider for OpenAI-compatible chat-completion APIs.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    api_key: String,
    base_url: Url,
    system_prompt: Option<String>,
    client: ReqwestClient,
    timeout: Duration,
}

impl OpenAiProvider {
    /// Creates a provider for `base_url` authenticated with `api_key`.
    pub fn new(
        api_key: impl Into<String>,
        base_url: &str,
        system_prompt: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::authentication(
                "OpenAI API key not provided; set openai-api-key or PROMPTLINE_OPENAI_API_KEY",
            ));
        }
        Ok(Self {
            api_key,
            base_url: Url::parse(base_url)?,
            system_prompt: system_prompt.filter(|p| !p.is_empty()),
            client: build_client(timeout)?,
            timeout,
        })
    }

    fn endpoint(&self, suffix: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::url(format!("base url {} cannot be a base", self.base_url), None))?
            .pop_if_empty()
            .extend(suffix.split('/'));
        Ok(url)
    }

    fn build_request(&self, request: &SolicitRequest<'_>) -> Result<CreateChatCompletionRequest> {
        let prepared = prepare_conversation(request.history)?;
        let mut messages = Vec::with_capacity(prepared.entries.len() + 1);
        if let Some(system_prompt) = &self.system_prompt {
            messages.push(Message {
                content: system_prompt.clone(),
                role: ROLE_DEVELOPER.to_string(),
            });
        }
        messages.extend(prepared.entries.into_iter().map(|entry| Message {
            content: entry.text,
            role: self.to_provider_role(entry.role).to_string(),
        }));
        Ok(CreateChatCompletionRequest {
            model: request.model.to_string(),
            messages,
            stream: true,
            stream_options: StreamOptions {
                include_usage: true,
            },
        })
    }
}

impl RoleMapper for OpenAiProvider {
    fn to_provider_role(&self, role: Role) -> &'static str {
        match role {
            Role::Assistant => ROLE_ASSISTANT,
            Role::User | Role::System => ROLE_USER,
        }
    }

    fn to_generic_role(&self, provider_role: &str) -> Role {
        match provider_role {
            ROLE_ASSISTANT => Role::Assistant,
            _ => Role::User,
        }
    }
}

#[async_trait::async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let request = self
            .client
            .get(self.endpoint("models")?)
            .bearer_auth(&self.api_key);
        let response = http::send(request, self.timeout, None).await?;
        let models: ListModelsResponse = response.json().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse list-models response: {e}"),
                Some(Box::new(e)),
            )
        })?;
        let mut models: Vec<ModelInfo> = models
            .data
            .into_iter()
            .map(|model| ModelInfo {
                display_name: model.id.clone(),
                name: model.id.clone(),
                description: model.id,
                ..ModelInfo::default()
            })
            .collect();
        models.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(models)
    }

    async fn solicit_response(&self, request: SolicitRequest<'_>) -> Result<TokenStream> {
        let body = self.build_request(&request)?;
        tracing::debug!(
            model = %body.model,
            messages = body.messages.len(),
            "sending chat completion request"
        );
        let http_request = self
            .client
            .post(self.endpoint("chat/completions")?)
            .bearer_auth(&self.api_key)
            .json(&body);
        let response = http::send(http_request, self.timeout, Some(request.model)).await?;
        Ok(Box::pin(chunk_tokens(data_payloads(http::byte_stream(
            response,
        )))))
    }
}

/// Converts SSE payloads into tokens.
///
/// `[DONE]` ends the stream; a payload that fails to parse ends it with an
/// error.
fn chunk_tokens<S>(payloads: S) -> impl Stream<Item = Result<StreamToken>> + Send
where
    S: Stream<Item = Result<String>> + Send + 'static,
{
    let payloads = Box::pin(payloads);
    stream::unfold((payloads, false), |(mut payloads, done)| async move {
        if done {
            return None;
        }
        loop {
            let payload = match payloads.next().await? {
                Ok(payload) => payload,
                Err(e) => return Some((Err(e), (payloads, true))),
            };
            if payload == "[DONE]" {
                return None;
            }
            let chunk: ChatCompletionChunk = match serde_json::from_str(&payload) {
                Ok(chunk) => chunk,
                Err(e) => {
                    return Some((
                        Err(Error::serialization(
                            format!("Failed to parse chat completion chunk: {e}"),
                            Some(Box::new(e)),
                        )),
                        (payloads, true),
                    ));
                }
            };
            let text = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .unwrap_or_default();
            let token_count = chunk.usage.map(|u| u.completion_tokens).unwrap_or(0);
            if text.is_empty() && token_count == 0 {
                continue;
            }
            return Some((
                Ok(StreamToken::with_count(text, token_count)),
                (payloads, false),
            ));
        }
    })
}

#[derive(Debug, Serialize)]
struct CreateChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    stream_options: StreamOptions,
}

#[derive(Debug, Serialize)]
struct Message {
    content: String,
    role: String,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Deserialize)]
struct ListModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    usage: Option<ChunkUsage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkUsage {
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatEntry, TurnFlags};

    fn provider(system_prompt: Option<&str>) -> OpenAiProvider {
        OpenAiProvider::new(
            "test-key",
            DEFAULT_BASE_URL,
            system_prompt.map(String::from),
            Duration::from_secs(30),
        )
        .unwrap()
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let err = OpenAiProvider::new("", DEFAULT_BASE_URL, None, Duration::from_secs(1))
            .unwrap_err();
        assert!(err.is_authentication());
    }

    #[test]
    fn endpoint_joins_path() {
        let p = provider(None);
        assert_eq!(
            p.endpoint("chat/completions").unwrap().as_str(),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            p.endpoint("models").unwrap().as_str(),
            "https://api.openai.com/v1/models"
        );
    }

    #[test]
    fn role_mapping() {
        let p = provider(None);
        assert_eq!(p.to_provider_role(Role::Assistant), "assistant");
        assert_eq!(p.to_provider_role(Role::System), "user");
        assert_eq!(p.to_generic_role("assistant"), Role::Assistant);
        assert_eq!(p.to_generic_role("tool"), Role::User);
    }

    #[test]
    fn request_prepends_developer_message_and_strips_mentions() {
        let p = provider(Some("Be concise."));
        let history = vec![ChatEntry::user("Hi @ground")];
        let flags = TurnFlags::new();
        let body = p
            .build_request(&SolicitRequest {
                history: &history,
                model: "gpt-4o-mini",
                flags: &flags,
            })
            .unwrap();
        assert!(body.stream);
        assert_eq!(body.messages.len(), 2);
        assert_eq!(body.messages[0].role, "developer");
        assert_eq!(body.messages[1].content, "Hi");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream_options"]["include_usage"], true);
    }

    #[test]
    fn mention_only_request_is_blank() {
        let p = provider(None);
        let history = vec![ChatEntry::user("@ground\n")];
        let flags = TurnFlags::new();
        let err = p
            .build_request(&SolicitRequest {
                history: &history,
                model: "gpt-4o-mini",
                flags: &flags,
            })
            .unwrap_err();
        assert!(err.is_blank_input());
    }

    #[tokio::test]
    async fn chunks_become_tokens() {
        let payloads: Vec<Result<String>> = vec![
            Ok(r#"{"choices":[{"delta":{"role":"assistant","content":""}}]}"#.to_string()),
            Ok(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#.to_string()),
            Ok(r#"{"choices":[{"delta":{"content":"lo"}}]}"#.to_string()),
            Ok(r#"{"choices":[],"usage":{"prompt_tokens":3,"completion_tokens":2,"total_tokens":5}}"#.to_string()),
            Ok("[DONE]".to_string()),
            Ok(r#"{"choices":[{"delta":{"content":"ignored"}}]}"#.to_string()),
        ];
        let tokens: Vec<Result<StreamToken>> =
            chunk_tokens(stream::iter(payloads)).collect().await;
        let tokens: Vec<StreamToken> = tokens.into_iter().map(|t| t.unwrap()).collect();
        assert_eq!(
            tokens,
            vec![
                StreamToken::text("Hel"),
                StreamToken::text("lo"),
                StreamToken::with_count("", 2),
            ]
        );
    }

    #[tokio::test]
    async fn malformed_chunk_ends_stream_with_error() {
        let payloads: Vec<Result<String>> = vec![
            Ok(r#"{"choices":[{"delta":{"content":"partial"}}]}"#.to_string()),
            Ok("{not json".to_string()),
            Ok(r#"{"choices":[{"delta":{"content":"never"}}]}"#.to_string()),
        ];
        let tokens: Vec<Result<StreamToken>> =
            chunk_tokens(stream::iter(payloads)).collect().await;
        assert_eq!(tokens.len(), 2);
        assert!(tokens[0].is_ok());
        assert!(matches!(tokens[1], Err(Error::Serialization { .. })));
    }
}
