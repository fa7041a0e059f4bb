//! Gemini `generativelanguage` REST provider.

use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::provider::http::{self, build_client};
use crate::provider::sse::data_payloads;
use crate::provider::{
    ModelInfo, PreparedConversation, Provider, Role, RoleMapper, SUPPRESS_GROUNDING,
    SolicitRequest, StreamToken, TokenStream, prepare_conversation,
};

/// Default Gemini API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Mention that turns on search grounding for one turn.
pub const GROUND_MENTION: &str = "ground";

/// Harm categories sent with every request.
pub const HARM_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_HARASSMENT",
];

const ROLE_USER: &str = "user";
const ROLE_MODEL: &str = "model";
const FINISH_STOP: &str = "STOP";

/// Settings for [`GeminiProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiOptions {
    /// API key, passed as the `key` query parameter.
    pub api_key: String,
    /// Endpoint root.
    pub base_url: String,
    /// Sent as `systemInstruction` when non-empty.
    pub system_prompt: Option<String>,
    /// HTTP timeout.
    pub timeout: Duration,
    /// Ground every turn unless suppressed.
    pub grounding: bool,
    /// Categories left at the service's default blocking threshold.
    pub blocked_categories: Vec<String>,
}

impl Default for GeminiOptions {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            system_prompt: None,
            timeout: Duration::from_secs(30),
            grounding: false,
            blocked_categories: Vec::new(),
        }
    }
}

/// Provider for Google's Gemini models.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    api_key: String,
    base_url: Url,
    system_prompt: Option<String>,
    grounding: bool,
    safety_settings: Vec<SafetySetting>,
    client: ReqwestClient,
    timeout: Duration,
}

impl GeminiProvider {
    /// Creates a provider from `options`.
    pub fn new(options: GeminiOptions) -> Result<Self> {
        if options.api_key.is_empty() {
            return Err(Error::authentication(
                "Gemini API key not provided; set gemini-api-key or PROMPTLINE_GEMINI_API_KEY",
            ));
        }
        Ok(Self {
            base_url: Url::parse(&options.base_url)?,
            safety_settings: safety_settings(&options.blocked_categories),
            client: build_client(options.timeout)?,
            api_key: options.api_key,
            system_prompt: options.system_prompt.filter(|p| !p.is_empty()),
            grounding: options.grounding,
            timeout: options.timeout,
        })
    }

    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::url(format!("base url {} cannot be a base", self.base_url), None))?
            .pop_if_empty()
            .extend(segments);
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("key", &self.api_key);
        }
        Ok(url)
    }

    fn grounding_active(&self, prepared: &PreparedConversation, request: &SolicitRequest<'_>) -> bool {
        (self.grounding || prepared.has_mention(GROUND_MENTION))
            && !request.flags.is_enabled(SUPPRESS_GROUNDING)
    }

    fn build_request(&self, request: &SolicitRequest<'_>) -> Result<GenerateContentRequest> {
        let prepared = prepare_conversation(request.history)?;
        let tools = if self.grounding_active(&prepared, request) {
            tracing::debug!(model = request.model, "search grounding enabled for turn");
            vec![Tool {
                google_search: GoogleSearch {},
            }]
        } else {
            Vec::new()
        };
        let contents = prepared
            .entries
            .into_iter()
            .map(|entry| Content {
                role: Some(self.to_provider_role(entry.role).to_string()),
                parts: vec![Part::text(entry.text)],
            })
            .collect();
        Ok(GenerateContentRequest {
            contents,
            system_instruction: self.system_prompt.as_ref().map(|prompt| Content {
                role: None,
                parts: vec![Part::text(prompt.clone())],
            }),
            safety_settings: self.safety_settings.clone(),
            tools,
        })
    }
}

fn safety_settings(blocked_categories: &[String]) -> Vec<SafetySetting> {
    HARM_CATEGORIES
        .iter()
        .filter(|category| {
            !blocked_categories
                .iter()
                .any(|blocked| blocked.eq_ignore_ascii_case(category))
        })
        .map(|category| SafetySetting {
            category: category.to_string(),
            threshold: "BLOCK_NONE".to_string(),
        })
        .collect()
}

impl RoleMapper for GeminiProvider {
    fn to_provider_role(&self, role: Role) -> &'static str {
        match role {
            Role::Assistant => ROLE_MODEL,
            Role::User | Role::System => ROLE_USER,
        }
    }

    fn to_generic_role(&self, provider_role: &str) -> Role {
        match provider_role {
            ROLE_MODEL => Role::Assistant,
            _ => Role::User,
        }
    }
}

#[async_trait::async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let request = self.client.get(self.endpoint(&["models"], &[])?);
        let response = http::send(request, self.timeout, None).await?;
        let models: ListModelsResponse = response.json().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse list-models response: {e}"),
                Some(Box::new(e)),
            )
        })?;
        Ok(models
            .models
            .into_iter()
            .filter(|model| model.display_name.to_lowercase().contains("gemini"))
            .map(|model| ModelInfo {
                name: model
                    .name
                    .strip_prefix("models/")
                    .unwrap_or(&model.name)
                    .to_string(),
                display_name: model.display_name,
                description: model.description,
                max_tokens: model.input_token_limit,
                version: model.version,
            })
            .collect())
    }

    async fn solicit_response(&self, request: SolicitRequest<'_>) -> Result<TokenStream> {
        let body = self.build_request(&request)?;
        tracing::debug!(
            model = request.model,
            contents = body.contents.len(),
            "sending generate content request"
        );
        let method = format!("{}:streamGenerateContent", request.model);
        let url = self.endpoint(&["models", &method], &[("alt", "sse")])?;
        let http_request = self.client.post(url).json(&body);
        let response = http::send(http_request, self.timeout, Some(request.model)).await?;
        Ok(Box::pin(chunk_tokens(data_payloads(http::byte_stream(
            response,
        )))))
    }
}

/// Converts SSE payloads into tokens.
///
/// `usageMetadata.candidatesTokenCount` is a running total; each token carries
/// the increase since the previous chunk.
fn chunk_tokens<S>(payloads: S) -> impl Stream<Item = Result<StreamToken>> + Send
where
    S: Stream<Item = Result<String>> + Send + 'static,
{
    let payloads = Box::pin(payloads);
    stream::unfold(
        (payloads, 0u64, false),
        |(mut payloads, mut seen, done)| async move {
            if done {
                return None;
            }
            loop {
                let payload = match payloads.next().await? {
                    Ok(payload) => payload,
                    Err(e) => return Some((Err(e), (payloads, seen, true))),
                };
                let chunk: GenerateContentResponse = match serde_json::from_str(&payload) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        return Some((
                            Err(Error::serialization(
                                format!("Failed to parse generate content chunk: {e}"),
                                Some(Box::new(e)),
                            )),
                            (payloads, seen, true),
                        ));
                    }
                };
                let total = chunk
                    .usage_metadata
                    .map(|u| u.candidates_token_count)
                    .unwrap_or(seen);
                let delta = total.saturating_sub(seen);
                seen = seen.max(total);
                let Some(candidate) = chunk.candidates.into_iter().next() else {
                    if delta == 0 {
                        continue;
                    }
                    return Some((
                        Ok(StreamToken::with_count("", delta)),
                        (payloads, seen, false),
                    ));
                };
                if let Some(reason) = candidate.finish_reason.as_deref() {
                    if reason != FINISH_STOP {
                        return Some((
                            Err(Error::streaming(format!("model stopped: {reason}"), None)),
                            (payloads, seen, true),
                        ));
                    }
                }
                let text: String = candidate
                    .content
                    .map(|content| content.parts.iter().map(ResponsePart::render).collect())
                    .unwrap_or_default();
                if text.is_empty() && delta == 0 {
                    continue;
                }
                return Some((
                    Ok(StreamToken::with_count(text, delta)),
                    (payloads, seen, false),
                ));
            }
        },
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    safety_settings: Vec<SafetySetting>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

impl Part {
    fn text(text: String) -> Self {
        Self { text }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct SafetySetting {
    category: String,
    threshold: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelEntry {
    name: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    input_token_limit: u32,
    #[serde(default)]
    version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
    function_call: Option<NamedPart>,
    function_response: Option<NamedPart>,
    file_data: Option<FileData>,
    executable_code: Option<ExecutableCode>,
    code_execution_result: Option<CodeExecutionResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
}

#[derive(Debug, Deserialize)]
struct NamedPart {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    file_uri: String,
}

#[derive(Debug, Deserialize)]
struct ExecutableCode {
    #[serde(default)]
    language: String,
    #[serde(default)]
    code: String,
}

#[derive(Debug, Deserialize)]
struct CodeExecutionResult {
    #[serde(default)]
    output: String,
}

impl ResponsePart {
    /// Text of the part, or a short description of a non-text part.
    fn render(&self) -> String {
        if let Some(text) = &self.text {
            return text.clone();
        }
        if let Some(data) = &self.inline_data {
            return format!("(inline-data type: {})\n", data.mime_type);
        }
        if let Some(call) = &self.function_call {
            return format!("(function-call name: {})\n", call.name);
        }
        if let Some(response) = &self.function_response {
            return format!("(function-response name: {})\n", response.name);
        }
        if let Some(file) = &self.file_data {
            return format!("(file-data uri: {})\n", file.file_uri);
        }
        if let Some(code) = &self.executable_code {
            return format!(
                "(executable-code lang: {}, code: {})\n",
                code.language, code.code
            );
        }
        if let Some(result) = &self.code_execution_result {
            return format!("(code-execution-result output: {})\n", result.output);
        }
        String::from("(unknown part)\n")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    candidates_token_count: u64,
}
