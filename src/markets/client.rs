use crate::error::MarketGenError;
use crate::markets::config::GenerationConfig;
use crate::markets::events::{Event, EventSink};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_details: Option<Value>,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            reasoning_details: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            reasoning_details: None,
        }
    }

    /// A prior model turn, replayed with whatever reasoning it carried.
    pub fn assistant(content: impl Into<String>, reasoning_details: Option<Value>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            reasoning_details,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<PromptMessage>,
    pub temperature: f64,
    /// Overrides the configured output cap.
    pub max_tokens: Option<u32>,
    /// Label carried into request events.
    pub attempt: &'static str,
}

impl CompletionRequest {
    pub fn new(
        model: impl Into<String>,
        messages: Vec<PromptMessage>,
        temperature: f64,
        attempt: &'static str,
    ) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature,
            max_tokens: None,
            attempt,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    /// Trimmed text of the first choice.
    pub content: String,
    pub reasoning_details: Option<Value>,
}

/// One request/response exchange with a text-generation backend. No retries.
pub trait CompletionBackend {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion, MarketGenError>;
}

#[derive(Debug, Default, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    error: Option<WireError>,
}

#[derive(Debug, Default, Deserialize)]
struct WireChoice {
    text: Option<String>,
    finish_reason: Option<String>,
    native_finish_reason: Option<String>,
    message: Option<WireMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct WireMessage {
    content: Option<ChoiceContent>,
    reasoning_details: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChoiceContent {
    Text(String),
    Parts(Vec<ContentPart>),
    Other(Value),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentPart {
    Text(String),
    Fragment { text: Option<String> },
    Other(Value),
}

#[derive(Debug, Serialize, Deserialize)]
struct WireError {
    message: Option<String>,
    metadata: Option<WireErrorMetadata>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireErrorMetadata {
    raw: Option<Value>,
}

fn content_text(content: &ChoiceContent) -> String {
    match content {
        ChoiceContent::Text(text) => text.trim().to_string(),
        ChoiceContent::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => text.as_str(),
                ContentPart::Fragment { text } => text.as_deref().unwrap_or(""),
                ContentPart::Other(_) => "",
            })
            .collect::<String>()
            .trim()
            .to_string(),
        ChoiceContent::Other(_) => String::new(),
    }
}

/// Message content first, then the legacy `text` key.
fn choice_text(choice: &WireChoice) -> String {
    let from_message = choice
        .message
        .as_ref()
        .and_then(|m| m.content.as_ref())
        .map(content_text)
        .unwrap_or_default();
    if !from_message.is_empty() {
        return from_message;
    }
    choice
        .text
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

fn error_message(error: Option<&WireError>, status: u16) -> String {
    let Some(error) = error else {
        return format!("OpenRouter request failed ({status}).");
    };
    let raw = error
        .metadata
        .as_ref()
        .and_then(|m| m.raw.as_ref())
        .map(|raw| match raw {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .filter(|raw| !raw.trim().is_empty());
    match (error.message.as_deref(), raw) {
        (message, Some(raw)) => format!("{} | {raw}", message.unwrap_or("OpenRouter error")),
        (Some(message), None) => message.to_string(),
        (None, None) => format!("OpenRouter request failed ({status})."),
    }
}

pub fn request_body(config: &GenerationConfig, request: &CompletionRequest) -> Value {
    json!({
        "model": request.model,
        "temperature": request.temperature,
        "messages": request.messages,
        "max_tokens": config.output_token_cap(request.max_tokens),
        "reasoning": { "enabled": config.sends_reasoning() },
    })
}

/// Blocking OpenRouter chat-completions client.
pub struct OpenRouterClient<'a> {
    config: &'a GenerationConfig,
    http: Client,
    events: &'a dyn EventSink,
}

impl<'a> OpenRouterClient<'a> {
    pub fn new(
        config: &'a GenerationConfig,
        events: &'a dyn EventSink,
    ) -> Result<Self, MarketGenError> {
        if config.api_key.trim().is_empty() {
            return Err(MarketGenError::Configuration(
                "OPENROUTER_API_KEY is missing.".to_string(),
            ));
        }
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|err| MarketGenError::Configuration(format!("http client: {err}")))?;
        Ok(Self {
            config,
            http,
            events,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> MarketGenError {
        if err.is_timeout() {
            MarketGenError::BackendTimeout {
                timeout_ms: self.config.request_timeout_ms,
            }
        } else {
            MarketGenError::BackendTransport(err.to_string())
        }
    }
}

impl CompletionBackend for OpenRouterClient<'_> {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion, MarketGenError> {
        let body = request_body(self.config, request);
        let started = Instant::now();
        self.events.record(
            &Event::new("request:start")
                .with("model", request.model.as_str())
                .with("messageCount", request.messages.len())
                .with("reasoningEnabled", self.config.sends_reasoning())
                .with("maxTokens", self.config.output_token_cap(request.max_tokens))
                .with("attempt", request.attempt),
        );

        let mut builder = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .header("X-Title", &self.config.app_title)
            .json(&body);
        if let Some(referer) = &self.config.referer {
            builder = builder.header("HTTP-Referer", referer);
        }

        let response = builder.send().map_err(|err| self.transport_error(err))?;
        let status = response.status();
        let raw = response.text().map_err(|err| self.transport_error(err))?;
        self.events.record(
            &Event::new("request:response")
                .with("model", request.model.as_str())
                .with("status", status.as_u16())
                .with("elapsedMs", started.elapsed().as_millis() as u64)
                .with("attempt", request.attempt),
        );

        let parsed = serde_json::from_str::<WireResponse>(&raw);
        if !status.is_success() {
            let wire = parsed.unwrap_or_default();
            let payload = wire
                .error
                .as_ref()
                .and_then(|e| serde_json::to_value(e).ok())
                .unwrap_or(Value::Null);
            self.events.record(
                &Event::new("request:error-payload")
                    .with("model", request.model.as_str())
                    .with("error", payload),
            );
            return Err(MarketGenError::BackendHttp {
                status: status.as_u16(),
                message: error_message(wire.error.as_ref(), status.as_u16()),
            });
        }

        let wire = parsed.map_err(|err| {
            MarketGenError::BackendTransport(format!("unreadable response body: {err}"))
        })?;
        read_completion(&wire, request, self.events)
    }
}

/// First choice of a successful response; empty text is reported and rejected.
fn read_completion(
    wire: &WireResponse,
    request: &CompletionRequest,
    events: &dyn EventSink,
) -> Result<Completion, MarketGenError> {
    let choice = wire.choices.first();
    let completion = Completion {
        content: choice.map(choice_text).unwrap_or_default(),
        reasoning_details: choice
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.reasoning_details.clone()),
    };
    if !completion.content.is_empty() {
        return Ok(completion);
    }

    events.record(
        &Event::new("request:empty-content")
            .with("model", request.model.as_str())
            .with("attempt", request.attempt)
            .with("hasMessage", choice.is_some_and(|c| c.message.is_some()))
            .with(
                "hasReasoningDetails",
                completion.reasoning_details.is_some(),
            )
            .with(
                "finishReason",
                choice.and_then(|c| c.finish_reason.clone()),
            )
            .with(
                "nativeFinishReason",
                choice.and_then(|c| c.native_finish_reason.clone()),
            ),
    );
    Err(MarketGenError::EmptyBackendOutput)
}
