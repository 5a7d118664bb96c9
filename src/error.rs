use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// One violated field reported by schema validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    pub path: String,
    pub message: String,
}

impl SchemaIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() {
            "root"
        } else {
            self.path.as_str()
        };
        write!(f, "{path}: {}", self.message)
    }
}

fn join_issues(issues: &[SchemaIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum MarketGenError {
    #[error("Chat text is empty.")]
    EmptyInput,
    #[error("configuration invalid: {0}")]
    Configuration(String),
    #[error("OpenRouter request timed out after {timeout_ms}ms.")]
    BackendTimeout { timeout_ms: u64 },
    #[error("{message}")]
    BackendHttp { status: u16, message: String },
    #[error("OpenRouter transport failure: {0}")]
    BackendTransport(String),
    #[error("OpenRouter returned an empty response.")]
    EmptyBackendOutput,
    #[error("Model output is not valid JSON.")]
    InvalidJson,
    #[error("LLM response failed schema validation: {}", join_issues(.issues))]
    SchemaValidation { issues: Vec<SchemaIssue> },
    #[error("[{model}] {message}")]
    GenerationFailed { model: String, message: String },
}

fn context_overflow_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)context length|context_length_exceeded|maximum context")
            .expect("context overflow pattern is valid")
    })
}

/// Message-shape check for context-window overflows.
///
/// Providers do not agree on a structured code for this, so the match runs on
/// the rendered message. It can misfire on unrelated errors that quote the
/// same phrases.
pub fn looks_like_context_overflow(message: &str) -> bool {
    context_overflow_pattern().is_match(message)
}

impl MarketGenError {
    pub fn is_context_overflow(&self) -> bool {
        match self {
            Self::BackendHttp { .. }
            | Self::SchemaValidation { .. }
            | Self::BackendTransport(_) => looks_like_context_overflow(&self.to_string()),
            _ => false,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyInput => "E_EMPTY_INPUT",
            Self::Configuration(_) => "E_CONFIG",
            Self::BackendTimeout { .. } => "E_BACKEND_TIMEOUT",
            Self::BackendHttp { .. } if self.is_context_overflow() => "E_CONTEXT_LENGTH",
            Self::BackendHttp { .. } => "E_BACKEND_HTTP",
            Self::BackendTransport(_) => "E_BACKEND_TRANSPORT",
            Self::EmptyBackendOutput => "E_EMPTY_OUTPUT",
            Self::InvalidJson => "E_INVALID_JSON",
            Self::SchemaValidation { .. } => "E_SCHEMA",
            Self::GenerationFailed { .. } => "E_GENERATION_FAILED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_joins_issue_paths() {
        let err = MarketGenError::SchemaValidation {
            issues: vec![
                SchemaIssue::new("market_ideas.0.title", "must not be empty"),
                SchemaIssue::new("", "expected object"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "LLM response failed schema validation: market_ideas.0.title: must not be empty; root: expected object"
        );
    }

    #[test]
    fn context_overflow_matches_known_phrasings() {
        for message in [
            "This model's maximum context length is 8192 tokens",
            "error code: context_length_exceeded",
            "Input exceeds Maximum Context window",
        ] {
            let err = MarketGenError::BackendHttp {
                status: 400,
                message: message.to_string(),
            };
            assert!(err.is_context_overflow(), "{message}");
            assert_eq!(err.code(), "E_CONTEXT_LENGTH");
        }
    }

    #[test]
    fn timeouts_and_empty_output_are_not_retryable() {
        assert!(!MarketGenError::BackendTimeout { timeout_ms: 15_000 }.is_context_overflow());
        assert!(!MarketGenError::EmptyBackendOutput.is_context_overflow());
        let rate_limited = MarketGenError::BackendHttp {
            status: 429,
            message: "Rate limit exceeded | upstream busy".to_string(),
        };
        assert!(!rate_limited.is_context_overflow());
        assert_eq!(rate_limited.code(), "E_BACKEND_HTTP");
    }

    #[test]
    fn generation_failure_is_prefixed_with_model() {
        let err = MarketGenError::GenerationFailed {
            model: "stepfun/step-3.5-flash:free".to_string(),
            message: "OpenRouter returned an empty response.".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "[stepfun/step-3.5-flash:free] OpenRouter returned an empty response."
        );
    }
}
