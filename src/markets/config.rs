use crate::error::MarketGenError;
use crate::markets::budget::SizeLimits;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL: &str = "stepfun/step-3.5-flash:free";
pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_APP_TITLE: &str = "chat-markets";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
pub const MIN_REQUEST_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 3_500;
pub const DEFAULT_STEPFUN_MAX_OUTPUT_TOKENS: u32 = 12_000;
const STEPFUN_PREFIX: &str = "stepfun/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSummaryMode {
    /// Extract speaker lines locally; no backend calls.
    Local,
    /// Ask the backend for each chunk summary, falling back to local per chunk.
    Backend,
}

#[derive(Clone, PartialEq)]
pub struct GenerationConfig {
    pub model: String,
    pub endpoint: String,
    pub api_key: String,
    pub limits: SizeLimits,
    pub chunk_summary_mode: ChunkSummaryMode,
    pub heuristic_fallback: bool,
    pub request_timeout_ms: u64,
    pub max_output_tokens: u32,
    pub stepfun_max_output_tokens: u32,
    pub reasoning_enabled: bool,
    pub referer: Option<String>,
    pub app_title: String,
    pub audit_log_path: Option<PathBuf>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            limits: SizeLimits::default(),
            chunk_summary_mode: ChunkSummaryMode::Local,
            heuristic_fallback: true,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            stepfun_max_output_tokens: DEFAULT_STEPFUN_MAX_OUTPUT_TOKENS,
            reasoning_enabled: false,
            referer: None,
            app_title: DEFAULT_APP_TITLE.to_string(),
            audit_log_path: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.api_key.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("GenerationConfig")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_key", &key)
            .field("limits", &self.limits)
            .field("chunk_summary_mode", &self.chunk_summary_mode)
            .field("heuristic_fallback", &self.heuristic_fallback)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("stepfun_max_output_tokens", &self.stepfun_max_output_tokens)
            .field("reasoning_enabled", &self.reasoning_enabled)
            .field("referer", &self.referer)
            .field("app_title", &self.app_title)
            .field("audit_log_path", &self.audit_log_path)
            .finish()
    }
}

impl GenerationConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn is_stepfun(&self) -> bool {
        self.model.starts_with(STEPFUN_PREFIX)
    }

    /// Stepfun models always run with reasoning on.
    pub fn sends_reasoning(&self) -> bool {
        self.is_stepfun() || self.reasoning_enabled
    }

    /// Explicit cap, else the stepfun cap for stepfun models, else the generic one.
    pub fn output_token_cap(&self, explicit: Option<u32>) -> u32 {
        match explicit {
            Some(cap) => cap,
            None if self.is_stepfun() => self.stepfun_max_output_tokens,
            None => self.max_output_tokens,
        }
    }
}

/// Optional TOML overrides. Keys mirror the environment table in lower case
/// without the prefix.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub max_input_chars: Option<f64>,
    pub chunk_size_chars: Option<f64>,
    pub chunk_overlap_chars: Option<f64>,
    pub max_chunks: Option<f64>,
    pub use_llm_chunk_summary: Option<bool>,
    pub enable_heuristic_fallback: Option<bool>,
    pub request_timeout_ms: Option<u64>,
    pub max_output_tokens: Option<u32>,
    pub stepfun_max_output_tokens: Option<u32>,
    pub reasoning: Option<bool>,
    pub referer: Option<String>,
    pub app_title: Option<String>,
    pub audit_log: Option<String>,
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

struct Layered<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> Layered<'_, F> {
    fn string(&self, key: &str, file: &Option<String>) -> Option<String> {
        non_empty((self.lookup)(key)).or_else(|| non_empty(file.clone()))
    }

    fn number(&self, key: &str, file: Option<f64>) -> Option<f64> {
        non_empty((self.lookup)(key))
            .and_then(|v| v.parse::<f64>().ok())
            .or(file)
    }

    fn flag(&self, key: &str, file: Option<bool>, fallback: bool) -> bool {
        non_empty((self.lookup)(key))
            .and_then(|v| parse_flag(&v))
            .or(file)
            .unwrap_or(fallback)
    }

    fn positive_u64(&self, key: &str, file: Option<u64>) -> Option<u64> {
        self.number(key, file.map(|v| v as f64))
            .filter(|v| v.is_finite() && *v >= 1.0)
            .map(|v| v.floor() as u64)
    }
}

/// Merge defaults, the parsed file and `lookup` (environment first).
pub fn resolve_config<F>(
    lookup: F,
    file: &FileConfig,
    require_api_key: bool,
) -> Result<GenerationConfig, MarketGenError>
where
    F: Fn(&str) -> Option<String>,
{
    let layer = Layered { lookup: &lookup };
    let defaults = GenerationConfig::default();

    let api_key = layer
        .string("OPENROUTER_API_KEY", &file.api_key)
        .unwrap_or_default();
    if require_api_key && api_key.is_empty() {
        return Err(MarketGenError::Configuration(
            "Missing OPENROUTER_API_KEY in environment.".to_string(),
        ));
    }

    let limits = SizeLimits::from_raw(
        layer.number("OPENROUTER_MAX_INPUT_CHARS", file.max_input_chars),
        layer.number("OPENROUTER_CHUNK_SIZE_CHARS", file.chunk_size_chars),
        layer.number("OPENROUTER_CHUNK_OVERLAP_CHARS", file.chunk_overlap_chars),
        layer.number("OPENROUTER_MAX_CHUNKS", file.max_chunks),
    );

    let chunk_summary_mode = if layer.flag(
        "OPENROUTER_USE_LLM_CHUNK_SUMMARY",
        file.use_llm_chunk_summary,
        false,
    ) {
        ChunkSummaryMode::Backend
    } else {
        ChunkSummaryMode::Local
    };

    let request_timeout_ms = layer
        .positive_u64("OPENROUTER_REQUEST_TIMEOUT_MS", file.request_timeout_ms)
        .filter(|v| *v >= MIN_REQUEST_TIMEOUT_MS)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);

    let max_output_tokens = layer
        .positive_u64(
            "OPENROUTER_MAX_OUTPUT_TOKENS",
            file.max_output_tokens.map(u64::from),
        )
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS);
    let stepfun_max_output_tokens = layer
        .positive_u64(
            "OPENROUTER_STEPFUN_MAX_OUTPUT_TOKENS",
            file.stepfun_max_output_tokens.map(u64::from),
        )
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(DEFAULT_STEPFUN_MAX_OUTPUT_TOKENS);

    Ok(GenerationConfig {
        model: layer
            .string("OPENROUTER_MODEL", &file.model)
            .unwrap_or(defaults.model),
        endpoint: layer
            .string("OPENROUTER_ENDPOINT", &file.endpoint)
            .unwrap_or(defaults.endpoint),
        api_key,
        limits,
        chunk_summary_mode,
        heuristic_fallback: layer.flag(
            "OPENROUTER_ENABLE_HEURISTIC_FALLBACK",
            file.enable_heuristic_fallback,
            true,
        ),
        request_timeout_ms,
        max_output_tokens,
        stepfun_max_output_tokens,
        reasoning_enabled: layer.flag("OPENROUTER_REASONING", file.reasoning, false),
        referer: layer.string("OPENROUTER_REFERER", &file.referer),
        app_title: layer
            .string("OPENROUTER_APP_TITLE", &file.app_title)
            .unwrap_or(defaults.app_title),
        audit_log_path: layer
            .string("CHAT_MARKETS_AUDIT_LOG", &file.audit_log)
            .map(PathBuf::from),
    })
}

pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("CHAT_MARKETS_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let home = dirs::home_dir()?;
    Some(home.join(".chat-markets").join("config.toml"))
}

pub fn read_file_config(path: &Path) -> Result<FileConfig, MarketGenError> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let raw = fs::read_to_string(path).map_err(|err| {
        MarketGenError::Configuration(format!("failed to read {}: {err}", path.display()))
    })?;
    toml::from_str(&raw).map_err(|err| {
        MarketGenError::Configuration(format!("failed to parse {}: {err}", path.display()))
    })
}

pub fn load_config(require_api_key: bool) -> Result<GenerationConfig, MarketGenError> {
    let file = match resolve_config_path() {
        Some(path) => read_file_config(&path)?,
        None => FileConfig::default(),
    };
    resolve_config(|key| env::var(key).ok(), &file, require_api_key)
}
