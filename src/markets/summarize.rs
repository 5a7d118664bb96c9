use crate::error::MarketGenError;
use crate::markets::chat::parse_header;
use crate::markets::client::{CompletionBackend, CompletionRequest, PromptMessage};
use crate::markets::prompts::{
    CHUNK_SUMMARY_MAX_CHARS, CHUNK_SUMMARY_MAX_TOKENS, CHUNK_SUMMARY_TEMPERATURE,
    CHUNK_SYSTEM_PROMPT, chunk_user_prompt,
};
use crate::markets::util::take_chars;
use regex::Regex;
use std::sync::OnceLock;

const MAX_NAMES: usize = 15;
const MAX_QUOTES: usize = 10;
const MAX_FACTS: usize = 10;
const MAX_QUOTE_CHARS: usize = 120;
const MAX_FACT_CHARS: usize = 140;

/// One chunk plus its rank among all chunks (1 = newest).
#[derive(Debug, Clone, Copy)]
pub struct ChunkInput<'a> {
    pub text: &'a str,
    pub rank: usize,
    pub total: usize,
}

pub trait ChunkSummarizer {
    fn summarize(&self, chunk: &ChunkInput<'_>) -> Result<String, MarketGenError>;

    fn mode_label(&self) -> &'static str;
}

pub struct LocalSummarizer;

pub struct BackendSummarizer<'a> {
    backend: &'a dyn CompletionBackend,
    model: &'a str,
}

impl<'a> BackendSummarizer<'a> {
    pub fn new(backend: &'a dyn CompletionBackend, model: &'a str) -> Self {
        Self { backend, model }
    }
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:^|[-\s])([A-Z][a-zA-Z]{2,})[:,-]").expect("name pattern is valid")
    })
}

fn logistics_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(today|tonight|tomorrow|weekend|friday|saturday|sunday|pm|am|at\s+\d|meet|bring|arrive|leave|book|plan|היום|הערב|מחר|שישי|שבת)\b",
        )
        .expect("logistics pattern is valid")
    })
}

fn push_unique(list: &mut Vec<String>, value: &str, limit: usize) {
    if list.len() < limit && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

fn join_or(items: &[String], separator: &str, empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join(separator)
    }
}

/// Names, quotes and logistics lines pulled from a chunk without a model.
pub fn local_summary(chunk_text: &str) -> String {
    let mut names = Vec::new();
    let mut quotes = Vec::new();
    let mut facts = Vec::new();

    let lines: Vec<&str> = chunk_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    for line in lines.into_iter().rev() {
        let body = match parse_header(line) {
            Some(message) => {
                if let Some(first) = message.speaker.split_whitespace().next() {
                    push_unique(&mut names, first, MAX_NAMES);
                }
                Some(message.text)
            }
            None => {
                if let Some(caps) = name_pattern().captures(line) {
                    push_unique(&mut names, &caps[1], MAX_NAMES);
                }
                line.split_once(':').map(|(_, rest)| rest.trim().to_string())
            }
        };

        if let Some(body) = body
            && body.chars().count() > 8
            && quotes.len() < MAX_QUOTES
        {
            quotes.push(format!("\"{}\"", take_chars(&body, MAX_QUOTE_CHARS)));
        }

        if facts.len() < MAX_FACTS && logistics_pattern().is_match(line) {
            facts.push(take_chars(line, MAX_FACT_CHARS).to_string());
        }
    }

    let summary = [
        format!("Names: {}", join_or(&names, ", ", "None detected")),
        format!("Facts: {}", join_or(&facts, " | ", "No clear logistics extracted")),
        format!("Quotes: {}", join_or(&quotes, " | ", "No stable quotes extracted")),
        "Recency: prioritized newest lines in this chunk.".to_string(),
        "Uncertainty: local extraction, no model summary.".to_string(),
    ]
    .join("\n");
    take_chars(&summary, CHUNK_SUMMARY_MAX_CHARS).to_string()
}

impl ChunkSummarizer for LocalSummarizer {
    fn summarize(&self, chunk: &ChunkInput<'_>) -> Result<String, MarketGenError> {
        Ok(local_summary(chunk.text))
    }

    fn mode_label(&self) -> &'static str {
        "local"
    }
}

impl ChunkSummarizer for BackendSummarizer<'_> {
    fn summarize(&self, chunk: &ChunkInput<'_>) -> Result<String, MarketGenError> {
        let request = CompletionRequest::new(
            self.model,
            vec![
                PromptMessage::system(CHUNK_SYSTEM_PROMPT),
                PromptMessage::user(chunk_user_prompt(chunk.text, chunk.rank, chunk.total)),
            ],
            CHUNK_SUMMARY_TEMPERATURE,
            "chunk-summary",
        )
        .with_max_tokens(CHUNK_SUMMARY_MAX_TOKENS);

        let completion = self.backend.complete(&request)?;
        let trimmed = completion.content.trim();
        if trimmed.is_empty() {
            return Err(MarketGenError::EmptyBackendOutput);
        }
        Ok(take_chars(trimmed, CHUNK_SUMMARY_MAX_CHARS).to_string())
    }

    fn mode_label(&self) -> &'static str {
        "llm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markets::testing::{ScriptedBackend, reply};

    #[test]
    fn local_summary_reads_newest_lines_first() {
        let chunk = "\
[20/2/26, 18:02] Dana Cohen: let's meet friday at Merlen
[20/2/26, 18:05] Avi: bring the speaker please
random continuation line";
        let summary = local_summary(chunk);
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], "Names: Avi, Dana");
        assert!(lines[1].starts_with("Facts: [20/2/26, 18:05] Avi: bring the speaker please"));
        assert_eq!(
            lines[2],
            "Quotes: \"bring the speaker please\" | \"let's meet friday at Merlen\""
        );
        assert!(summary.chars().count() <= CHUNK_SUMMARY_MAX_CHARS);
    }

    #[test]
    fn local_summary_without_signals_says_so() {
        let summary = local_summary("ok\nyes");
        assert!(summary.contains("Names: None detected"));
        assert!(summary.contains("Facts: No clear logistics extracted"));
        assert!(summary.contains("Quotes: No stable quotes extracted"));
    }

    #[test]
    fn plain_colon_lines_still_yield_names_and_quotes() {
        let summary = local_summary("Noa: we will arrive around nine tonight");
        assert!(summary.starts_with("Names: Noa"));
        assert!(summary.contains("\"we will arrive around nine tonight\""));
    }

    #[test]
    fn backend_summary_is_capped_and_uses_chunk_settings() {
        let backend = ScriptedBackend::new(vec![reply("x".repeat(5_000), None)]);
        let summarizer = BackendSummarizer::new(&backend, "test/model");
        let summary = summarizer
            .summarize(&ChunkInput {
                text: "chunk body",
                rank: 1,
                total: 3,
            })
            .expect("summary");
        assert_eq!(summary.chars().count(), CHUNK_SUMMARY_MAX_CHARS);

        let seen = backend.requests();
        assert_eq!(seen[0].max_tokens, Some(900));
        assert_eq!(seen[0].temperature, 0.0);
        assert!(seen[0].messages[1].content.starts_with("Chunk 1/3"));
    }

    #[test]
    fn backend_failures_propagate_to_caller() {
        let backend = ScriptedBackend::default();
        let summarizer = BackendSummarizer::new(&backend, "test/model");
        let chunk = ChunkInput {
            text: "chunk",
            rank: 1,
            total: 1,
        };
        assert!(summarizer.summarize(&chunk).is_err());
    }
}
