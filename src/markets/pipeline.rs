use crate::error::MarketGenError;
use crate::markets::budget::clip_text;
use crate::markets::client::CompletionBackend;
use crate::markets::config::{ChunkSummaryMode, GenerationConfig};
use crate::markets::digest::build_chunked_digest;
use crate::markets::events::{Event, EventSink};
use crate::markets::heuristic::{HeuristicGenerator, HeuristicTuning};
use crate::markets::protocol::run_attempt;
use crate::markets::summarize::{BackendSummarizer, ChunkSummarizer};
use crate::markets::types::GenerationResult;
use crate::markets::util::char_len;
use chrono::{DateTime, Utc};

const UNUSABLE_OUTPUT_REASON: &str = "empty-or-unusable-model-output";

/// Chat text in, validated market ideas out.
///
/// Holds no state between calls; everything it needs is borrowed.
pub struct MarketGenerator<'a> {
    config: &'a GenerationConfig,
    backend: &'a dyn CompletionBackend,
    events: &'a dyn EventSink,
    heuristic: HeuristicGenerator,
}

impl<'a> MarketGenerator<'a> {
    pub fn new(
        config: &'a GenerationConfig,
        backend: &'a dyn CompletionBackend,
        events: &'a dyn EventSink,
    ) -> Self {
        Self {
            config,
            backend,
            events,
            heuristic: HeuristicGenerator::default(),
        }
    }

    pub fn with_tuning(mut self, tuning: HeuristicTuning) -> Self {
        self.heuristic = HeuristicGenerator::new(tuning);
        self
    }

    pub fn generate(&self, chat_text: &str) -> Result<GenerationResult, MarketGenError> {
        self.generate_at(chat_text, Utc::now())
    }

    /// `now` is the earliest anchor for fallback close times.
    pub fn generate_at(
        &self,
        chat_text: &str,
        now: DateTime<Utc>,
    ) -> Result<GenerationResult, MarketGenError> {
        let trimmed = chat_text.trim();
        if trimmed.is_empty() {
            return Err(MarketGenError::EmptyInput);
        }

        let model = self.config.model.as_str();
        let limits = &self.config.limits;
        let chunking_used = limits.needs_chunking(trimmed);
        let source = if chunking_used {
            let backend_summarizer = BackendSummarizer::new(self.backend, model);
            let remote: Option<&dyn ChunkSummarizer> = match self.config.chunk_summary_mode {
                ChunkSummaryMode::Backend => Some(&backend_summarizer),
                ChunkSummaryMode::Local => None,
            };
            build_chunked_digest(trimmed, limits, remote, self.events)
        } else {
            trimmed.to_string()
        };

        let budgets = limits.input_budgets();
        self.events.record(
            &Event::new("generate:start")
                .with("model", model)
                .with("inputChars", char_len(chat_text))
                .with("effectiveInputChars", char_len(&source))
                .with("chunkingUsed", chunking_used)
                .with("inputBudgets", budgets.clone())
                .with("maxInputChars", limits.max_input_chars),
        );

        let mut last_failure: Option<MarketGenError> = None;
        for (idx, budget) in budgets.iter().copied().enumerate() {
            let clipped = clip_text(&source, budget);
            match run_attempt(self.backend, model, &clipped, budget, self.events) {
                Ok(output) => {
                    return Ok(GenerationResult {
                        model_used: model.to_string(),
                        market_ideas: output.market_ideas,
                        reasoning_trace: self
                            .config
                            .reasoning_enabled
                            .then_some(output.reasoning),
                    });
                }
                Err(err) => {
                    let context_error = err.is_context_overflow();
                    self.events.record(
                        &Event::new("model:failed")
                            .with("model", model)
                            .with("budgetChars", budget)
                            .with("error", err.to_string())
                            .with("code", err.code())
                            .with("isContextError", context_error),
                    );
                    last_failure = Some(err);

                    let next_budget = budgets.get(idx + 1).copied();
                    match next_budget {
                        Some(next) if context_error => {
                            self.events.record(
                                &Event::new("model:retry-with-smaller-budget")
                                    .with("model", model)
                                    .with("nextBudget", next),
                            );
                        }
                        _ => break,
                    }
                }
            }
        }

        let reason = last_failure
            .as_ref()
            .map_or_else(|| UNUSABLE_OUTPUT_REASON.to_string(), ToString::to_string);
        if !self.config.heuristic_fallback {
            return Err(MarketGenError::GenerationFailed {
                model: model.to_string(),
                message: reason,
            });
        }

        self.events.record(
            &Event::new("fallback:heuristic-markets")
                .with("model", model)
                .with("reason", reason)
                .with("sourceChars", char_len(trimmed)),
        );
        Ok(GenerationResult {
            model_used: format!("{model}-heuristic-fallback"),
            market_ideas: self.heuristic.generate(trimmed, now),
            reasoning_trace: None,
        })
    }
}

/// Local generation only; no backend, no credentials.
pub fn generate_heuristic(
    chat_text: &str,
    tuning: HeuristicTuning,
    now: DateTime<Utc>,
) -> Result<GenerationResult, MarketGenError> {
    let trimmed = chat_text.trim();
    if trimmed.is_empty() {
        return Err(MarketGenError::EmptyInput);
    }
    Ok(GenerationResult {
        model_used: "heuristic".to_string(),
        market_ideas: HeuristicGenerator::new(tuning).generate(trimmed, now),
        reasoning_trace: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markets::events::MemorySink;
    use crate::markets::heuristic::HEURISTIC_MARKET_COUNT;
    use crate::markets::testing::{ScriptedBackend, overflow, reply};
    use chrono::TimeZone;
    use serde_json::{Value, json};

    fn valid_json() -> String {
        json!({
            "market_ideas": [{
                "title": "Will the picnic move indoors?",
                "description": "Weather pivot.",
                "category": "Weekend",
                "market_type": "YES_NO",
                "resolution_criteria": "Resolves YES if the group meets indoors.",
                "close_time_guess": "2026-03-07T12:00:00Z",
                "outcomes": [
                    { "label": "Yes", "initial_probability": 0.4 },
                    { "label": "No", "initial_probability": 0.6 }
                ],
                "scores": { "creativity": 0.5, "clarity": 0.7, "evidence": 0.5, "fun": 0.6 }
            }]
        })
        .to_string()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    const CHAT: &str = "[21/2/26, 22:10] Avi: on my way, 10 min\n[21/2/26, 22:12] Dana: \"save me a seat please\"";

    #[test]
    fn blank_input_fails_before_any_call() {
        let config = GenerationConfig::with_api_key("k");
        let backend = ScriptedBackend::default();
        let sink = MemorySink::default();
        let generator = MarketGenerator::new(&config, &backend, &sink);
        let err = generator.generate_at("  \n\t ", now()).expect_err("empty");
        assert!(matches!(err, MarketGenError::EmptyInput));
        assert_eq!(backend.calls(), 0);
        assert_eq!(sink.count("generate:start"), 0);
    }

    #[test]
    fn short_input_is_sent_unmodified_on_first_attempt() {
        let config = GenerationConfig::with_api_key("k");
        let backend =
            ScriptedBackend::new(vec![reply(format!("Sure! {} Enjoy", valid_json()), None)]);
        let sink = MemorySink::default();
        let result = MarketGenerator::new(&config, &backend, &sink)
            .generate_at(&format!("  {CHAT}\n"), now())
            .expect("generated");

        assert_eq!(result.model_used, config.model);
        assert_eq!(result.market_ideas.len(), 1);
        assert!(result.reasoning_trace.is_none());
        assert_eq!(backend.calls(), 1);
        let seen = backend.requests();
        assert!(seen[0].messages[1].content.contains(CHAT));
        assert_eq!(sink.count("chunking:start"), 0);
    }

    #[test]
    fn context_overflow_walks_every_budget_then_falls_back() {
        let config = GenerationConfig::with_api_key("k");
        let backend = ScriptedBackend::new(vec![overflow(), overflow(), overflow()]);
        let sink = MemorySink::default();
        let result = MarketGenerator::new(&config, &backend, &sink)
            .generate_at(CHAT, now())
            .expect("fallback");

        assert_eq!(backend.calls(), 3);
        assert_eq!(sink.count("model:retry-with-smaller-budget"), 2);
        assert_eq!(sink.count("fallback:heuristic-markets"), 1);
        assert_eq!(
            result.model_used,
            format!("{}-heuristic-fallback", config.model)
        );
        assert_eq!(result.market_ideas.len(), HEURISTIC_MARKET_COUNT);

        let budgets: Vec<u64> = sink
            .events()
            .iter()
            .filter(|e| e.name == "model:attempt")
            .filter_map(|e| e.field("budgetChars").and_then(Value::as_u64))
            .collect();
        assert_eq!(budgets, vec![40_000, 20_000, 10_000]);
    }

    #[test]
    fn en_route_line_surfaces_in_fallback_evidence() {
        let config = GenerationConfig::with_api_key("k");
        let backend = ScriptedBackend::new(vec![Err(MarketGenError::BackendTimeout {
            timeout_ms: 15_000,
        })]);
        let result = MarketGenerator::new(&config, &backend, &MemorySink::default())
            .generate_at(CHAT, now())
            .expect("fallback");
        let quotes: Vec<&str> = result
            .market_ideas
            .iter()
            .flat_map(|idea| idea.evidence.iter().map(|e| e.quote.as_str()))
            .collect();
        assert!(quotes.contains(&"on my way, 10 min"));
    }

    #[test]
    fn non_context_failure_stops_retrying() {
        let config = GenerationConfig::with_api_key("k");
        let backend = ScriptedBackend::new(vec![Err(MarketGenError::BackendHttp {
            status: 429,
            message: "Rate limit exceeded".to_string(),
        })]);
        let sink = MemorySink::default();
        let result = MarketGenerator::new(&config, &backend, &sink)
            .generate_at(CHAT, now())
            .expect("fallback");
        assert_eq!(backend.calls(), 1);
        assert_eq!(sink.count("model:retry-with-smaller-budget"), 0);
        assert!(result.model_used.ends_with("-heuristic-fallback"));
    }

    #[test]
    fn disabled_fallback_surfaces_last_failure_with_model_prefix() {
        let config = GenerationConfig {
            heuristic_fallback: false,
            ..GenerationConfig::with_api_key("k")
        };
        let backend = ScriptedBackend::new(vec![overflow(), overflow(), overflow()]);
        let sink = MemorySink::default();
        let err = MarketGenerator::new(&config, &backend, &sink)
            .generate_at(CHAT, now())
            .expect_err("no fallback");
        assert_eq!(
            err.to_string(),
            format!(
                "[{}] Provider returned error | context_length_exceeded",
                config.model
            )
        );
        assert_eq!(sink.count("fallback:heuristic-markets"), 0);
    }

    #[test]
    fn oversized_input_is_chunked_into_a_bounded_digest() {
        let mut chat = String::new();
        let mut n = 0;
        while chat.chars().count() < 50_000 {
            chat.push_str(&format!(
                "[20/2/26, 18:{:02}] Member{}: plan number {n} for the weekend meetup\n",
                n % 60,
                n % 9
            ));
            n += 1;
        }
        let chat: String = chat.chars().take(50_000).collect();

        let config = GenerationConfig::with_api_key("k");
        let backend = ScriptedBackend::new(vec![reply(valid_json(), None)]);
        let sink = MemorySink::default();
        MarketGenerator::new(&config, &backend, &sink)
            .generate_at(&chat, now())
            .expect("generated");

        assert_eq!(sink.count("chunk:summary:done"), 5);
        assert_eq!(backend.calls(), 1);
        let events = sink.events();
        let ready = events
            .iter()
            .find(|e| e.name == "chunking:digest-ready")
            .expect("digest event");
        let clipped = ready
            .field("clippedDigestChars")
            .and_then(Value::as_u64)
            .expect("chars");
        assert!(clipped <= 40_000);
        let seen = backend.requests();
        assert!(seen[0].messages[1].content.contains("RecentChunkRank 1/5"));
    }

    #[test]
    fn backend_chunk_summaries_are_requested_when_enabled() {
        let config = GenerationConfig {
            chunk_summary_mode: ChunkSummaryMode::Backend,
            ..GenerationConfig::with_api_key("k")
        };
        let chat = "[20/2/26, 18:00] Avi: lets meet at eight\n".repeat(1_200);
        // Summaries for all 5 chunks fail, then the generation reply succeeds.
        let backend = ScriptedBackend::new(vec![
            overflow(),
            overflow(),
            overflow(),
            overflow(),
            overflow(),
            reply(valid_json(), None),
        ]);
        let sink = MemorySink::default();
        let result = MarketGenerator::new(&config, &backend, &sink)
            .generate_at(&chat, now())
            .expect("generated");
        assert_eq!(result.model_used, config.model);
        assert_eq!(sink.count("chunk:summary:fallback"), 5);
        assert_eq!(backend.requests()[0].max_tokens, Some(900));
    }

    #[test]
    fn reasoning_trace_is_kept_only_when_enabled() {
        let config = GenerationConfig {
            reasoning_enabled: true,
            ..GenerationConfig::with_api_key("k")
        };
        let backend =
            ScriptedBackend::new(vec![reply(valid_json(), Some(json!({"summary": "r"})))]);
        let result = MarketGenerator::new(&config, &backend, &MemorySink::default())
            .generate_at(CHAT, now())
            .expect("generated");
        assert_eq!(result.reasoning_trace, Some(vec![json!({"summary": "r"})]));
    }

    #[test]
    fn heuristic_only_needs_no_backend() {
        let result = generate_heuristic(CHAT, HeuristicTuning::default(), now()).expect("ok");
        assert_eq!(result.model_used, "heuristic");
        assert_eq!(result.market_ideas.len(), HEURISTIC_MARKET_COUNT);
        assert!(matches!(
            generate_heuristic(" ", HeuristicTuning::default(), now()),
            Err(MarketGenError::EmptyInput)
        ));
    }
}
