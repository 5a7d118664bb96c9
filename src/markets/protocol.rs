//! Generate-then-repair exchange for one input budget.

use crate::error::MarketGenError;
use crate::markets::client::{Completion, CompletionBackend, CompletionRequest, PromptMessage};
use crate::markets::events::{Event, EventSink};
use crate::markets::extract::extract_json_object;
use crate::markets::prompts::{
    GENERATE_TEMPERATURE, REPAIR_TEMPERATURE, SYSTEM_PROMPT, fix_json_prompt, user_prompt,
};
use crate::markets::schema::{finalize_ideas, validate_markets};
use crate::markets::types::MarketIdea;
use crate::markets::util::char_len;
use serde_json::Value;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct AttemptOutput {
    pub market_ideas: Vec<MarketIdea>,
    /// Provider reasoning from each pass that returned some.
    pub reasoning: Vec<Value>,
    pub repaired: bool,
}

/// Extract, validate and finalize one backend reply.
pub fn parse_market_ideas(content: &str) -> Result<Vec<MarketIdea>, MarketGenError> {
    let value = extract_json_object(content)?;
    let response = validate_markets(value)?;
    Ok(finalize_ideas(response.market_ideas))
}

fn collect_reasoning(passes: &[&Completion]) -> Vec<Value> {
    passes
        .iter()
        .filter_map(|pass| pass.reasoning_details.clone())
        .collect()
}

/// Ask for ideas once; on a parse or schema failure, replay the exchange with
/// a fix instruction and validate exactly once more.
pub fn run_attempt(
    backend: &dyn CompletionBackend,
    model: &str,
    input_text: &str,
    budget: usize,
    events: &dyn EventSink,
) -> Result<AttemptOutput, MarketGenError> {
    let started = Instant::now();
    events.record(
        &Event::new("model:attempt")
            .with("model", model)
            .with("budgetChars", budget)
            .with("clippedChars", char_len(input_text)),
    );

    let base_messages = vec![
        PromptMessage::system(SYSTEM_PROMPT),
        PromptMessage::user(user_prompt(input_text)),
    ];
    let first = backend.complete(&CompletionRequest::new(
        model,
        base_messages.clone(),
        GENERATE_TEMPERATURE,
        "initial",
    ))?;

    let first_error = match parse_market_ideas(&first.content) {
        Ok(market_ideas) => {
            events.record(
                &Event::new("model:success-first-pass")
                    .with("model", model)
                    .with("marketCount", market_ideas.len())
                    .with("elapsedMs", started.elapsed().as_millis() as u64),
            );
            return Ok(AttemptOutput {
                market_ideas,
                reasoning: collect_reasoning(&[&first]),
                repaired: false,
            });
        }
        Err(err) => err,
    };

    events.record(
        &Event::new("model:first-pass-invalid-json-or-schema")
            .with("model", model)
            .with("error", first_error.to_string()),
    );

    let mut repair_messages = base_messages;
    repair_messages.push(PromptMessage::assistant(
        first.content.clone(),
        first.reasoning_details.clone(),
    ));
    repair_messages.push(PromptMessage::user(fix_json_prompt(&first.content)));
    let second = backend.complete(&CompletionRequest::new(
        model,
        repair_messages,
        REPAIR_TEMPERATURE,
        "repair",
    ))?;

    let market_ideas = parse_market_ideas(&second.content)?;
    events.record(
        &Event::new("model:success-after-repair")
            .with("model", model)
            .with("marketCount", market_ideas.len())
            .with("elapsedMs", started.elapsed().as_millis() as u64),
    );
    Ok(AttemptOutput {
        market_ideas,
        reasoning: collect_reasoning(&[&first, &second]),
        repaired: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markets::client::Role;
    use crate::markets::events::MemorySink;
    use crate::markets::testing::{ScriptedBackend, reply};
    use serde_json::json;

    fn valid_json() -> String {
        json!({
            "market_ideas": [{
                "title": "Will Noa bring the cake?",
                "description": "Dessert logistics.",
                "category": "Logistics",
                "market_type": "YES_NO",
                "resolution_criteria": "Resolves YES if Noa arrives with cake.",
                "close_time_guess": "2026-03-01T18:00:00Z",
                "outcomes": [
                    { "label": "Yes", "initial_probability": 0.7 },
                    { "label": "No", "initial_probability": 0.3 }
                ],
                "scores": { "creativity": 0.4, "clarity": 0.8, "evidence": 0.6, "fun": 0.9 },
                "evidence": []
            }]
        })
        .to_string()
    }

    #[test]
    fn prose_wrapped_json_passes_without_repair() {
        let backend = ScriptedBackend::new(vec![reply(
            &format!("Here is the result: {} Thanks", valid_json()),
            None,
        )]);
        let sink = MemorySink::default();
        let out = run_attempt(&backend, "m", "chat", 40_000, &sink).expect("ok");
        assert!(!out.repaired);
        assert_eq!(out.market_ideas.len(), 1);
        assert_eq!(backend.calls(), 1);
        assert_eq!(backend.requests()[0].temperature, 0.25);
        assert_eq!(sink.count("model:success-first-pass"), 1);
    }

    #[test]
    fn invalid_first_pass_is_repaired_once() {
        let backend = ScriptedBackend::new(vec![
            reply("I think these markets are fun", Some(json!({"r": 1}))),
            reply(&valid_json(), Some(json!({"r": 2}))),
        ]);
        let sink = MemorySink::default();
        let out = run_attempt(&backend, "m", "chat", 40_000, &sink).expect("ok");
        assert!(out.repaired);
        assert_eq!(out.reasoning, vec![json!({"r": 1}), json!({"r": 2})]);

        let seen = backend.requests();
        assert_eq!(seen.len(), 2);
        let repair = &seen[1];
        assert_eq!(repair.temperature, 0.0);
        assert_eq!(repair.messages.len(), 4);
        assert_eq!(repair.messages[2].role, Role::Assistant);
        assert_eq!(repair.messages[2].content, "I think these markets are fun");
        assert_eq!(repair.messages[2].reasoning_details, Some(json!({"r": 1})));
        assert!(repair.messages[3].content.contains("I think these markets are fun"));
        assert_eq!(
            sink.names(),
            vec![
                "model:attempt",
                "model:first-pass-invalid-json-or-schema",
                "model:success-after-repair"
            ]
        );
    }

    #[test]
    fn second_failure_propagates() {
        let backend = ScriptedBackend::new(vec![
            reply("{\"market_ideas\": []}", None),
            reply("still nothing", None),
        ]);
        let err = run_attempt(&backend, "m", "chat", 40_000, &MemorySink::default())
            .expect_err("fails");
        assert!(matches!(err, MarketGenError::InvalidJson));
        assert_eq!(backend.calls(), 2);
    }

    #[test]
    fn transport_failure_skips_repair() {
        let backend = ScriptedBackend::new(vec![Err(MarketGenError::BackendTimeout {
            timeout_ms: 15_000,
        })]);
        let err = run_attempt(&backend, "m", "chat", 40_000, &MemorySink::default())
            .expect_err("fails");
        assert!(matches!(err, MarketGenError::BackendTimeout { .. }));
        assert_eq!(backend.calls(), 1);
    }
}
