use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::io::{self, Read};

use crate::cli::GenerateArgs;
use chat_markets::markets::budget::clip_text;
use chat_markets::markets::chunk::split_newest_first;
use chat_markets::markets::client::OpenRouterClient;
use chat_markets::markets::config::{GenerationConfig, load_config};
use chat_markets::markets::digest::build_chunked_digest;
use chat_markets::markets::events::{AuditLogSink, FanoutSink, NullSink, StderrSink};
use chat_markets::markets::heuristic::HeuristicTuning;
use chat_markets::markets::util::char_len;
use chat_markets::{MarketGenerator, generate_heuristic};

fn read_input(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read transcript from stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(source).with_context(|| format!("failed to read transcript {source}"))
}

fn build_sink(config: &GenerationConfig, verbose: bool) -> FanoutSink {
    let mut sink = FanoutSink::default();
    if verbose {
        sink.push(Box::new(StderrSink));
    }
    if let Some(path) = &config.audit_log_path {
        sink.push(Box::new(AuditLogSink::new(path.clone())));
    }
    sink
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}

/// Sizing decisions for `text`, with the digest built from local summaries.
fn dry_run_plan(text: &str, config: &GenerationConfig) -> serde_json::Value {
    let trimmed = text.trim();
    let limits = &config.limits;
    let chunking = limits.needs_chunking(trimmed);
    let (chunk_count, source) = if chunking {
        let chunks = split_newest_first(
            trimmed,
            limits.chunk_size_chars,
            limits.chunk_overlap_chars,
            limits.max_chunks,
        );
        let digest = build_chunked_digest(trimmed, limits, None, &NullSink);
        (chunks.len(), digest)
    } else {
        (0, trimmed.to_string())
    };
    let budgets = limits.input_budgets();
    let first_attempt_chars = budgets
        .first()
        .map_or(0, |budget| char_len(&clip_text(&source, *budget)));

    json!({
        "model": config.model,
        "inputChars": char_len(text),
        "trimmedChars": char_len(trimmed),
        "maxInputChars": limits.max_input_chars,
        "chunkingUsed": chunking,
        "chunkCount": chunk_count,
        "chunkSize": limits.chunk_size_chars,
        "chunkOverlap": limits.chunk_overlap_chars,
        "maxChunks": limits.max_chunks,
        "inputBudgets": budgets,
        "effectiveInputChars": char_len(&source),
        "firstAttemptChars": first_attempt_chars,
        "heuristicFallback": config.heuristic_fallback,
    })
}

pub fn run(args: &GenerateArgs) -> Result<()> {
    let text = read_input(&args.input)?;

    if args.dry_run {
        let config = load_config(false)?;
        return print_json(&dry_run_plan(&text, &config), args.pretty);
    }

    if args.heuristic_only {
        let result = generate_heuristic(&text, HeuristicTuning::default(), Utc::now())?;
        return print_json(&result, args.pretty);
    }

    let mut config = load_config(true)?;
    if args.no_fallback {
        config.heuristic_fallback = false;
    }
    let sink = build_sink(&config, args.verbose);
    let client = OpenRouterClient::new(&config, &sink)?;
    let result = MarketGenerator::new(&config, &client, &sink).generate(&text)?;
    print_json(&result, args.pretty)
}
