use crate::markets::budget::{SizeLimits, clip_text};
use crate::markets::chunk::split_newest_first;
use crate::markets::events::{Event, EventSink};
use crate::markets::summarize::{ChunkInput, ChunkSummarizer, LocalSummarizer, local_summary};
use crate::markets::util::char_len;
use std::time::Instant;

/// Summarize each newest-first chunk and join the labeled summaries, clipped
/// back to the input budget.
///
/// With `remote` set, each chunk is first offered to it and falls back to the
/// local extraction on any error; the digest never fails.
pub fn build_chunked_digest(
    chat_text: &str,
    limits: &SizeLimits,
    remote: Option<&dyn ChunkSummarizer>,
    events: &dyn EventSink,
) -> String {
    let chunks = split_newest_first(
        chat_text,
        limits.chunk_size_chars,
        limits.chunk_overlap_chars,
        limits.max_chunks,
    );
    let summarizer: &dyn ChunkSummarizer = remote.unwrap_or(&LocalSummarizer);
    let total = chunks.len();

    events.record(
        &Event::new("chunking:start")
            .with("inputChars", char_len(chat_text))
            .with("chunkCount", total)
            .with("chunkSize", limits.chunk_size_chars)
            .with("chunkOverlap", limits.chunk_overlap_chars)
            .with("maxChunks", limits.max_chunks)
            .with("order", "newest-first")
            .with("summaryMode", summarizer.mode_label()),
    );

    let mut sections = Vec::with_capacity(total);
    for (idx, text) in chunks.iter().enumerate() {
        let chunk = ChunkInput {
            text,
            rank: idx + 1,
            total,
        };
        let started = Instant::now();
        events.record(
            &Event::new("chunk:summary:start")
                .with("chunkIndex", chunk.rank)
                .with("total", total)
                .with("chunkChars", char_len(text)),
        );

        let summary = match summarizer.summarize(&chunk) {
            Ok(summary) => summary,
            Err(err) => {
                events.record(
                    &Event::new("chunk:summary:fallback")
                        .with("chunkIndex", chunk.rank)
                        .with("total", total)
                        .with("error", err.to_string()),
                );
                local_summary(text)
            }
        };

        events.record(
            &Event::new("chunk:summary:done")
                .with("chunkIndex", chunk.rank)
                .with("total", total)
                .with("summaryChars", char_len(&summary))
                .with("elapsedMs", started.elapsed().as_millis() as u64),
        );
        sections.push(format!("RecentChunkRank {}/{total}\n{summary}", chunk.rank));
    }

    let digest = sections.join("\n\n");
    let clipped = clip_text(&digest, limits.max_input_chars);
    events.record(
        &Event::new("chunking:digest-ready")
            .with("digestChars", char_len(&digest))
            .with("clippedDigestChars", char_len(&clipped)),
    );
    clipped
}
