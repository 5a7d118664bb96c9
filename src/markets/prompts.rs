//! Prompt text sent to the completion backend.

/// Upper bound on one chunk summary, backend or local.
pub const CHUNK_SUMMARY_MAX_CHARS: usize = 2_000;
pub const CHUNK_SUMMARY_MAX_TOKENS: u32 = 900;
pub const GENERATE_TEMPERATURE: f64 = 0.25;
pub const REPAIR_TEMPERATURE: f64 = 0.0;
pub const CHUNK_SUMMARY_TEMPERATURE: f64 = 0.0;

pub const SYSTEM_PROMPT: &str = r#"You design playful prediction markets for a group of friends, based on their group chat.
Return ONE JSON object and nothing else. No markdown, no code fences, no commentary.

Shape:
{
  "market_ideas": [
    {
      "title": string (max 120 chars, a clear question),
      "description": string,
      "category": "Friends" | "Attendance" | "Plans" | "Tonight" | "Chaos" | "Logistics" | "Weekend" | "Other",
      "market_type": "YES_NO" | "NUMERIC" | "MULTIPLE_CHOICE",
      "resolution_criteria": string (how an outsider decides the outcome),
      "close_time_guess": RFC 3339 timestamp,
      "outcomes": [ { "label": string, "initial_probability": number between 0 and 1 } ],
      "scores": { "creativity": 0..1, "clarity": 0..1, "evidence": 0..1, "fun": 0..1 },
      "evidence": [ { "quote": string (max 180 chars, copied from the chat), "approx_time": string or null } ]
    }
  ]
}

Rules:
- Produce between 6 and 12 ideas (never more than 20).
- YES_NO markets have exactly two outcomes, "Yes" and "No". Other types have 2 to 6 outcomes.
- Outcome probabilities of one market must sum to 1.
- At most 3 evidence quotes per idea, copied verbatim from the chat.
- Prefer events likely to happen after the latest messages. Newer messages matter more than older ones.
- Use first names that appear in the chat. Keep it friendly; nothing hurtful or private."#;

pub fn user_prompt(chat_text: &str) -> String {
    format!(
        "Here is the group chat (it may be clipped or summarized, newest content matters most).\n\
Generate market ideas as specified.\n\n\
Chat:\n\"\"\"\n{chat_text}\n\"\"\""
    )
}

pub fn fix_json_prompt(invalid_output: &str) -> String {
    format!(
        "Your previous reply was not valid JSON for the required shape.\n\
Repair it into ONE valid JSON object matching the schema exactly. Return only the JSON.\n\n\
Previous reply:\n\"\"\"\n{invalid_output}\n\"\"\""
    )
}

pub const CHUNK_SYSTEM_PROMPT: &str = "You compress group chat chunks for downstream market generation.
Return plain text only, no markdown.
Keep it concise and include:
- Newest updates in this chunk ahead of older ones
- Names mentioned (first names only)
- Concrete upcoming plans, logistics and timing
- 5-12 short direct quotes copied from the chunk
- Any uncertainty or conflicting plans";

pub fn chunk_user_prompt(chunk_text: &str, rank: usize, total: usize) -> String {
    format!(
        "Chunk {rank}/{total} (newest-first order)\n\
Extract only the most useful signals for prediction markets.\n\
Focus on events likely to happen after the latest messages.\n\
Keep it under {CHUNK_SUMMARY_MAX_CHARS} characters.\n\n\
Chunk text:\n\"\"\"\n{chunk_text}\n\"\"\""
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_embed_their_payloads() {
        assert!(user_prompt("[1/1/26, 10:00] Avi: hi").contains("Avi: hi"));
        assert!(fix_json_prompt("{broken").contains("{broken"));
        let chunk = chunk_user_prompt("body", 2, 5);
        assert!(chunk.starts_with("Chunk 2/5"));
        assert!(chunk.contains("under 2000 characters"));
    }

    #[test]
    fn system_prompt_lists_every_category() {
        for category in crate::markets::types::MarketCategory::ALL {
            assert!(SYSTEM_PROMPT.contains(category.as_str()));
        }
    }
}
