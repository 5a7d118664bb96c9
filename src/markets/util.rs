use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Return the current Unix epoch in seconds, or 0 if the clock is before 1970.
pub fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub fn char_len(input: &str) -> usize {
    input.chars().count()
}

/// First `max_chars` characters of `input`, never splitting a code point.
pub fn take_chars(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}

/// Last `max_chars` characters of `input`.
pub fn last_chars(input: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    match input.char_indices().rev().nth(max_chars - 1) {
        Some((idx, _)) => &input[idx..],
        None => input,
    }
}

pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Short, stable content hash used for market ids.
pub fn hash_id(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    hex[..12].to_string()
}

/// Lowercase, hyphen-separated, at most 64 chars of `[a-z0-9-]`.
pub fn slugify(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch);
        } else {
            pending_dash = true;
        }
        if out.len() >= 64 {
            break;
        }
    }
    out.truncate(64);
    out.trim_end_matches('-').to_string()
}

/// Slug for `title`, falling back to the slug of `id`, then to a hashed slug.
pub fn slug_or_fallback(title: &str, id: &str) -> String {
    let slug = slugify(title);
    if !slug.is_empty() {
        return slug;
    }
    let slug = slugify(id);
    if !slug.is_empty() {
        return slug;
    }
    format!("market-{}", hash_id(&format!("{title}|{id}")))
}
