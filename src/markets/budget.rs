use crate::markets::util::{char_len, last_chars, take_chars};

pub const DEFAULT_MAX_INPUT_CHARS: usize = 40_000;
pub const DEFAULT_CHUNK_SIZE_CHARS: usize = 12_000;
pub const DEFAULT_CHUNK_OVERLAP_CHARS: usize = 1_000;
pub const DEFAULT_MAX_CHUNKS: usize = 10;
/// Smaller budgets tried after the configured maximum.
pub const FALLBACK_BUDGETS: [usize; 2] = [20_000, 10_000];

const MIN_SIZE_CHARS: f64 = 2_000.0;
const CLIP_HEAD_RATIO: f64 = 0.1;
const CLIP_MARKER_RESERVE: usize = 64;
const CLIP_MIN_TAIL_CHARS: usize = 1_500;
pub const TRUNCATION_MARKER: &str = "\n\n...[truncated for token budget]...\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    pub max_input_chars: usize,
    pub chunk_size_chars: usize,
    pub chunk_overlap_chars: usize,
    pub max_chunks: usize,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            chunk_size_chars: DEFAULT_CHUNK_SIZE_CHARS,
            chunk_overlap_chars: DEFAULT_CHUNK_OVERLAP_CHARS,
            max_chunks: DEFAULT_MAX_CHUNKS,
        }
    }
}

fn usable(raw: Option<f64>) -> Option<f64> {
    raw.filter(|v| v.is_finite()).map(f64::floor)
}

impl SizeLimits {
    /// Apply the validity guards to raw configured values; anything missing,
    /// non-finite or out of range falls back to its default.
    pub fn from_raw(
        max_input_chars: Option<f64>,
        chunk_size_chars: Option<f64>,
        chunk_overlap_chars: Option<f64>,
        max_chunks: Option<f64>,
    ) -> Self {
        let max_input_chars = usable(max_input_chars)
            .filter(|v| *v > MIN_SIZE_CHARS)
            .map_or(DEFAULT_MAX_INPUT_CHARS, |v| v as usize);
        let chunk_size_chars = usable(chunk_size_chars)
            .filter(|v| *v > MIN_SIZE_CHARS)
            .map_or(DEFAULT_CHUNK_SIZE_CHARS, |v| v as usize);
        let chunk_overlap_chars = usable(chunk_overlap_chars)
            .filter(|v| *v >= 0.0 && (*v as usize) < chunk_size_chars)
            .map_or(DEFAULT_CHUNK_OVERLAP_CHARS, |v| v as usize)
            .min(chunk_size_chars.saturating_sub(1));
        let max_chunks = usable(max_chunks)
            .filter(|v| *v > 0.0)
            .map_or(DEFAULT_MAX_CHUNKS, |v| v as usize);

        Self {
            max_input_chars,
            chunk_size_chars,
            chunk_overlap_chars,
            max_chunks,
        }
    }

    pub fn needs_chunking(&self, text: &str) -> bool {
        char_len(text) > self.max_input_chars
    }

    /// Descending, de-duplicated budgets for the retry controller. Budgets
    /// above the configured maximum are dropped.
    pub fn input_budgets(&self) -> Vec<usize> {
        let mut budgets = vec![self.max_input_chars];
        budgets.extend(
            FALLBACK_BUDGETS
                .iter()
                .copied()
                .filter(|b| *b < self.max_input_chars),
        );
        budgets.sort_unstable_by(|a, b| b.cmp(a));
        budgets.dedup();
        budgets
    }
}

/// Keep the head and the tail of `raw` when it exceeds `max_chars`.
///
/// The head is 10% of the budget; the tail fills the rest minus a small
/// reserve for the marker, but never drops below 1500 characters.
pub fn clip_text(raw: &str, max_chars: usize) -> String {
    let total = char_len(raw);
    if total <= max_chars {
        return raw.to_string();
    }

    let head_chars = (max_chars as f64 * CLIP_HEAD_RATIO).floor() as usize;
    let tail_chars = max_chars
        .saturating_sub(head_chars + CLIP_MARKER_RESERVE)
        .max(CLIP_MIN_TAIL_CHARS)
        .min(total - head_chars);

    format!(
        "{}{}{}",
        take_chars(raw, head_chars),
        TRUNCATION_MARKER,
        last_chars(raw, tail_chars)
    )
}
