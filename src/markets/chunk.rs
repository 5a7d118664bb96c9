/// Split `raw` into overlapping windows, newest content first.
///
/// Each window is the `chunk_size` characters ending at the cursor; the cursor
/// then moves back by `chunk_size - overlap`. Stops at the start of the text
/// or after `max_chunks` windows, whichever comes first.
pub fn split_newest_first(
    raw: &str,
    chunk_size: usize,
    overlap: usize,
    max_chunks: usize,
) -> Vec<String> {
    // Byte offset of every char boundary, including the end of the string.
    let mut boundaries: Vec<usize> = raw.char_indices().map(|(idx, _)| idx).collect();
    boundaries.push(raw.len());
    let total_chars = boundaries.len() - 1;

    if total_chars <= chunk_size || chunk_size == 0 {
        return vec![raw.to_string()];
    }

    let overlap = overlap.min(chunk_size - 1);
    let mut chunks = Vec::new();
    let mut end = total_chars;

    while end > 0 && chunks.len() < max_chunks {
        let start = end.saturating_sub(chunk_size);
        chunks.push(raw[boundaries[start]..boundaries[end]].to_string());
        if start == 0 {
            break;
        }
        end = (start + overlap).min(total_chars);
    }

    chunks
}
