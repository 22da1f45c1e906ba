//! Character-window splitter for markdown documents.
//!
//! Windows are at most `chunk_size` characters. Each window ends on the
//! latest paragraph break in its second half, else the latest line break,
//! else the latest whitespace, else exactly at the size limit. The next
//! window starts `chunk_overlap` characters before the previous end, moved
//! forward to a word start.

use crate::error::KnowledgeError;

/// Split `text` into overlapping chunks. Empty and whitespace-only chunks
/// are dropped.
pub fn split_text(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<String>, KnowledgeError> {
    if chunk_size == 0 || chunk_overlap >= chunk_size {
        return Err(KnowledgeError::InvalidChunking {
            size: chunk_size,
            overlap: chunk_overlap,
        });
    }

    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < n {
        let hard_end = (start + chunk_size).min(n);
        let end = if hard_end == n {
            n
        } else {
            find_break(&chars, start, hard_end)
        };

        let chunk: String = chars[start..end].iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        if end >= n {
            break;
        }

        let mut next = end.saturating_sub(chunk_overlap);
        if next <= start {
            next = end;
        }
        while next < end && next > 0 && !chars[next - 1].is_whitespace() {
            next += 1;
        }
        start = next;
    }

    Ok(chunks)
}

fn find_break(chars: &[char], start: usize, hard_end: usize) -> usize {
    let min_pos = start + (hard_end - start) / 2;

    let paragraph = (min_pos.max(start + 2)..=hard_end)
        .rev()
        .find(|&i| chars[i - 1] == '\n' && chars[i - 2] == '\n');
    if let Some(i) = paragraph {
        return i;
    }

    let line = (min_pos.max(start + 1)..=hard_end)
        .rev()
        .find(|&i| chars[i - 1] == '\n');
    if let Some(i) = line {
        return i;
    }

    (min_pos.max(start + 1)..=hard_end)
        .rev()
        .find(|&i| chars[i - 1].is_whitespace())
        .unwrap_or(hard_end)
}
