//! Message chunking for transports with a length limit.
//!
//! Telegram limits text messages to 4096 UTF-16 code units, so characters
//! outside the Basic Multilingual Plane count twice. Long answers are split
//! at paragraph boundaries when possible, then at line breaks, then at spaces,
//! and only cut mid-word when a window contains no whitespace at all.

/// Telegram hard limit for text messages.
pub const TELEGRAM_MAX_LEN: usize = 4096;

const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Split `text` into chunks of at most `max_units` UTF-16 code units.
pub fn chunk_text(text: &str, max_units: usize) -> Vec<String> {
    let max_units = max_units.max(1);
    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        let Some(limit) = utf16_limit(remaining, max_units) else {
            chunks.push(remaining.to_string());
            break;
        };

        let split_at = find_split_point(&remaining[..limit]).unwrap_or(limit);
        let (head, tail) = remaining.split_at(split_at);
        let head = head.trim_end();
        if !head.is_empty() {
            chunks.push(head.to_string());
        }
        remaining = tail;
    }

    chunks
}

/// Byte index of the first character that would push `text` past
/// `max_units`, or `None` if all of it fits. Always admits one character.
fn utf16_limit(text: &str, max_units: usize) -> Option<usize> {
    let mut units = 0;
    for (idx, ch) in text.char_indices() {
        units += ch.len_utf16();
        if units > max_units {
            return Some(if idx == 0 { ch.len_utf8() } else { idx });
        }
    }
    None
}

fn find_split_point(window: &str) -> Option<usize> {
    SEPARATORS
        .iter()
        .find_map(|sep| window.rfind(sep).map(|idx| idx + sep.len()))
}
