//! Mention detection.
//!
//! Transports report mentions as offset/length spans counted in UTF-16 code
//! units. A message is addressed to the bot when one of those spans covers
//! `@<handle>`; the question is whatever text remains once that span is cut
//! out.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A platform-reported `@handle` range, in UTF-16 code units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionSpan {
    pub offset: usize,
    pub length: usize,
}

impl MentionSpan {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }
}

/// Outcome of parsing one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    /// Whether the bot was mentioned
    pub addressed: bool,
    /// Message text with the mention removed, trimmed. Empty when the bot was
    /// mentioned without a question.
    pub question: String,
}

impl Mention {
    fn not_addressed() -> Self {
        Self {
            addressed: false,
            question: String::new(),
        }
    }
}

/// Decide whether `text` mentions `handle` and extract the question.
///
/// The handle may be given with or without its leading `@` and is compared
/// case-insensitively. Spans that fall outside the text, or that split a
/// character, are ignored.
pub fn parse(text: &str, spans: &[MentionSpan], handle: &str) -> Mention {
    let handle = normalize_handle(handle);
    if handle.is_empty() {
        return Mention::not_addressed();
    }

    for span in spans {
        let Some(range) = utf16_span_to_bytes(text, *span) else {
            continue;
        };
        if normalize_handle(&text[range.clone()]) != handle {
            continue;
        }

        let mut question = String::with_capacity(text.len() - range.len());
        question.push_str(&text[..range.start]);
        question.push_str(&text[range.end..]);
        return Mention {
            addressed: true,
            question: question.trim().to_string(),
        };
    }

    Mention::not_addressed()
}

fn normalize_handle(handle: &str) -> String {
    let handle = handle.trim();
    handle.strip_prefix('@').unwrap_or(handle).to_lowercase()
}

/// Map a UTF-16 span onto a byte range of `text`.
fn utf16_span_to_bytes(text: &str, span: MentionSpan) -> Option<Range<usize>> {
    let end_units = span.offset.checked_add(span.length)?;
    if span.length == 0 {
        return None;
    }

    let mut start = None;
    let mut units = 0usize;
    for (byte_idx, ch) in text.char_indices() {
        if units == span.offset {
            start = Some(byte_idx);
        }
        if units == end_units {
            return start.map(|s| s..byte_idx);
        }
        if units > end_units {
            return None;
        }
        units += ch.len_utf16();
    }

    // The span may run to the very end of the text.
    if units == end_units {
        return start.map(|s| s..text.len());
    }
    None
}
