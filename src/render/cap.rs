//! 朗读文本长度限制

use crate::config::ContentCap;

/// Speech rate used to turn a time limit into a word budget.
///
/// The real rate depends on the synthesis voice; this is an estimate.
pub const WORDS_PER_SECOND: f32 = 2.5;

pub const ELLIPSIS: &str = "…";

/// Apply `cap` to `text`. Text within the limit comes back unchanged.
pub fn apply_cap(text: &str, cap: ContentCap) -> String {
    match cap {
        ContentCap::Disabled => text.to_string(),
        ContentCap::Words(n) => cap_words(text, n as usize),
        ContentCap::Sentences(n) => cap_sentences(text, n as usize),
        ContentCap::TimeLimit(secs) => cap_words(text, time_limit_words(secs)),
    }
}

/// Word budget for a time limit; at least one word for any non-zero limit
pub fn time_limit_words(secs: u32) -> usize {
    if secs == 0 {
        return 0;
    }
    ((secs as f32 * WORDS_PER_SECOND).floor() as usize).max(1)
}

fn cap_words(text: &str, limit: usize) -> String {
    if limit == 0 {
        return text.to_string();
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= limit {
        return text.to_string();
    }
    format!("{}{}", words[..limit].join(" "), ELLIPSIS)
}

fn cap_sentences(text: &str, limit: usize) -> String {
    if limit == 0 {
        return text.to_string();
    }
    let sentences = split_sentences(text);
    if sentences.len() <= limit {
        return text.to_string();
    }
    sentences[..limit].join(" ")
}

/// Split at `.`, `!` or `?` followed by whitespace
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();

    for (i, &b) in bytes.iter().enumerate() {
        if (b == b'.' || b == b'!' || b == b'?')
            && i + 1 < bytes.len()
            && bytes[i + 1].is_ascii_whitespace()
        {
            let end = i + 1;
            let s = text[start..end].trim();
            if !s.is_empty() {
                sentences.push(s);
            }
            start = end;
        }
    }

    let s = text[start..].trim();
    if !s.is_empty() {
        sentences.push(s);
    }

    sentences
}
