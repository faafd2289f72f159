// src/extract/context.rs
use std::ops::Range;

use crate::config::ContextConfig;
use crate::document::truncate_chars;

/// Byte ranges of case-insensitive occurrences of `ticker` in `text` that are not
/// glued to another letter, the same boundary the ticker scan uses (`AAPL2024` counts).
/// A leading `$` is allowed and is not part of the range.
pub fn ticker_occurrences<'a>(
    text: &'a str,
    ticker: &'a str,
) -> impl Iterator<Item = Range<usize>> + 'a {
    let hay = text.as_bytes();
    let needle = ticker.as_bytes();
    let n = needle.len();
    let last = if n == 0 || hay.len() < n { 0 } else { hay.len() - n + 1 };

    (0..last).filter_map(move |i| {
        if !hay[i..i + n].eq_ignore_ascii_case(needle) {
            return None;
        }
        // ASCII bytes are always char boundaries, so slicing at `i` and `i + n` is safe.
        let before_ok = text[..i]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphabetic());
        let after_ok = text[i + n..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphabetic());
        (before_ok && after_ok).then_some(i..i + n)
    })
}

/// Byte offset `n` chars before `at` (clamped to 0).
fn back_chars(s: &str, at: usize, n: usize) -> usize {
    if n == 0 {
        return at;
    }
    s[..at]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map_or(0, |(i, _)| i)
}

/// Byte offset `n` chars after `at` (clamped to the end).
fn fwd_chars(s: &str, at: usize, n: usize) -> usize {
    s[at..]
        .char_indices()
        .nth(n)
        .map_or(s.len(), |(i, _)| at + i)
}

/// Text surrounding `ticker` in `text`.
///
/// Short texts (at most three windows long) are returned whole. Otherwise up to
/// `max_occurrences` windows of `window_size` chars on each side of a whole-word
/// occurrence are joined with the separator. If the symbol only appears inside
/// another word, a prefix of two windows is returned; if it is absent, `""`.
pub fn extract_context(text: &str, ticker: &str, cfg: &ContextConfig) -> String {
    let window = cfg.window_size;
    if text.chars().count() <= window.saturating_mul(3) {
        return text.to_string();
    }

    let slices: Vec<&str> = ticker_occurrences(text, ticker)
        .take(cfg.max_occurrences)
        .map(|r| {
            let start = back_chars(text, r.start, window);
            let end = fwd_chars(text, r.end, window);
            &text[start..end]
        })
        .collect();

    if !slices.is_empty() {
        return slices.join(&cfg.separator);
    }

    if text
        .to_ascii_uppercase()
        .contains(&ticker.to_ascii_uppercase())
    {
        return truncate_chars(text, window.saturating_mul(2)).to_string();
    }
    String::new()
}
