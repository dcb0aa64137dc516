// src/chunker.rs
use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;

/// Default character budget when the form supplies none.
pub const DEFAULT_MAX_CHARS: usize = 3000;

const SENTENCE_TERMINATORS: [char; 4] = ['.', '!', '?', '…'];

/// How an input document gets cut into segments. Exactly one sizing
/// dimension applies at a time; the thresholds come from the request and
/// are threaded through explicitly, never stored in shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitPolicy {
    /// The whole document as a single segment.
    Whole,
    /// Greedy paragraph packing under a character budget (Unicode scalar
    /// values, not bytes — the inputs are Cyrillic-heavy).
    MaxChars(usize),
    /// Fixed-size groups of newline-delimited lines.
    Lines(usize),
    /// Fixed-size groups of heuristically detected sentences.
    Sentences(usize),
    /// Contiguous runs of at most N cl100k tokens.
    MaxTokens(usize),
}

impl SplitPolicy {
    /// Builds a policy from the form's selector value and numeric threshold.
    pub fn from_parts(kind: &str, limit: Option<usize>) -> Option<SplitPolicy> {
        match kind {
            "whole" => Some(SplitPolicy::Whole),
            "chars" => Some(SplitPolicy::MaxChars(limit.unwrap_or(DEFAULT_MAX_CHARS))),
            "lines" => limit.map(SplitPolicy::Lines),
            "sentences" => limit.map(SplitPolicy::Sentences),
            "tokens" => limit.map(SplitPolicy::MaxTokens),
            _ => None,
        }
    }
}

/// Splits `text` into ordered, non-empty segments under `policy`.
///
/// Never fails. Empty or all-whitespace input yields an empty vector; a
/// zero threshold degrades to a single whole-document segment. Segment
/// order always matches document order.
pub fn split(text: &str, policy: &SplitPolicy) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    match *policy {
        SplitPolicy::Whole => vec![text.to_string()],
        SplitPolicy::MaxChars(0)
        | SplitPolicy::Lines(0)
        | SplitPolicy::Sentences(0)
        | SplitPolicy::MaxTokens(0) => vec![text.to_string()],
        SplitPolicy::MaxChars(n) => split_by_chars(text, n),
        SplitPolicy::Lines(k) => group_lines(text, k),
        SplitPolicy::Sentences(k) => group_sentences(text, k),
        SplitPolicy::MaxTokens(n) => split_by_tokens(text, n),
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Greedy paragraph packing under a character budget. A chunk that still
/// exceeds the budget after packing is a single oversized paragraph and
/// gets re-split at sentence boundaries. An oversized sentence is emitted
/// whole: the budget is a soft target when no break point exists below it,
/// never a mid-sentence truncation.
fn split_by_chars(text: &str, max_chars: usize) -> Vec<String> {
    if char_len(text) <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for paragraph in text.split("\n\n") {
        let para = paragraph.trim();
        if para.is_empty() {
            continue;
        }
        let para_len = char_len(para);
        let sep = if current.is_empty() { 0 } else { 2 };

        if current_len + sep + para_len <= max_chars {
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(para);
            current_len += sep + para_len;
        } else {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current.push_str(para);
            current_len = para_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    // Only a lone oversized paragraph can still be over budget here.
    let mut result = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if char_len(&chunk) > max_chars {
            result.extend(pack_sentences(&chunk, max_chars));
        } else {
            result.push(chunk);
        }
    }
    result
}

/// Greedy sentence packing for paragraphs that do not fit the character
/// budget on their own.
fn pack_sentences(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for unit in sentence_units(text) {
        let sentence = unit.trim();
        if sentence.is_empty() {
            continue;
        }
        let sentence_len = char_len(sentence);
        let sep = if current.is_empty() { 0 } else { 1 };

        if current_len + sep + sentence_len <= max_chars {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
            current_len += sep + sentence_len;
        } else {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current.push_str(sentence);
            current_len = sentence_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Splits into sentence units: a unit ends after `.`, `!`, `?` or `…`
/// followed by whitespace. Each unit keeps its terminator and trailing
/// whitespace, so line breaks survive regrouping and concatenating all
/// units reproduces the text. Deliberately naive about abbreviations,
/// decimals, and quotation marks.
fn sentence_units(text: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if SENTENCE_TERMINATORS.contains(&c)
            && chars.peek().map_or(true, |n| n.is_whitespace())
        {
            while let Some(&n) = chars.peek() {
                if !n.is_whitespace() {
                    break;
                }
                current.push(n);
                chars.next();
            }
            units.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        if current.trim().is_empty() {
            if let Some(last) = units.last_mut() {
                last.push_str(&current);
            }
        } else {
            units.push(current);
        }
    }
    units
}

/// Groups consecutive lines into chunks of exactly `count` lines (the last
/// group may be shorter). Groups with no visible content are dropped; if
/// that drops everything, the whole text becomes one chunk.
fn group_lines(text: &str, count: usize) -> Vec<String> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut chunks = Vec::new();

    for group in lines.chunks(count) {
        let chunk = group.join("\n");
        if chunk.trim().is_empty() {
            continue;
        }
        chunks.push(chunk);
    }

    if chunks.is_empty() {
        return vec![text.to_string()];
    }
    chunks
}

/// Groups consecutive sentence units into chunks of exactly `count` units.
fn group_sentences(text: &str, count: usize) -> Vec<String> {
    let units = sentence_units(text);
    let mut chunks = Vec::new();

    for group in units.chunks(count) {
        let chunk = group.concat().trim_end().to_string();
        if chunk.is_empty() {
            continue;
        }
        chunks.push(chunk);
    }

    if chunks.is_empty() {
        return vec![text.to_string()];
    }
    chunks
}

/// Encodes the text into cl100k tokens, slices the sequence into runs of
/// at most `max_tokens`, and decodes each run. No boundary search happens
/// here: decoding is what restores valid text framing.
fn split_by_tokens(text: &str, max_tokens: usize) -> Vec<String> {
    let Some(bpe) = encoder() else {
        // No vocabulary available: degrade to a single segment rather
        // than guessing at token boundaries.
        return vec![text.to_string()];
    };

    let tokens = bpe.encode_with_special_tokens(text);
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < tokens.len() {
        let mut end = (start + max_tokens).min(tokens.len());

        // A cut can land inside a multi-byte character, which decode
        // rejects. Back the boundary off until the run decodes; if a lone
        // token still cannot stand alone, grow forward instead. Runs only
        // shrink in the common case, so the budget holds.
        while end - start > 1 && bpe.decode(tokens[start..end].to_vec()).is_err() {
            end -= 1;
        }
        while end < tokens.len() && bpe.decode(tokens[start..end].to_vec()).is_err() {
            end += 1;
        }

        match bpe.decode(tokens[start..end].to_vec()) {
            Ok(run) => chunks.push(run),
            // Unreachable for a suffix of a valid encoding.
            Err(_) => break,
        }
        start = end;
    }
    chunks
}

/// Token count for a string, with a whitespace-based estimate when the
/// cl100k vocabulary is unavailable.
pub fn count_tokens(text: &str) -> usize {
    if let Some(bpe) = encoder() {
        return bpe.encode_with_special_tokens(text).len();
    }
    let words = text.split_whitespace().count();
    if words == 0 && !text.is_empty() {
        1
    } else {
        words
    }
}

fn encoder() -> Option<&'static CoreBPE> {
    static ENCODER: OnceLock<Option<CoreBPE>> = OnceLock::new();
    ENCODER
        .get_or_init(|| tiktoken_rs::cl100k_base().ok())
        .as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = split("Короткий текст.", &SplitPolicy::MaxChars(100));
        assert_eq!(chunks, vec!["Короткий текст.".to_string()]);
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        for policy in [
            SplitPolicy::Whole,
            SplitPolicy::MaxChars(100),
            SplitPolicy::Lines(3),
            SplitPolicy::Sentences(2),
            SplitPolicy::MaxTokens(50),
        ] {
            assert!(split("", &policy).is_empty());
            assert!(split("   \n\n  ", &policy).is_empty());
        }
    }

    #[test]
    fn test_zero_threshold_degrades_to_whole() {
        let chunks = split("абв где", &SplitPolicy::MaxChars(0));
        assert_eq!(chunks, vec!["абв где".to_string()]);
    }

    #[test]
    fn test_policy_from_parts() {
        assert_eq!(
            SplitPolicy::from_parts("lines", Some(5)),
            Some(SplitPolicy::Lines(5))
        );
        assert_eq!(
            SplitPolicy::from_parts("chars", None),
            Some(SplitPolicy::MaxChars(DEFAULT_MAX_CHARS))
        );
        assert_eq!(SplitPolicy::from_parts("bogus", Some(5)), None);
    }

    #[test]
    fn test_sentence_units_keep_line_breaks() {
        let units = sentence_units("Первое предложение. Второе!\nТретье?");
        assert_eq!(units.len(), 3);
        assert!(units[1].ends_with('\n'));
        assert_eq!(units.concat(), "Первое предложение. Второе!\nТретье?");
    }
}
