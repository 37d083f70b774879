//! Fixed-size token-window chunker.
//!
//! Splits document text into windows of at most `max_tokens` tokens, as
//! produced by the normalizer's [`tokenize`]. Windows do not overlap and
//! keep the document's order. Chunk text is therefore already cleaned:
//! lower-cased, without niqqud or punctuation, final letters folded. The
//! index builder only has to stem it.
//!
//! # Algorithm
//!
//! 1. Tokenize the text ([`tokenize`]).
//! 2. Take consecutive runs of `max_tokens` tokens.
//! 3. Join each run with a single space.
//! 4. Drop runs whose joined text is [`MIN_CHUNK_CHARS`] characters or
//!    shorter; these are headings, separators and similar noise.
//!
//! # Example
//!
//! ```rust
//! use context_ranker_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("Alpha, bravo, charlie, delta. Echo foxtrot golf hotel!", 4);
//! assert_eq!(chunks, vec!["alpha bravo charlie delta", "echo foxtrot golf hotel"]);
//! ```

use crate::normalize::tokenize;

/// Default window size in tokens.
pub const DEFAULT_MAX_TOKENS: usize = 60;

/// Windows of this many characters or fewer are discarded.
pub const MIN_CHUNK_CHARS: usize = 20;

/// Split text into token windows.
///
/// `max_tokens == 0` is treated as 1. Returns an empty vector when no
/// window clears the length floor, including for empty text.
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    let size = max_tokens.max(1);
    tokenize(text)
        .chunks(size)
        .map(|window| window.join(" "))
        .filter(|joined| joined.chars().count() > MIN_CHUNK_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Hello, world! This is a chunk.", DEFAULT_MAX_TOKENS);
        assert_eq!(chunks, vec!["hello world this is a chunk"]);
    }

    #[test]
    fn test_punctuation_only_text_yields_no_chunks() {
        assert!(chunk_text("---- ---- ---- ---- ---- ....", DEFAULT_MAX_TOKENS).is_empty());
        assert!(chunk_text("| --- | --- | --- |\n| *** | ... |", DEFAULT_MAX_TOKENS).is_empty());
    }

    #[test]
    fn test_floor_applies_to_cleaned_window() {
        // 23 raw chars, 15 once punctuation is gone
        assert!(chunk_text("(alpha), [bravo], {cha}", 60).is_empty());
    }

    #[test]
    fn test_niqqud_and_final_forms_cleaned() {
        let chunks = chunk_text("הַמֶּלֶךְ שיחק טטריס בארמון כל הלילה", 60);
        assert_eq!(chunks, vec!["המלכ שיחק טטריס בארמונ כל הלילה"]);
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", DEFAULT_MAX_TOKENS).is_empty());
        assert!(chunk_text("   \n\t ", DEFAULT_MAX_TOKENS).is_empty());
    }

    #[test]
    fn test_whitespace_collapsed_to_single_space() {
        let chunks = chunk_text("alpha\n\nbeta\tgamma   delta epsilon", 10);
        assert_eq!(chunks, vec!["alpha beta gamma delta epsilon"]);
    }

    #[test]
    fn test_windows_do_not_overlap() {
        let text = (0..10)
            .map(|i| format!("token{:02}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text(&text, 3);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "token00 token01 token02");
        assert_eq!(chunks[1], "token03 token04 token05");
        assert_eq!(chunks[2], "token06 token07 token08");
        // trailing "token09" is only 7 chars and is dropped
    }

    #[test]
    fn test_length_floor_is_exclusive() {
        // exactly 20 chars: dropped
        assert!(chunk_text("aaaaaaaaa bbbbbbbbbb", 60).is_empty());
        // 21 chars: kept
        assert_eq!(chunk_text("aaaaaaaaaa bbbbbbbbbb", 60).len(), 1);
    }

    #[test]
    fn test_floor_counts_chars_not_bytes() {
        // 14 Hebrew chars take 26 bytes but stay under the floor
        assert!(chunk_text("משחק טטריס כיף", 60).is_empty());
    }

    #[test]
    fn test_zero_max_tokens_treated_as_one() {
        let chunks = chunk_text("supercalifragilisticexpialidocious! short", 0);
        assert_eq!(chunks, vec!["supercalifragilisticexpialidocious"]);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma delta epsilon zeta eta theta iota kappa";
        assert_eq!(chunk_text(text, 4), chunk_text(text, 4));
    }
}
